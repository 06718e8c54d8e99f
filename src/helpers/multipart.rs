use crate::error::ApiError;
use axum::{body::Bytes, extract::Multipart};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::trace;

/// A file part of a multipart body
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Bytes,
}

/// Multipart body split into text fields and file parts.
///
/// Parts carrying a file name are treated as files, everything else as text.
/// A repeated field name keeps the last value.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormData {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let data = field.bytes().await?;
                    trace!("Multipart file field '{}' ({} bytes)", name, data.len());
                    form.files.insert(name, UploadedFile { file_name, data });
                }
                None => {
                    let value = field.text().await?;
                    trace!("Multipart text field '{}'", name);
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    /// Text value of a field; blank values count as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Text value exactly as sent, for fields such as passwords.
    pub fn raw(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    /// Parse a text field, reporting unparsable input as a validation error.
    pub fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>, ApiError> {
        match self.text(name) {
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|_| ApiError::validation(format!("{}: '{}' is not a valid value", name, raw))),
            None => Ok(None),
        }
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.files.is_empty()
    }
}
