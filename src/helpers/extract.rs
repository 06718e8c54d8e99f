use crate::error::ApiError;
use crate::helpers::multipart::FormData;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Multipart, Query, Request},
    http::{header::CONTENT_TYPE, request::Parts},
    Json,
};
use axum_valid::Valid;
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON body extractor that also runs the body's `validator` rules.
///
/// Both malformed JSON and failed validation surface as
/// [`ApiError::Validation`], so the client gets the usual error envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Valid(Json(value)) = Valid::<Json<T>>::from_request(req, state).await?;
        Ok(ValidJson(value))
    }
}

/// Query string counterpart of [`ValidJson`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Valid(Query(value)) = Valid::<Query<T>>::from_request_parts(parts, state).await?;
        Ok(ValidQuery(value))
    }
}

/// Request bodies that can also be submitted as multipart text fields.
pub trait FromFormData: Sized {
    fn from_form(form: &FormData) -> Result<Self, ApiError>;
}

/// Body accepted either as JSON or as `multipart/form-data`.
///
/// The value is validated the same way in both cases. Multipart bodies keep
/// their file parts in the accompanying [`FormData`]; JSON bodies carry none.
#[derive(Debug)]
pub struct JsonOrForm<T>(pub T, pub FormData);

#[async_trait]
impl<T, S> FromRequest<S> for JsonOrForm<T>
where
    T: DeserializeOwned + Validate + FromFormData,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        if !is_multipart {
            let ValidJson(value) = ValidJson::<T>::from_request(req, state).await?;
            return Ok(JsonOrForm(value, FormData::default()));
        }

        let multipart = Multipart::from_request(req, state).await?;
        let form = FormData::from_multipart(multipart).await?;
        let value = T::from_form(&form)?;
        value.validate()?;
        Ok(JsonOrForm(value, form))
    }
}

/// Reject blank strings in `validator` custom rules.
pub fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        let mut err = validator::ValidationError::new("blank");
        err.message = Some("This field may not be blank.".into());
        return Err(err);
    }
    Ok(())
}

/// E-mail rule that lets an empty address through, since accounts may have none.
pub fn optional_email(value: &str) -> Result<(), validator::ValidationError> {
    use validator::ValidateEmail;

    if value.trim().is_empty() || value.trim().validate_email() {
        return Ok(());
    }
    let mut err = validator::ValidationError::new("email");
    err.message = Some("Enter a valid email address.".into());
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_blank() {
        assert!(not_blank("Rice").is_ok());
        assert!(not_blank("   ").is_err());
    }

    #[test]
    fn test_optional_email_allows_empty() {
        assert!(optional_email("").is_ok());
        assert!(optional_email("  ").is_ok());
        assert!(optional_email("rider@example.com").is_ok());
        assert!(optional_email("not-an-address").is_err());
    }
}
