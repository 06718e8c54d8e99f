use anyhow::Result;
use utoipa::OpenApi;

use crate::schemas::ApiDoc;

/// Render the API description the server publishes at `/api-docs/openapi.json`.
pub fn openapi_yaml() -> Result<String> {
    Ok(serde_yaml::to_string(&ApiDoc::openapi())?)
}

pub fn print_openapi() -> Result<()> {
    print!("{}", openapi_yaml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_contains_paths() {
        let yaml = openapi_yaml().unwrap();
        assert!(yaml.contains("openapi:"));
        assert!(yaml.contains("/deliveries/submit/{user_id}/{product_id}"));
        assert!(yaml.contains("Courier API"));
    }
}
