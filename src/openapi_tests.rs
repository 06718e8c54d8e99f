#[cfg(test)]
mod tests {
    use crate::schemas::ApiDoc;
    use utoipa::OpenApi;

    #[test]
    fn test_openapi_schema_generation() {
        // Test that the OpenAPI schema can be generated without errors
        let openapi = ApiDoc::openapi();

        // Verify that the schema contains the expected components
        assert!(openapi.components.is_some());
        let components = openapi.components.as_ref().unwrap();

        // Check that ErrorResponse schema is properly defined
        assert!(components.schemas.contains_key("ErrorResponse"));

        // Check that HealthResponse schema is properly defined
        assert!(components.schemas.contains_key("HealthResponse"));

        // Verify that the schema can be serialized to JSON without errors
        let json_result = serde_json::to_string(&openapi);
        assert!(json_result.is_ok());

        println!("OpenAPI schema generated successfully");
    }

    #[test]
    fn test_error_response_schema_structure() {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.as_ref().unwrap();
        let error_response_schema = components.schemas.get("ErrorResponse").unwrap();

        // Verify ErrorResponse has the expected structure
        if let utoipa::openapi::RefOr::T(utoipa::openapi::schema::Schema::Object(obj)) = error_response_schema {
            let properties = &obj.properties;
            assert!(properties.contains_key("error"));
            assert!(properties.contains_key("code"));
            assert!(properties.contains_key("success"));
        } else {
            panic!("ErrorResponse should be an object schema");
        }
    }

    #[test]
    fn test_health_response_schema_structure() {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.as_ref().unwrap();
        let health_response_schema = components.schemas.get("HealthResponse").unwrap();

        // Verify HealthResponse has the expected structure
        if let utoipa::openapi::RefOr::T(utoipa::openapi::schema::Schema::Object(obj)) = health_response_schema {
            let properties = &obj.properties;
            assert!(properties.contains_key("status"));
            assert!(properties.contains_key("version"));
            assert!(properties.contains_key("database"));
        } else {
            panic!("HealthResponse should be an object schema");
        }
    }

    #[test]
    fn test_openapi_paths_contain_health_endpoint() {
        let openapi = ApiDoc::openapi();

        // Verify that the /health endpoint is properly defined
        assert!(openapi.paths.paths.contains_key("/health"));

        let health_path = openapi.paths.paths.get("/health").unwrap();
        let health_get = health_path.operations.get(&utoipa::openapi::PathItemType::Get);
        assert!(health_get.is_some());

        let health_get_op = health_get.unwrap();

        let responses = &health_get_op.responses;
        // Check that both 200 and 500 responses are defined
        assert!(responses.responses.contains_key("200"));
        assert!(responses.responses.contains_key("500"));
    }

    #[test]
    fn test_every_route_is_documented() {
        let openapi = ApiDoc::openapi();
        let paths = &openapi.paths.paths;

        for path in [
            "/register",
            "/login",
            "/token/refresh",
            "/me",
            "/profile/{user_id}",
            "/clients",
            "/riders",
            "/accounts/{user_id}",
            "/post-products",
            "/products",
            "/products/{product_id}/deduct",
            "/deliveries/submit/{user_id}/{product_id}",
            "/deliveries/{delivery_id}/update-status",
            "/deliveries/arrived",
            "/transportation/{user_id}/create",
            "/transportations/{transportation_id}/update-rider",
            "/payments/{user_id}",
            "/chat/{user1_id}/{user2_id}",
            "/chat/rooms/{user_id}",
            "/chat/search",
        ] {
            assert!(paths.contains_key(path), "missing path {}", path);
        }

        let chat = paths.get("/chat/{user1_id}/{user2_id}").unwrap();
        assert!(chat.operations.contains_key(&utoipa::openapi::PathItemType::Get));
        assert!(chat.operations.contains_key(&utoipa::openapi::PathItemType::Post));
    }

    #[test]
    fn test_product_schema_uses_wire_names() {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.as_ref().unwrap();
        let product = components.schemas.get("ProductResponse").unwrap();

        if let utoipa::openapi::RefOr::T(utoipa::openapi::schema::Schema::Object(obj)) = product {
            assert!(obj.properties.contains_key("type"));
            assert!(!obj.properties.contains_key("product_type"));
            assert!(obj.properties.contains_key("quantity"));
        } else {
            panic!("ProductResponse should be an object schema");
        }
    }

    #[test]
    fn test_account_schema_has_no_password() {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.as_ref().unwrap();
        let account = components.schemas.get("AccountResponse").unwrap();

        if let utoipa::openapi::RefOr::T(utoipa::openapi::schema::Schema::Object(obj)) = account {
            assert!(obj.properties.contains_key("username"));
            assert!(!obj.properties.contains_key("password_hash"));
        } else {
            panic!("AccountResponse should be an object schema");
        }
    }

    #[test]
    fn test_bearer_scheme_is_registered() {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.as_ref().unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn test_all_error_responses_reference_correct_schema() {
        let openapi = ApiDoc::openapi();
        let openapi_json = serde_json::to_string(&openapi).unwrap();

        // Ensure no references to crate.schemas.ErrorResponse exist
        assert!(!openapi_json.contains("crate.schemas.ErrorResponse"));
        assert!(!openapi_json.contains("crate::schemas::ErrorResponse"));

        // Ensure proper ErrorResponse references exist
        assert!(openapi_json.contains("ErrorResponse"));

        println!("All error response references are correctly formatted");
    }

    #[test]
    fn test_multipart_bodies_reference_form_schemas() {
        let openapi = serde_json::to_value(ApiDoc::openapi()).unwrap();

        let cases = [
            ("/edit-product/{product_id}", "patch", "ProductForm"),
            ("/profile/{user_id}/picture", "patch", "ProfilePictureForm"),
            ("/payments/{user_id}", "post", "PaymentForm"),
            ("/deliveries/{delivery_id}/update-payment", "patch", "DeliveryPaymentForm"),
            ("/transportations/{transportation_id}/update-price-payment", "patch", "PricePaymentForm"),
            (
                "/transportations/{transportation_id}/update-status-price-payment",
                "patch",
                "StatusPricePaymentForm",
            ),
        ];

        for (path, method, schema) in cases {
            let reference = &openapi["paths"][path][method]["requestBody"]["content"]["multipart/form-data"]
                ["schema"]["$ref"];
            assert_eq!(
                reference.as_str(),
                Some(format!("#/components/schemas/{}", schema).as_str()),
                "{} {}",
                method,
                path
            );
        }

        let picture = &openapi["components"]["schemas"]["ProductForm"]["properties"]["picture"];
        assert_eq!(picture["format"], "binary");
        assert!(openapi["components"]["schemas"]["ProductForm"]["properties"]["type"].is_object());
    }
}
