//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::gateway::handlers::HealthResponse;
use crate::user_auth::models::{
    LoginRequest, MessageResponse, ProfileFormSchema, RegisterRequest, TokenResponse, UserProfile,
};

/// Bearer session token security scheme
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("JWT")
                .description(Some("Session token from /api/sso/register or /api/sso/login"))
                .build();
            components.add_security_scheme("bearer_jwt", SecurityScheme::Http(scheme));
        }
    }
}

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "SSO Service API",
        version = "1.0.0",
        description = "Single sign-on identity provider: registration, login, bearer sessions and user profiles.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        crate::user_auth::handlers::register,
        crate::user_auth::handlers::login,
        crate::user_auth::handlers::user_profile,
        crate::user_auth::handlers::update_user_profile,
        crate::user_auth::handlers::serve_avatar,
    ),
    components(
        schemas(
            HealthResponse,
            RegisterRequest,
            LoginRequest,
            TokenResponse,
            UserProfile,
            MessageResponse,
            ProfileFormSchema,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration and login (no auth required)"),
        (name = "User", description = "Profile and avatar endpoints"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi;

    #[test]
    fn test_openapi_spec_generates() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "SSO Service API");
        assert_eq!(spec.info.version, "1.0.0");
    }

    #[test]
    fn test_openapi_json_serializable() {
        let json = ApiDoc::openapi().to_json();
        assert!(json.is_ok());
        assert!(json.unwrap().contains("SSO Service API"));
    }

    #[test]
    fn test_sso_endpoints_registered() {
        let paths = ApiDoc::openapi().paths;
        for path in [
            "/api/sso/register",
            "/api/sso/login",
            "/api/sso/user_profile",
            "/api/sso/update_user_profile",
            "/api/sso/images/{filename}",
            "/api/sso/health",
        ] {
            assert!(paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_bearer_scheme_registered() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_jwt"));
    }
}
