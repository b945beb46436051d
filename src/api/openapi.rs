use crate::api::handlers::{generate, health, notifications, sessions, verify};
use utoipa::openapi::{InfoBuilder, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both
/// served and documented. `GET /` is wired outside and stays undocumented.
pub(crate) fn api_router() -> OpenApiRouter {
    OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(generate::generate_code))
        .routes(routes!(verify::verify_code))
        .routes(routes!(sessions::sessions))
        .routes(routes!(notifications::notifications))
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(Some(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    let mut codice_tag = Tag::new("codice");
    codice_tag.description = Some("One-time passcode API".to_string());

    OpenApiBuilder::new()
        .info(info)
        .tags(Some(vec![codice_tag]))
        .build()
}

#[cfg(test)]
mod tests {
    use super::openapi;

    #[test]
    fn openapi_documents_all_routes() {
        let spec = openapi();
        let paths = &spec.paths.paths;

        for path in [
            "/health",
            "/auth/generate-code",
            "/auth/verify-code",
            "/admin/sessions",
            "/notifications/codes",
        ] {
            assert!(paths.contains_key(path), "missing path {path}");
        }
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
    }
}
