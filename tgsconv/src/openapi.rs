//! OpenAPI documentation for the HTTP surface, served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

use crate::api::{handlers, models};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "tgsconv",
        description = "Renders the first frame of an animated sticker to PNG."
    ),
    paths(handlers::health::health, handlers::convert::convert),
    components(schemas(models::HealthResponse, models::ErrorResponse)),
    tags(
        (name = "convert", description = "Sticker rendering"),
        (name = "health", description = "Liveness probe")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documents_both_routes() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/health"));
        assert!(doc.paths.paths.contains_key("/convert"));
        let schemas = &doc.components.as_ref().unwrap().schemas;
        assert!(schemas.contains_key("ErrorResponse"));
    }
}
