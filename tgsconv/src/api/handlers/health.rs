use crate::api::models::HealthResponse;
use axum::Json;

/// Liveness probe. Has no side effects and does not touch the renderer.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    summary = "Health check",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

#[cfg(test)]
mod tests {
    use crate::test_utils::create_test_app;
    use crate::render::MockRenderEngine;

    #[tokio::test]
    async fn test_health_is_static() {
        let (server, _temp_dir) = create_test_app(MockRenderEngine::always_failing("unused")).await;

        for _ in 0..3 {
            let response = server.get("/health").await;
            response.assert_status_ok();
            response.assert_json(&serde_json::json!({ "status": "ok" }));
        }

        // a failed conversion does not affect the probe
        server.post("/convert").await;
        let response = server.get("/health").await;
        response.assert_status_ok();
        assert_eq!(response.text(), r#"{"status":"ok"}"#);
    }
}
