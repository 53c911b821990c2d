use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header, HeaderMap, Method},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde_json::Value;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::{
    compose::{Preset, PRESETS},
    config::AppConfig,
    error::{Result, StudioError},
    extract::display_uri,
    models::{FrameRequest, GeneratedPayload, GenerationEnvelope, GenerationRequest},
    normalize::{normalize_image, NormalizedImage, SourceImage},
    openrouter::{preview, OpenRouterClient},
    overlay::{decode_display_uri, frame_decoded, load_overlay},
};

#[derive(Clone)]
pub struct AppState {
    pub openrouter: Arc<OpenRouterClient>,
    pub frame_overlay: PathBuf,
    pub asset_timeout: Duration,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            openrouter: Arc::new(OpenRouterClient::new(config)?),
            frame_overlay: config.frame_overlay.clone(),
            asset_timeout: config.asset_timeout,
        })
    }
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/ai", post(generate).fallback(method_not_allowed))
        .route("/api/presets", get(list_presets))
        .route("/api/normalize", post(normalize_upload))
        .route("/api/frame", post(frame))
        .route("/health", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn generate(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<GenerationEnvelope>> {
    let Json(body) = payload.map_err(|e| StudioError::InvalidRequest(e.body_text()))?;
    let request = GenerationRequest::from_json(body)?;

    let span = info_span!("generate", request_id = %Uuid::new_v4(), model = %request.model);
    async move {
        info!("🚀 Generating image from {} messages", request.messages.len());
        let image = state
            .openrouter
            .generate_image(&request.model, &request.messages)
            .await?;
        info!("✅ Returning image: {}", preview(&image, 50));
        Ok::<_, StudioError>(Json(GenerationEnvelope {
            response: GeneratedPayload { image },
        }))
    }
    .instrument(span)
    .await
}

async fn method_not_allowed(method: Method) -> StudioError {
    StudioError::MethodNotAllowed(method.to_string())
}

pub async fn list_presets() -> Json<&'static [Preset]> {
    Json(PRESETS)
}

/// Normalizes a raw image body. The media type comes from `Content-Type`.
pub async fn normalize_upload(headers: HeaderMap, body: Bytes) -> Result<Json<NormalizedImage>> {
    let media_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let normalized = normalize_image(SourceImage::new(body, media_type)).await?;
    Ok(Json(normalized))
}

pub async fn frame(
    State(state): State<AppState>,
    payload: std::result::Result<Json<FrameRequest>, JsonRejection>,
) -> Result<Json<GeneratedPayload>> {
    let Json(body) = payload.map_err(|e| StudioError::InvalidRequest(e.body_text()))?;
    // Client image is checked before the overlay asset is read
    let generated = decode_display_uri(&display_uri(&body.image))
        .map_err(|e| StudioError::InvalidRequest(format!("Image cannot be decoded: {e}")))?;
    let overlay = load_overlay(&state.frame_overlay, state.asset_timeout).await?;
    let image = frame_decoded(&generated, &overlay)?;
    Ok(Json(GeneratedPayload { image }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::net::SocketAddr;
    use tower::ServiceExt;

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-but-distinct";

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        addr
    }

    /// Chat-completions stand-in that answers every call with `completion`
    /// and serves `PNG_BYTES` at `/y.png`.
    async fn mock_provider(completion: impl Fn(SocketAddr) -> Value) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let body = completion(addr);
        let app = Router::new()
            .route("/chat/completions", post(move || async move { Json(body) }))
            .route("/y.png", get(|| async { PNG_BYTES }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        addr
    }

    fn app_for(api_base: String) -> Router {
        let config = AppConfig::from_lookup(|key| match key {
            "OPENROUTER_API_KEY" => Some("test-key".into()),
            "OPENROUTER_API_BASE" => Some(api_base.clone()),
            "UPSTREAM_TIMEOUT_SECS" => Some("5".into()),
            "IMAGE_FETCH_TIMEOUT_SECS" => Some("5".into()),
            "FRAME_OVERLAY_PATH" => Some("/nonexistent/frame-01.png".into()),
            _ => None,
        })
        .unwrap();
        router(AppState::from_config(&config).unwrap(), config.max_body_bytes)
    }

    fn submission(body: Value) -> Request<Body> {
        Request::post("/api/ai")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn messages() -> Value {
        json!([{"role": "user", "content": [{"type": "text", "text": "draw"}]}])
    }

    #[tokio::test]
    async fn empty_model_is_bad_request() {
        let app = app_for("http://127.0.0.1:9".into());
        let response = app
            .oneshot(submission(json!({"model": "", "messages": messages()})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({"error": "Model is required"}));
    }

    #[tokio::test]
    async fn non_array_messages_is_bad_request() {
        let app = app_for("http://127.0.0.1:9".into());
        let response = app
            .oneshot(submission(json!({"model": "x", "messages": "not-an-array"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({"error": "Messages must be an array"}));
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let app = app_for("http://127.0.0.1:9".into());
        let request = Request::post("/api/ai")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_is_method_not_allowed() {
        let app = app_for("http://127.0.0.1:9".into());
        let response = app
            .oneshot(Request::get("/api/ai").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "POST");
    }

    #[tokio::test]
    async fn remote_image_is_fetched_and_encoded() {
        let provider = mock_provider(|addr| {
            json!({"choices": [{"message": {"role": "assistant", "content": "", "images": [
                {"type": "image_url", "image_url": {"url": format!("http://{addr}/y.png")}}
            ]}}]})
        })
        .await;
        let app = app_for(format!("http://{provider}"));

        let response = app
            .oneshot(submission(json!({"model": "x", "messages": messages()})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"response": {"image": crate::extract::encode_payload(PNG_BYTES)}})
        );
    }

    #[tokio::test]
    async fn missing_images_is_generation_failure() {
        let provider = mock_provider(|_| {
            json!({"choices": [{"message": {"role": "assistant", "content": "I cannot draw"}}]})
        })
        .await;
        let app = app_for(format!("http://{provider}"));

        let response = app
            .oneshot(submission(json!({"model": "x", "messages": messages()})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            json!({"error": "No image found in the response"})
        );
    }

    #[tokio::test]
    async fn upstream_failure_is_terse() {
        let app_upstream = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, "{\"error\":\"bad key sk-live\"}") }),
        );
        let provider = serve(app_upstream).await;
        let app = app_for(format!("http://{provider}"));

        let response = app
            .oneshot(submission(json!({"model": "x", "messages": messages()})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await, json!({"error": "Error calling OpenAI API"}));
    }

    #[tokio::test]
    async fn broken_image_link_is_upstream_failure() {
        let provider = mock_provider(|addr| {
            json!({"choices": [{"message": {"images": [
                {"type": "image_url", "image_url": {"url": format!("http://{addr}/missing.png")}}
            ]}}]})
        })
        .await;
        let app = app_for(format!("http://{provider}"));

        let response = app
            .oneshot(submission(json!({"model": "x", "messages": messages()})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await, json!({"error": "Error calling OpenAI API"}));
    }

    #[tokio::test]
    async fn presets_are_listed_in_order() {
        let app = app_for("http://127.0.0.1:9".into());
        let response = app
            .oneshot(Request::get("/api/presets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body[4]["name"], "LEGO");
        assert_eq!(body.as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn normalize_rejects_non_images() {
        let app = app_for("http://127.0.0.1:9".into());
        let request = Request::post("/api/normalize")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("hello"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn normalize_bounds_uploads() {
        let app = app_for("http://127.0.0.1:9".into());
        let request = Request::post("/api/normalize")
            .header(header::CONTENT_TYPE, "image/png")
            .body(Body::from(crate::normalize::tests::png_bytes(1500, 600)))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!((body["width"].as_u64(), body["height"].as_u64()), (Some(1200), Some(480)));
        assert!(body["image"].as_str().unwrap().starts_with("data:image/jpeg;base64,"));
    }

    fn frame_request(image: String) -> Request<Body> {
        Request::post("/api/frame")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "image": image }).to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn frame_with_undecodable_image_is_bad_request() {
        let app = app_for("http://127.0.0.1:9".into());
        let response = app
            .oneshot(frame_request("iVBORw0KGgo=".into()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("Image cannot be decoded"));
    }

    #[tokio::test]
    async fn frame_without_overlay_asset_fails_explicitly() {
        let app = app_for("http://127.0.0.1:9".into());
        let image = crate::extract::encode_payload(&crate::normalize::tests::png_bytes(4, 4));
        let request = frame_request(image);
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("failed to load asset"));
    }
}
