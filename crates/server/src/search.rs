use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use pricelens_agent::{OracleError, OracleRequest};
use pricelens_core::domain::query::Query;
use pricelens_core::errors::{ApplicationError, DomainError, InterfaceError};
use pricelens_core::pricing::record::ProductPriceRecord;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::bootstrap::AppState;

pub const MAX_IMAGE_CHARS: usize = 5_000_000;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSearchRequest {
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImageSearchRequest {
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    correlation_id: &'a str,
}

/// Interface error rendered as `{ error, correlation_id }`.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    fn bad_request(message: impl Into<String>, correlation_id: &str) -> Self {
        Self(InterfaceError::BadRequest {
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        })
    }

    fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        Self(error.into_interface(correlation_id))
    }

    fn internal(message: impl Into<String>, correlation_id: &str) -> Self {
        Self(InterfaceError::Internal {
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            InterfaceError::PaymentRequired { .. } => StatusCode::PAYMENT_REQUIRED,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &self.0 {
            InterfaceError::BadRequest { message, .. } => message.as_str(),
            other => other.user_message(),
        };
        let body = ErrorBody { error: message, correlation_id: self.0.correlation_id() };

        (status, Json(body)).into_response()
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/price-search", post(price_search))
        .route("/api/v1/image-search", post(image_search))
}

pub async fn price_search(
    State(state): State<AppState>,
    payload: Result<Json<PriceSearchRequest>, JsonRejection>,
) -> Result<Json<ProductPriceRecord>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let Json(request) =
        payload.map_err(|rejection| ApiError::bad_request(rejection.body_text(), &correlation_id))?;

    let query = Query::new(
        request.product_name.as_deref().unwrap_or_default(),
        request.category.as_deref(),
    )
    .map_err(|error| {
        ApiError::from_application(DomainError::from(error).into(), &correlation_id)
    })?;

    let resolution = state.runtime.resolve(&query);
    let anchor = Utc::now().date_naive();

    let oracle_quote = match &state.oracle {
        Some(oracle) => {
            let request = OracleRequest::new(&query, &resolution, anchor);
            match tokio::time::timeout(state.oracle_timeout, oracle.quote(&request)).await {
                Ok(Ok(quote)) => Some(quote),
                Ok(Err(error)) if error.is_quota() => {
                    warn!(
                        event_name = "http.price_search.quota",
                        correlation_id = %correlation_id,
                        error = %error,
                        "gateway quota exhausted"
                    );
                    return Err(ApiError::from_application(error.into(), &correlation_id));
                }
                Ok(Err(error)) => {
                    warn!(
                        event_name = "http.price_search.oracle_fallback",
                        correlation_id = %correlation_id,
                        error = %error,
                        "gateway quote failed, synthesizing locally"
                    );
                    None
                }
                Err(_) => {
                    warn!(
                        event_name = "http.price_search.oracle_fallback",
                        correlation_id = %correlation_id,
                        error = "timed out",
                        "gateway quote timed out, synthesizing locally"
                    );
                    None
                }
            }
        }
        None => None,
    };

    let mut rng = StdRng::from_entropy();
    let synthesizer = state.runtime.synthesizer();
    let series = match &oracle_quote {
        Some(quote) => quote.into_series(synthesizer, &resolution.entry, anchor, &mut rng),
        None => synthesizer.synthesize(&resolution.entry, anchor, &mut rng),
    };

    let mut priced = state.runtime.assemble(&query, resolution, series);
    if let Some(quote) = &oracle_quote {
        quote.apply_specifications(&mut priced.record);
    }

    info!(
        event_name = "http.price_search.completed",
        correlation_id = %correlation_id,
        matched_key = %priced.resolution.matched_key,
        score = priced.resolution.score,
        source = ?priced.resolution.source,
        oracle_used = oracle_quote.is_some(),
        current_price_inr = priced.record.current_price_inr,
        "price search completed"
    );

    Ok(Json(priced.record))
}

pub async fn image_search(
    State(state): State<AppState>,
    payload: Result<Json<ImageSearchRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let Json(request) =
        payload.map_err(|rejection| ApiError::bad_request(rejection.body_text(), &correlation_id))?;

    let image = request.image.unwrap_or_default();
    validate_image(&image).map_err(|reason| ApiError::bad_request(reason, &correlation_id))?;

    let Some(oracle) = &state.oracle else {
        return Err(ApiError::from_application(
            ApplicationError::Integration("image identification backend is not configured".to_string()),
            &correlation_id,
        ));
    };

    let outcome = tokio::time::timeout(state.oracle_timeout, oracle.identify(&image))
        .await
        .unwrap_or_else(|_| Err(OracleError::Transport("gateway timed out".to_string())));

    match outcome {
        Ok(identification) => {
            info!(
                event_name = "http.image_search.completed",
                correlation_id = %correlation_id,
                product_name = identification.product_name.as_deref().unwrap_or("unknown"),
                "image identified"
            );
            serde_json::to_value(identification)
                .map(Json)
                .map_err(|error| ApiError::internal(error.to_string(), &correlation_id))
        }
        Err(OracleError::MalformedResponse(detail)) => {
            warn!(
                event_name = "http.image_search.unparsed",
                correlation_id = %correlation_id,
                detail = %detail,
                "gateway reply did not contain an identification"
            );
            Ok(Json(json!({ "error": "Could not identify product", "productName": null })))
        }
        Err(error) => Err(ApiError::from_application(error.into(), &correlation_id)),
    }
}

/// Accepts non-empty `data:image/` or `http(s)://` URLs up to [`MAX_IMAGE_CHARS`].
pub fn validate_image(image: &str) -> Result<(), &'static str> {
    if image.is_empty() {
        return Err("Invalid image: must be a non-empty string");
    }

    let is_data_url = image.starts_with("data:image/");
    let is_http_url = image.starts_with("http://") || image.starts_with("https://");
    if !is_data_url && !is_http_url {
        return Err("Invalid image format: must be a data URL or HTTP(S) URL");
    }

    if image.chars().count() > MAX_IMAGE_CHARS {
        return Err("Image too large: max 5MB");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;
    use axum::Router;
    use pricelens_agent::{
        Identification, OracleError, OracleQuote, OracleRequest, PricingOracle,
    };
    use pricelens_core::config::LoadOptions;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{validate_image, ApiError, MAX_IMAGE_CHARS};
    use crate::bootstrap::{bootstrap, AppState};
    use crate::routes;

    #[derive(Clone, Copy)]
    enum Script {
        Quote,
        RateLimited,
        PaymentRequired,
        Broken,
        Unparsable,
    }

    struct ScriptedOracle {
        script: Script,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PricingOracle for ScriptedOracle {
        async fn quote(&self, request: &OracleRequest) -> Result<OracleQuote, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script {
                Script::Quote => Ok(serde_json::from_value(json!({
                    "priceHistory": request
                        .history_months
                        .iter()
                        .map(|_| json!({ "priceINR": request.band.high * 10 }))
                        .collect::<Vec<_>>(),
                    "predictedPrices": [],
                    "specifications": { "description": "from gateway" }
                }))
                .map_err(|error| OracleError::MalformedResponse(error.to_string()))?),
                Script::RateLimited => Err(OracleError::RateLimited),
                Script::PaymentRequired => Err(OracleError::PaymentRequired),
                Script::Broken => Err(OracleError::Upstream { status: 500, message: "boom".into() }),
                Script::Unparsable => Err(OracleError::MalformedResponse("prose".into())),
            }
        }

        async fn identify(&self, _image: &str) -> Result<Identification, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script {
                Script::Quote => Ok(Identification {
                    product_name: Some("Nike Air Max 90".to_string()),
                    category: Some("fashion".to_string()),
                    confidence: Some(0.87),
                    description: None,
                }),
                Script::RateLimited => Err(OracleError::RateLimited),
                Script::PaymentRequired => Err(OracleError::PaymentRequired),
                Script::Broken => Err(OracleError::Transport("reset".into())),
                Script::Unparsable => Err(OracleError::MalformedResponse("prose".into())),
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn local_state() -> AppState {
        bootstrap(LoadOptions::default()).expect("bootstrap").state
    }

    fn scripted_state(script: Script) -> (AppState, Arc<ScriptedOracle>) {
        let oracle = Arc::new(ScriptedOracle { script, calls: AtomicUsize::new(0) });
        let mut state = local_state();
        let shared: Arc<dyn PricingOracle> = oracle.clone();
        state.oracle = Some(shared);
        state.oracle_timeout = Duration::from_secs(5);
        (state, oracle)
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn price_search_returns_local_record() {
        let app = routes::build(local_state());

        let (status, body) = post_json(
            app,
            "/api/v1/price-search",
            json!({ "productName": "Royal Enfield Classic 350", "category": "vehicles" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["productName"], "Royal Enfield Classic 350");
        assert_eq!(body["category"], "vehicles");
        assert_eq!(body["priceHistory"].as_array().map(Vec::len), Some(12));
        assert_eq!(body["predictedPrices"].as_array().map(Vec::len), Some(6));
        assert_eq!(body["specifications"]["brand"], "Royal Enfield");
    }

    #[tokio::test]
    async fn price_search_rejects_blank_product_name() {
        let app = routes::build(local_state());

        let (status, body) =
            post_json(app, "/api/v1/price-search", json!({ "productName": "  <>  " })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some_and(|message| message.contains("empty")));
        assert!(body["correlation_id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn price_search_rejects_overlong_product_name() {
        let app = routes::build(local_state());

        let (status, _) =
            post_json(app, "/api/v1/price-search", json!({ "productName": "x".repeat(201) })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn price_search_clamps_gateway_prices_into_band() {
        let (state, oracle) = scripted_state(Script::Quote);
        let band = state
            .catalog
            .get("tata salt 1kg")
            .map(|entry| entry.band())
            .expect("catalog entry");
        let app = routes::build(state);

        let (status, body) =
            post_json(app, "/api/v1/price-search", json!({ "productName": "tata salt 1kg" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
        assert_eq!(body["currentPriceINR"], band.high);
        assert_eq!(body["specifications"]["description"], "from gateway");
        let forecast = body["predictedPrices"].as_array().cloned().unwrap_or_default();
        assert_eq!(forecast.len(), 6);
        assert!(forecast.iter().all(|point| {
            point["priceINR"].as_i64().is_some_and(|price| band.contains(price))
        }));
    }

    #[tokio::test]
    async fn price_search_falls_back_when_gateway_fails() {
        let (state, oracle) = scripted_state(Script::Broken);
        let app = routes::build(state);

        let (status, body) =
            post_json(app, "/api/v1/price-search", json!({ "productName": "iphone 16" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
        assert_eq!(body["priceHistory"].as_array().map(Vec::len), Some(12));
    }

    #[tokio::test]
    async fn price_search_surfaces_gateway_quota_errors() {
        let (state, _) = scripted_state(Script::RateLimited);
        let (status, body) = post_json(
            routes::build(state),
            "/api/v1/price-search",
            json!({ "productName": "iphone 16" }),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "Rate limit exceeded. Please try again later.");

        let (state, _) = scripted_state(Script::PaymentRequired);
        let (status, body) = post_json(
            routes::build(state),
            "/api/v1/price-search",
            json!({ "productName": "iphone 16" }),
        )
        .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["error"], "Payment required. Please add credits to continue.");
    }

    #[tokio::test]
    async fn image_search_requires_backend() {
        let app = routes::build(local_state());

        let (status, body) = post_json(
            app,
            "/api/v1/image-search",
            json!({ "image": "https://example.test/shoe.jpg" }),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["correlation_id"].is_string());
    }

    #[tokio::test]
    async fn image_search_validates_before_calling_backend() {
        let (state, oracle) = scripted_state(Script::Quote);

        let (status, body) = post_json(
            routes::build(state.clone()),
            "/api/v1/image-search",
            json!({ "image": "ftp://example.test/shoe.jpg" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid image format: must be a data URL or HTTP(S) URL");

        let (status, _) =
            post_json(routes::build(state), "/api/v1/image-search", json!({ "image": 42 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn image_search_returns_identification() {
        let (state, _) = scripted_state(Script::Quote);

        let (status, body) = post_json(
            routes::build(state),
            "/api/v1/image-search",
            json!({ "image": "data:image/png;base64,iVBORw0KGgo=" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["productName"], "Nike Air Max 90");
        assert_eq!(body["confidence"], 0.87);
    }

    #[tokio::test]
    async fn image_search_reports_unidentified_product() {
        let (state, _) = scripted_state(Script::Unparsable);

        let (status, body) = post_json(
            routes::build(state),
            "/api/v1/image-search",
            json!({ "image": "https://example.test/blurry.jpg" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], "Could not identify product");
        assert!(body["productName"].is_null());
    }

    #[test]
    fn image_validation_enforces_size_and_scheme() {
        assert!(validate_image("").is_err());
        assert!(validate_image("data:image/jpeg;base64,AAAA").is_ok());
        assert!(validate_image("http://example.test/a.png").is_ok());

        let oversized = format!("data:image/png;base64,{}", "A".repeat(MAX_IMAGE_CHARS));
        assert_eq!(validate_image(&oversized), Err("Image too large: max 5MB"));
    }

    #[tokio::test]
    async fn internal_errors_hide_detail_behind_generic_message() {
        let response =
            ApiError::internal("key must be a string", "req-internal").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body: Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["error"], "An unexpected internal error occurred.");
        assert_eq!(body["correlation_id"], "req-internal");
    }
}
