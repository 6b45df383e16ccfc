//! Fire classifier client
//!
//! The model runs out of process behind a TensorFlow-Serving style REST
//! endpoint. One request carries one instance (a three-frame stack); the
//! response carries the five model heads for that instance.

use super::frames::FrameStack;
use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default model endpoint
pub const DEFAULT_CLASSIFIER_URL: &str = "http://127.0.0.1:8501/v1/models/hermes:predict";

const USER_AGENT: &str = concat!("apollo-hv/", env!("CARGO_PKG_VERSION"));

/// Number of classes in each categorical head
pub const CLASS_COUNT: usize = 4;

/// Raw model heads for one input
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    /// Sigmoid fire-present probability
    pub fire_detected: f64,
    /// Sigmoid confidence head
    pub confidence_score: f64,
    pub type_num: [f64; CLASS_COUNT],
    pub severity_num: [f64; CLASS_COUNT],
    pub spread_num: [f64; CLASS_COUNT],
}

/// Classification model
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn predict(&self, frames: &FrameStack) -> PipelineResult<RawPrediction>;
}

#[derive(Serialize)]
struct PredictRequest {
    instances: Vec<Vec<Vec<Vec<[f32; 3]>>>>,
}

#[derive(Deserialize)]
struct PredictResponse {
    predictions: Vec<PredictionHeads>,
}

/// One instance's outputs as the serving layer names them
#[derive(Debug, Deserialize)]
struct PredictionHeads {
    fire_detected: Vec<f64>,
    confidence_score: Vec<f64>,
    type_num: Vec<f64>,
    severity_num: Vec<f64>,
    spread_num: Vec<f64>,
}

impl TryFrom<PredictionHeads> for RawPrediction {
    type Error = PipelineError;

    fn try_from(heads: PredictionHeads) -> PipelineResult<Self> {
        Ok(RawPrediction {
            fire_detected: scalar("fire_detected", &heads.fire_detected)?,
            confidence_score: scalar("confidence_score", &heads.confidence_score)?,
            type_num: categorical("type_num", &heads.type_num)?,
            severity_num: categorical("severity_num", &heads.severity_num)?,
            spread_num: categorical("spread_num", &heads.spread_num)?,
        })
    }
}

fn scalar(head: &str, values: &[f64]) -> PipelineResult<f64> {
    values
        .first()
        .copied()
        .ok_or_else(|| PipelineError::Inference(format!("classifier head '{}' is empty", head)))
}

fn categorical(head: &str, values: &[f64]) -> PipelineResult<[f64; CLASS_COUNT]> {
    values.try_into().map_err(|_| {
        PipelineError::Inference(format!(
            "classifier head '{}' has {} values, expected {}",
            head,
            values.len(),
            CLASS_COUNT
        ))
    })
}

/// REST classifier client
///
/// One request body is the full frame stack as JSON numbers
/// (3 x 224 x 224 x 3 floats), several megabytes per call. The serving
/// endpoint must accept bodies of that size.
pub struct HttpClassifier {
    http_client: reqwest::Client,
    url: String,
}

impl HttpClassifier {
    /// Create a client for the given predict endpoint
    ///
    /// `timeout` bounds a single HTTP exchange; the overall per-report
    /// deadline is enforced by the inference adapter.
    pub fn new(url: impl Into<String>, timeout: Duration) -> PipelineResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Inference(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn predict(&self, frames: &FrameStack) -> PipelineResult<RawPrediction> {
        let request = PredictRequest {
            instances: vec![frames.to_instance()],
        };

        tracing::debug!(url = %self.url, "Requesting classification");

        let response = self
            .http_client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::Inference(format!("classifier request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::Inference(format!(
                "classifier returned {}: {}",
                status.as_u16(),
                error_text
            )));
        }

        let body: PredictResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Inference(format!("invalid classifier response: {}", e)))?;

        body.predictions
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Inference("classifier returned no predictions".to_string()))?
            .try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::frames::Frame;
    use axum::{extract::DefaultBodyLimit, routing::post, Json, Router};
    use serde_json::{json, Value};

    fn blank_stack() -> FrameStack {
        let img = image::DynamicImage::new_rgb8(2, 2);
        FrameStack::replicate(Frame::from_image(&img))
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // A frame stack serializes to well over axum's 2 MB default
        let router = router.layer(DefaultBodyLimit::disable());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/predict", addr)
    }

    #[test]
    fn test_heads_conversion() {
        let heads: PredictionHeads = serde_json::from_value(json!({
            "fire_detected": [0.91],
            "confidence_score": [0.87],
            "type_num": [0.1, 0.7, 0.1, 0.1],
            "severity_num": [0.2, 0.5, 0.2, 0.1],
            "spread_num": [0.1, 0.1, 0.7, 0.1]
        }))
        .unwrap();

        let raw = RawPrediction::try_from(heads).unwrap();
        assert_eq!(raw.fire_detected, 0.91);
        assert_eq!(raw.confidence_score, 0.87);
        assert_eq!(raw.type_num, [0.1, 0.7, 0.1, 0.1]);
    }

    #[test]
    fn test_malformed_heads_are_inference_errors() {
        let heads = PredictionHeads {
            fire_detected: vec![],
            confidence_score: vec![0.5],
            type_num: vec![0.25; 4],
            severity_num: vec![0.25; 4],
            spread_num: vec![0.25; 4],
        };
        assert!(matches!(RawPrediction::try_from(heads), Err(PipelineError::Inference(_))));

        let heads = PredictionHeads {
            fire_detected: vec![0.5],
            confidence_score: vec![0.5],
            type_num: vec![0.5, 0.5],
            severity_num: vec![0.25; 4],
            spread_num: vec![0.25; 4],
        };
        assert!(matches!(RawPrediction::try_from(heads), Err(PipelineError::Inference(_))));
    }

    #[tokio::test]
    async fn test_http_round_trip() {
        let router = Router::new().route(
            "/predict",
            post(|Json(body): Json<Value>| async move {
                let instance = &body["instances"][0];
                assert_eq!(instance.as_array().unwrap().len(), 3);
                assert_eq!(instance[0].as_array().unwrap().len(), 224);
                Json(json!({
                    "predictions": [{
                        "fire_detected": [0.1],
                        "confidence_score": [0.1],
                        "type_num": [0.0, 0.0, 0.0, 1.0],
                        "severity_num": [0.0, 0.0, 0.0, 1.0],
                        "spread_num": [0.0, 0.0, 0.0, 1.0]
                    }]
                }))
            }),
        );
        let url = serve(router).await;

        let classifier = HttpClassifier::new(url, Duration::from_secs(5)).unwrap();
        let raw = classifier.predict(&blank_stack()).await.unwrap();
        assert_eq!(raw.fire_detected, 0.1);
        assert_eq!(raw.spread_num, [0.0, 0.0, 0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let router = Router::new().route(
            "/predict",
            post(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "model loading") }),
        );
        let url = serve(router).await;

        let classifier = HttpClassifier::new(url, Duration::from_secs(5)).unwrap();
        let err = classifier.predict(&blank_stack()).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
