//! Scorer delegating to an HTTP inference endpoint.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use hygieia_core::{
    model::AnalysisReport,
    ports::{FacilityScorer, PortError},
};

/// Body returned by the inference endpoint.
#[derive(Debug, Deserialize)]
struct InferenceResponse {
    cleanliness_score: i64,
    garbage_detected: bool,
    water_present: bool,
    // a grade may be present; it is recomputed from the score
}

/// Posts the raw image to an inference service and reads back its verdict.
pub struct RemoteScorer {
    client: Client,
    endpoint: Url,
}

impl RemoteScorer {
    /// Create a scorer bound to the given HTTP client and endpoint.
    #[must_use]
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl FacilityScorer for RemoteScorer {
    fn name(&self) -> &str {
        "remote"
    }

    async fn analyze(&self, payload: &[u8]) -> Result<AnalysisReport, PortError> {
        let req = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(payload.to_vec());

        let verdict = fetch_json::<InferenceResponse>(req).await?;
        debug!(endpoint = %self.endpoint, score = verdict.cleanliness_score, "inference response");

        Ok(AnalysisReport::new(
            verdict.cleanliness_score,
            verdict.garbage_detected,
            verdict.water_present,
        ))
    }
}

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, PortError> {
    req.send()
        .await
        .map_err(PortError::from)?
        .error_for_status()
        .map_err(PortError::from)?
        .json()
        .await
        .map_err(PortError::from)
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::body::Bytes;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Json;
    use hygieia_core::model::Grade;
    use serde_json::{Value, json};

    use super::*;

    async fn start_server(app: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/infer")).unwrap()
    }

    #[tokio::test]
    async fn reads_verdict_and_regrades() {
        let app = Router::new().route(
            "/infer",
            post(|body: Bytes| async move {
                let score = if body.as_ref() == b"clean" { 91 } else { 12 };
                Json(json!({
                    "cleanliness_score": score,
                    "garbage_detected": false,
                    "water_present": true,
                    "grade": "D"
                }))
            }),
        );
        let scorer = RemoteScorer::new(Client::new(), start_server(app).await);

        let report = scorer.analyze(b"clean").await.unwrap();
        assert_eq!(report.cleanliness_score(), 91);
        assert_eq!(report.grade(), Grade::A);
        assert!(report.water_present());
    }

    #[tokio::test]
    async fn server_errors_are_network_failures() {
        let app = Router::new().route(
            "/infer",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, Json(Value::Null)) }),
        );
        let scorer = RemoteScorer::new(Client::new(), start_server(app).await);

        let result = scorer.analyze(b"img").await;
        assert!(matches!(result, Err(PortError::Network(_))));
    }
}
