use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use crate::pipeline::narrative::{Narrative, NarrativeError, NarrativeGenerator, NarrativeRequest};

/// narrative サービスの HTTP クライアント。
#[derive(Debug, Clone)]
pub struct NarrativeClient {
    client: Client,
    endpoint: Url,
}

impl NarrativeClient {
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        total_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(total_timeout)
            .build()
            .context("failed to build narrative client")?;

        let base_url = Url::parse(&base_url.into()).context("invalid narrative base URL")?;
        let endpoint = base_url
            .join("v1/narratives")
            .context("failed to build narrative URL")?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl NarrativeGenerator for NarrativeClient {
    async fn generate(&self, request: &NarrativeRequest<'_>) -> Result<Narrative, NarrativeError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(NarrativeError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NarrativeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let narrative: Narrative = response.json().await.map_err(NarrativeError::Decode)?;
        if narrative.concise_summary.is_empty() && narrative.long_summary.is_empty() {
            return Err(NarrativeError::Empty);
        }

        debug!(
            concise_len = narrative.concise_summary.len(),
            long_len = narrative.long_summary.len(),
            "narrative generated"
        );
        Ok(narrative)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::pipeline::category::Profile;

    fn client(server: &MockServer) -> NarrativeClient {
        NarrativeClient::new(server.uri(), Duration::from_secs(1), Duration::from_secs(5))
            .expect("client should build")
    }

    #[tokio::test]
    async fn generate_posts_formatted_dataset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/narratives"))
            .and(body_partial_json(json!({
                "formatted": "=== MAJOR ===",
                "period": "weekly",
                "profile": {"keywords": ["Rust"]},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "Your week",
                "concise_summary": "Short [1:1]",
                "long_summary": "Long [1:1][1:2]",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let profile = Profile {
            keywords: vec!["Rust".to_string()],
            ..Profile::default()
        };
        let narrative = client(&server)
            .generate(&NarrativeRequest {
                formatted: "=== MAJOR ===",
                profile: &profile,
                period: "weekly",
            })
            .await
            .expect("generate succeeds");

        assert_eq!(narrative.title, "Your week");
        assert_eq!(narrative.long_summary, "Long [1:1][1:2]");
    }

    #[tokio::test]
    async fn error_status_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/narratives"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let profile = Profile::default();
        let error = client(&server)
            .generate(&NarrativeRequest {
                formatted: "",
                profile: &profile,
                period: "daily",
            })
            .await
            .expect_err("should fail");

        assert!(matches!(
            error,
            NarrativeError::Status { status: 429, ref body } if body == "slow down"
        ));
    }

    #[tokio::test]
    async fn empty_narrative_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/narratives"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "x"})))
            .mount(&server)
            .await;

        let profile = Profile::default();
        let error = client(&server)
            .generate(&NarrativeRequest {
                formatted: "",
                profile: &profile,
                period: "weekly",
            })
            .await
            .expect_err("should fail");

        assert!(matches!(error, NarrativeError::Empty));
    }
}
