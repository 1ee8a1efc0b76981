use std::time::{Duration, Instant};

use async_trait::async_trait;
use leadclaim_application::ClaimStrategy;
use leadclaim_core::{AppError, AppResult, AuthContext};
use leadclaim_domain::{
    ClaimAttempt, ClaimEndpoint, OpportunityId, TRANSPORT_FAILURE_CODE, is_claim_success,
    response_excerpt,
};
use reqwest::header;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

/// HTTP claim protocol with one fallback between the two endpoint shapes.
///
/// The primary shape is `POST {root}/Opportunity/Claim/{id}` with an empty body. Any other
/// outcome falls through to `POST {root}/Opportunity/{id}/Claim` exactly once.
pub struct HttpClaimStrategy {
    http_client: reqwest::Client,
    api_root: Url,
    timeout: Duration,
}

struct EndpointResponse {
    code: u16,
    excerpt: Option<String>,
}

impl HttpClaimStrategy {
    /// Creates a claim strategy for one API root.
    pub fn new(http_client: reqwest::Client, api_root: &str, timeout: Duration) -> AppResult<Self> {
        let api_root = Url::parse(api_root.trim_end_matches('/')).map_err(|error| {
            AppError::Validation(format!("invalid claim API root '{api_root}': {error}"))
        })?;

        if api_root.cannot_be_a_base() {
            return Err(AppError::Validation(format!(
                "claim API root '{api_root}' cannot carry a path"
            )));
        }

        Ok(Self {
            http_client,
            api_root,
            timeout,
        })
    }

    fn endpoint_url(&self, segments: [&str; 3]) -> Url {
        let mut url = self.api_root.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn primary_url(&self, opportunity_id: &OpportunityId) -> Url {
        self.endpoint_url(["Opportunity", "Claim", opportunity_id.as_str()])
    }

    fn secondary_url(&self, opportunity_id: &OpportunityId) -> Url {
        self.endpoint_url(["Opportunity", opportunity_id.as_str(), "Claim"])
    }

    async fn post(&self, url: Url, auth: &AuthContext, body: Option<Value>) -> EndpointResponse {
        let request = self
            .http_client
            .post(url.clone())
            .header(header::AUTHORIZATION, auth.authorization_header())
            .header(header::ACCEPT, "application/json")
            .timeout(self.timeout);
        let request = match body {
            Some(body) => request.json(&body),
            None => request.body(""),
        };

        match request.send().await {
            Ok(response) => {
                let code = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                EndpointResponse {
                    code,
                    excerpt: response_excerpt(body.as_str()),
                }
            }
            Err(error) => {
                debug!(url = %url, error = %error, "claim request failed in transport");
                EndpointResponse {
                    code: TRANSPORT_FAILURE_CODE,
                    excerpt: response_excerpt(error.to_string().as_str()),
                }
            }
        }
    }
}

#[async_trait]
impl ClaimStrategy for HttpClaimStrategy {
    async fn claim(
        &self,
        opportunity_id: &OpportunityId,
        auth: &AuthContext,
        dealer_id: Option<i64>,
    ) -> ClaimAttempt {
        let started = Instant::now();
        let elapsed_ms = || i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        let primary = self.post(self.primary_url(opportunity_id), auth, None).await;
        if is_claim_success(primary.code) {
            return ClaimAttempt {
                code: primary.code,
                endpoint: ClaimEndpoint::Primary,
                latency_ms: elapsed_ms(),
                response_excerpt: primary.excerpt,
            };
        }

        debug!(
            opportunity_id = %opportunity_id,
            status_code = primary.code,
            "primary claim endpoint declined; trying secondary"
        );

        let body = dealer_id.map(|dealer_id| json!({ "dealerId": dealer_id }));
        let secondary = self
            .post(self.secondary_url(opportunity_id), auth, body)
            .await;

        ClaimAttempt {
            code: secondary.code,
            endpoint: ClaimEndpoint::Secondary,
            latency_ms: elapsed_ms(),
            response_excerpt: secondary.excerpt,
        }
    }
}
