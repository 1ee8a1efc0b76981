use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use leadclaim_application::TokenProvider;
use leadclaim_core::{AppError, AppResult, AuthContext, Region};
use leadclaim_domain::response_excerpt;
use serde_json::Value;
use url::Url;

/// Client for the regional token-issuing service.
///
/// Calls `GET {endpoint}?region=..&secret=..` and expects `{id_token, expires_at}`.
pub struct HttpTokenProvider {
    http_client: reqwest::Client,
    endpoint: Url,
    secret: String,
}

impl HttpTokenProvider {
    /// Creates a token provider.
    pub fn new(
        http_client: reqwest::Client,
        endpoint: &str,
        secret: impl Into<String>,
    ) -> AppResult<Self> {
        let endpoint = Url::parse(endpoint).map_err(|error| {
            AppError::Validation(format!("invalid token service url '{endpoint}': {error}"))
        })?;

        Ok(Self {
            http_client,
            endpoint,
            secret: secret.into(),
        })
    }

    fn request_url(&self, region: &Region) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("region", region.as_str())
            .append_pair("secret", self.secret.as_str());
        url
    }
}

/// Parses the token service expiry: epoch milliseconds as number or string, or RFC 3339.
fn parse_expires_at(value: &Value) -> AppResult<DateTime<Utc>> {
    let millis = match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => match text.trim().parse::<i64>() {
            Ok(millis) => Some(millis),
            Err(_) => {
                return DateTime::parse_from_rfc3339(text.trim())
                    .map(|parsed| parsed.with_timezone(&Utc))
                    .map_err(|error| {
                        AppError::Unauthorized(format!(
                            "token service returned unreadable expires_at '{text}': {error}"
                        ))
                    });
            }
        },
        _ => None,
    };

    millis
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        .ok_or_else(|| {
            AppError::Unauthorized(format!(
                "token service returned unreadable expires_at '{value}'"
            ))
        })
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn fetch_token(&self, region: &Region) -> AppResult<AuthContext> {
        let response = self
            .http_client
            .get(self.request_url(region))
            .send()
            .await
            .map_err(|error| {
                AppError::Unauthorized(format!(
                    "token service unreachable for region '{region}': {}",
                    error.without_url()
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Unauthorized(format!(
                "token service returned status {} for region '{region}': {}",
                status.as_u16(),
                response_excerpt(body.as_str()).unwrap_or_default()
            )));
        }

        let body = response.json::<Value>().await.map_err(|error| {
            AppError::Unauthorized(format!(
                "token service returned an unreadable body for region '{region}': {error}"
            ))
        })?;

        let token = body
            .get("id_token")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AppError::Unauthorized(format!(
                    "token service returned no id_token for region '{region}'"
                ))
            })?;

        let expires_at = match body.get("expires_at") {
            Some(value) if !value.is_null() => parse_expires_at(value)?,
            _ => Utc::now(),
        };

        Ok(AuthContext::new(region.clone(), token, expires_at))
    }
}
