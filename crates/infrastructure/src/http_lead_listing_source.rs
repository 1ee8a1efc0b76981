use async_trait::async_trait;
use leadclaim_application::LeadListingSource;
use leadclaim_core::{AppError, AppResult, AuthContext};
use leadclaim_domain::response_excerpt;
use reqwest::header;
use serde_json::Value;
use url::Url;

/// Pending-leads listing endpoint.
///
/// Sends an optional raw cookie header and, when given credentials, a bearer token.
pub struct HttpLeadListingSource {
    http_client: reqwest::Client,
    url: Url,
    cookie: Option<String>,
}

impl HttpLeadListingSource {
    /// Creates a listing source.
    pub fn new(http_client: reqwest::Client, url: &str, cookie: Option<String>) -> AppResult<Self> {
        let url = Url::parse(url).map_err(|error| {
            AppError::Validation(format!("invalid lead listing url '{url}': {error}"))
        })?;

        Ok(Self {
            http_client,
            url,
            cookie: cookie
                .map(|cookie| cookie.trim().to_owned())
                .filter(|cookie| !cookie.is_empty()),
        })
    }
}

#[async_trait]
impl LeadListingSource for HttpLeadListingSource {
    async fn fetch_listing(&self, auth: Option<&AuthContext>) -> AppResult<Value> {
        let mut request = self
            .http_client
            .get(self.url.clone())
            .header(header::ACCEPT, "application/json");
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie.as_str());
        }
        if let Some(auth) = auth {
            request = request.header(header::AUTHORIZATION, auth.authorization_header());
        }

        let response = request.send().await.map_err(|error| {
            AppError::Transport(format!("failed to call lead listing endpoint: {error}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Transport(format!(
                "lead listing endpoint returned status {}: {}",
                status.as_u16(),
                response_excerpt(body.as_str()).unwrap_or_default()
            )));
        }

        response.json::<Value>().await.map_err(|error| {
            AppError::Validation(format!("lead listing body is not JSON: {error}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use leadclaim_application::LeadListingSource;
    use leadclaim_core::{AppError, AuthContext, Region};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::HttpLeadListingSource;

    #[tokio::test]
    async fn cookie_and_bearer_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/leads/pending"))
            .and(header("cookie", "session=abc"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        let source = HttpLeadListingSource::new(
            reqwest::Client::new(),
            format!("{}/leads/pending", server.uri()).as_str(),
            Some("session=abc".to_owned()),
        )
        .unwrap_or_else(|_| unreachable!());
        let auth = AuthContext::new(
            Region::new("Central FL").unwrap_or_else(|_| unreachable!()),
            "tok",
            Utc::now(),
        );

        let listing = source.fetch_listing(Some(&auth)).await;
        assert_eq!(listing.ok(), Some(json!({"data": []})));
    }

    #[tokio::test]
    async fn error_status_is_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let source = HttpLeadListingSource::new(reqwest::Client::new(), server.uri().as_str(), None)
            .unwrap_or_else(|_| unreachable!());

        assert!(matches!(
            source.fetch_listing(None).await,
            Err(AppError::Transport(_))
        ));
    }
}
