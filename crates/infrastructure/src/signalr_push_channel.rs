//! SignalR JSON hub protocol client for the lead push channel.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use leadclaim_application::{PushChannelConnector, PushConnection};
use leadclaim_core::{AppError, AppResult, AuthContext};
use leadclaim_domain::PushEvent;
use reqwest::header;
use serde::Deserialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::{Instant, Interval};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION as WS_AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use url::Url;

const RECORD_SEPARATOR: char = '\u{1e}';
const HANDSHAKE_REQUEST: &str = "{\"protocol\":\"json\",\"version\":1}\u{1e}";
const PING_RECORD: &str = "{\"type\":6}\u{1e}";
const DEALER_QUERY_KEY: &str = "crmDealerId";
const MAX_NEGOTIATE_REDIRECTS: usize = 2;

/// One decoded hub protocol record.
#[derive(Debug, Clone, PartialEq)]
enum HubMessage {
    Invocation(PushEvent),
    Ping,
    Close(Option<String>),
    Other,
}

fn parse_message(value: &Value) -> HubMessage {
    match value.get("type").and_then(Value::as_u64) {
        Some(1) => match value.get("target").and_then(Value::as_str) {
            Some(target) => {
                let payload = value
                    .get("arguments")
                    .and_then(Value::as_array)
                    .and_then(|arguments| arguments.first())
                    .cloned()
                    .unwrap_or(Value::Null);
                HubMessage::Invocation(PushEvent::new(target, payload))
            }
            None => HubMessage::Other,
        },
        Some(6) => HubMessage::Ping,
        Some(7) => HubMessage::Close(
            value
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_owned),
        ),
        _ => HubMessage::Other,
    }
}

/// Splits one text frame into its records.
fn split_records(frame: &str) -> impl Iterator<Item = &str> {
    frame
        .split(RECORD_SEPARATOR)
        .map(str::trim)
        .filter(|record| !record.is_empty())
}

fn parse_records(frame: &str) -> Vec<HubMessage> {
    split_records(frame)
        .filter_map(|record| match serde_json::from_str::<Value>(record) {
            Ok(value) => Some(parse_message(&value)),
            Err(error) => {
                debug!(error = %error, "skipping unreadable hub record");
                None
            }
        })
        .collect()
}

/// Returns the server's handshake error, if the record carries one.
fn handshake_error(record: &str) -> AppResult<()> {
    let value = serde_json::from_str::<Value>(record).map_err(|error| {
        AppError::Transport(format!("unreadable hub handshake response: {error}"))
    })?;

    match value.get("error").and_then(Value::as_str) {
        Some(error) => Err(AppError::Transport(format!(
            "hub rejected handshake: {error}"
        ))),
        None => Ok(()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NegotiateResponse {
    connection_token: Option<String>,
    connection_id: Option<String>,
    url: Option<String>,
    access_token: Option<String>,
}

/// Opens SignalR connections: negotiate over HTTP, then upgrade to a WebSocket.
pub struct SignalRPushConnector {
    http_client: reqwest::Client,
    hub_url: Url,
    ping_interval: Duration,
    handshake_timeout: Duration,
}

impl SignalRPushConnector {
    /// Creates a connector for one hub. The dealer id is appended as `crmDealerId` when absent.
    pub fn new(
        http_client: reqwest::Client,
        hub_url: &str,
        dealer_id: Option<i64>,
    ) -> AppResult<Self> {
        let mut hub_url = Url::parse(hub_url).map_err(|error| {
            AppError::Validation(format!("invalid push hub url '{hub_url}': {error}"))
        })?;

        if let Some(dealer_id) = dealer_id {
            let has_dealer = hub_url.query_pairs().any(|(key, _)| key == DEALER_QUERY_KEY);
            if !has_dealer {
                hub_url
                    .query_pairs_mut()
                    .append_pair(DEALER_QUERY_KEY, dealer_id.to_string().as_str());
            }
        }

        Ok(Self {
            http_client,
            hub_url,
            ping_interval: Duration::from_secs(15),
            handshake_timeout: Duration::from_secs(10),
        })
    }

    /// Returns the hub URL with dealer context applied.
    #[must_use]
    pub fn hub_url(&self) -> &Url {
        &self.hub_url
    }

    async fn negotiate(&self, auth: &AuthContext) -> AppResult<(Url, String, Option<String>)> {
        let mut hub_url = self.hub_url.clone();
        let mut access_token = auth.bearer_token().to_owned();

        for _ in 0..=MAX_NEGOTIATE_REDIRECTS {
            let response = self
                .http_client
                .post(negotiate_url(&hub_url))
                .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
                .body("")
                .send()
                .await
                .map_err(|error| {
                    AppError::Transport(format!("hub negotiate failed: {}", error.without_url()))
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(AppError::Transport(format!(
                    "hub negotiate returned status {}",
                    status.as_u16()
                )));
            }

            let negotiated = response.json::<NegotiateResponse>().await.map_err(|error| {
                AppError::Transport(format!("unreadable hub negotiate response: {error}"))
            })?;

            match negotiated.url {
                Some(redirect) => {
                    hub_url = Url::parse(redirect.as_str()).map_err(|error| {
                        AppError::Transport(format!("invalid hub redirect '{redirect}': {error}"))
                    })?;
                    if let Some(token) = negotiated.access_token {
                        access_token = token;
                    }
                }
                None => {
                    let connection_id = negotiated.connection_token.or(negotiated.connection_id);
                    return Ok((hub_url, access_token, connection_id));
                }
            }
        }

        Err(AppError::Transport(
            "hub negotiate redirected too many times".to_owned(),
        ))
    }
}

fn negotiate_url(hub_url: &Url) -> Url {
    let mut url = hub_url.clone();
    let path = format!("{}/negotiate", hub_url.path().trim_end_matches('/'));
    url.set_path(path.as_str());
    url.query_pairs_mut().append_pair("negotiateVersion", "1");
    url
}

fn websocket_url(
    hub_url: &Url,
    connection_id: Option<&str>,
    access_token: &str,
) -> AppResult<Url> {
    let mut url = hub_url.clone();
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(AppError::Validation(format!(
                "unsupported push hub scheme '{other}'"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| AppError::Validation(format!("cannot switch hub url to '{scheme}'")))?;

    {
        let mut query = url.query_pairs_mut();
        if let Some(connection_id) = connection_id {
            query.append_pair("id", connection_id);
        }
        query.append_pair("access_token", access_token);
    }

    Ok(url)
}

#[async_trait]
impl PushChannelConnector for SignalRPushConnector {
    async fn connect(&self, auth: &AuthContext) -> AppResult<Box<dyn PushConnection>> {
        let (hub_url, access_token, connection_id) = self.negotiate(auth).await?;
        let ws_url = websocket_url(&hub_url, connection_id.as_deref(), access_token.as_str())?;

        let mut request = ws_url.as_str().into_client_request().map_err(|error| {
            AppError::Transport(format!("invalid hub websocket request: {error}"))
        })?;
        let bearer = HeaderValue::from_str(format!("Bearer {access_token}").as_str())
            .map_err(|error| AppError::Validation(format!("invalid bearer header: {error}")))?;
        request.headers_mut().insert(WS_AUTHORIZATION, bearer);

        let (mut stream, _) = connect_async(request).await.map_err(|error| {
            AppError::Transport(format!("hub websocket connect failed: {error}"))
        })?;

        stream
            .send(Message::text(HANDSHAKE_REQUEST))
            .await
            .map_err(|error| AppError::Transport(format!("hub handshake send failed: {error}")))?;

        let backlog = tokio::time::timeout(self.handshake_timeout, read_handshake(&mut stream))
            .await
            .map_err(|_| AppError::Transport("hub handshake timed out".to_owned()))??;

        Ok(Box::new(SignalRConnection {
            stream,
            backlog,
            ping: tokio::time::interval_at(Instant::now() + self.ping_interval, self.ping_interval),
        }))
    }
}

type HubStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Invocations received but not yet handed out, plus a close record if one arrived.
#[derive(Debug, Default)]
struct Backlog {
    events: VecDeque<PushEvent>,
    closed: Option<Option<String>>,
}

impl Backlog {
    /// Queues the invocations of one frame. Records after a close are ignored.
    fn absorb(&mut self, frame: &str) {
        for message in parse_records(frame) {
            if self.closed.is_some() {
                return;
            }

            match message {
                HubMessage::Invocation(event) => self.events.push_back(event),
                HubMessage::Close(error) => {
                    if let Some(error) = &error {
                        warn!(error = %error, "hub closed the connection with an error");
                    }
                    self.closed = Some(error);
                }
                HubMessage::Ping | HubMessage::Other => {}
            }
        }
    }

    /// Returns the next queued event, then the close once the queue is drained.
    fn take_next(&mut self) -> Option<AppResult<Option<PushEvent>>> {
        if let Some(event) = self.events.pop_front() {
            return Some(Ok(Some(event)));
        }

        match &self.closed {
            None => None,
            Some(None) => Some(Ok(None)),
            Some(Some(error)) => Some(Err(AppError::Transport(format!("hub closed: {error}")))),
        }
    }
}

async fn read_handshake(stream: &mut HubStream) -> AppResult<Backlog> {
    while let Some(frame) = stream.next().await {
        let frame = frame
            .map_err(|error| AppError::Transport(format!("hub handshake read failed: {error}")))?;

        match frame {
            Message::Text(text) => {
                let mut records = split_records(text.as_str());
                if let Some(first) = records.next() {
                    handshake_error(first)?;
                }

                let mut backlog = Backlog::default();
                backlog.absorb(records.collect::<Vec<_>>().join("\u{1e}").as_str());
                return Ok(backlog);
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    Err(AppError::Transport(
        "hub closed before completing the handshake".to_owned(),
    ))
}

struct SignalRConnection {
    stream: HubStream,
    backlog: Backlog,
    ping: Interval,
}

#[async_trait]
impl PushConnection for SignalRConnection {
    async fn next_event(&mut self) -> AppResult<Option<PushEvent>> {
        let Self {
            stream,
            backlog,
            ping,
        } = self;

        loop {
            if let Some(next) = backlog.take_next() {
                return next;
            }

            let frame = tokio::select! {
                _ = ping.tick() => {
                    stream.send(Message::text(PING_RECORD)).await.map_err(|error| {
                        AppError::Transport(format!("hub ping failed: {error}"))
                    })?;
                    continue;
                }
                frame = stream.next() => frame,
            };

            let Some(frame) = frame else {
                return Ok(None);
            };
            let frame =
                frame.map_err(|error| AppError::Transport(format!("hub read failed: {error}")))?;

            match frame {
                Message::Text(text) => backlog.absorb(text.as_str()),
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
    }
}
