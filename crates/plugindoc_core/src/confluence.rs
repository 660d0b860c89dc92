use std::thread::sleep;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::RETRY_AFTER;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::directory::{PageDirectory, RemotePage};
use crate::error::DirectoryError;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080";
pub const DEFAULT_USER_AGENT: &str = "plugindoc/0.1";
pub const DEFAULT_VERSION_MESSAGE: &str = "plugindoc: refresh plugin documentation";
const LEGACY_RPC_SUFFIX: &str = "/rpc/xmlrpc";

#[derive(Debug, Clone)]
pub struct ConfluenceClientConfig {
    pub endpoint: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub rate_limit_read_ms: u64,
    pub rate_limit_write_ms: u64,
    pub max_retries: usize,
    pub max_write_retries: usize,
    pub retry_delay_ms: u64,
    pub version_message: String,
}

impl Default for ConfluenceClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: 30_000,
            rate_limit_read_ms: 100,
            rate_limit_write_ms: 300,
            max_retries: 2,
            max_write_retries: 1,
            retry_delay_ms: 500,
            version_message: DEFAULT_VERSION_MESSAGE.to_string(),
        }
    }
}

/// [`PageDirectory`] over the Confluence REST API.
///
/// A session is a verified set of basic-auth credentials attached to every
/// request; logging out drops them.
pub struct ConfluenceClient {
    client: Client,
    config: ConfluenceClientConfig,
    api_base: String,
    credentials: Option<(String, String)>,
    last_request_at: Option<Instant>,
    request_count: usize,
}

/// A non-success response or transport failure, before it is mapped onto
/// the error of the operation that caused it.
#[derive(Debug)]
struct HttpFailure {
    status: Option<StatusCode>,
    message: String,
}

impl ConfluenceClient {
    pub fn new(config: ConfluenceClientConfig) -> Result<Self> {
        let api_base = api_base(&config.endpoint);
        Url::parse(&api_base)
            .with_context(|| format!("invalid Confluence endpoint: {}", config.endpoint))?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build Confluence HTTP client")?;

        Ok(Self {
            client,
            config,
            api_base,
            credentials: None,
            last_request_at: None,
            request_count: 0,
        })
    }

    fn send<F>(&mut self, build: F, is_write: bool) -> Result<Value, HttpFailure>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let max_retries = if is_write {
            self.config.max_write_retries
        } else {
            self.config.max_retries
        };

        for attempt in 0..=max_retries {
            self.pace(is_write);
            self.request_count += 1;
            let mut request = build(&self.client)
                .header("User-Agent", self.config.user_agent.clone())
                .header("Accept", "application/json");
            if let Some((username, password)) = &self.credentials {
                request = request.basic_auth(username, Some(password));
            }

            match request.send() {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<Value>().map_err(|error| HttpFailure {
                            status: Some(status),
                            message: format!("failed to decode Confluence JSON response: {error}"),
                        });
                    }
                    if attempt < max_retries && is_transient_status(status) {
                        let delay = retry_after(&response).unwrap_or_else(|| {
                            backoff_delay(self.config.retry_delay_ms, attempt, is_write)
                        });
                        debug!(%status, attempt, ?delay, "retrying Confluence request");
                        sleep(delay.saturating_add(jitter()));
                        continue;
                    }
                    let body = response.text().unwrap_or_default();
                    return Err(HttpFailure {
                        status: Some(status),
                        message: format!("HTTP {status}: {}", error_message(&body)),
                    });
                }
                Err(error) => {
                    if attempt < max_retries && (error.is_timeout() || error.is_connect()) {
                        debug!(%error, attempt, "retrying Confluence request");
                        sleep(
                            backoff_delay(self.config.retry_delay_ms, attempt, is_write)
                                .saturating_add(jitter()),
                        );
                        continue;
                    }
                    return Err(HttpFailure {
                        status: None,
                        message: format!("failed to call Confluence API: {error}"),
                    });
                }
            }
        }

        Err(HttpFailure {
            status: None,
            message: "Confluence API request exhausted retry budget".to_string(),
        })
    }

    /// Keep a minimum gap between consecutive requests; writes get the
    /// wider one.
    fn pace(&mut self, is_write: bool) {
        let gap_ms = if is_write {
            self.config.rate_limit_write_ms
        } else {
            self.config.rate_limit_read_ms
        };
        let gap = Duration::from_millis(gap_ms);
        if let Some(remaining) = self
            .last_request_at
            .and_then(|last| gap.checked_sub(last.elapsed()))
        {
            sleep(remaining);
        }
        self.last_request_at = Some(Instant::now());
    }

    fn content_url(&self) -> String {
        format!("{}/rest/api/content", self.api_base)
    }
}

impl PageDirectory for ConfluenceClient {
    fn login(&mut self, username: &str, password: &str) -> Result<(), DirectoryError> {
        self.credentials = Some((username.to_string(), password.to_string()));
        let url = format!("{}/rest/api/user/current", self.api_base);
        let result = self.send(|client| client.get(&url), false);

        let failure = match result {
            Ok(payload) => match serde_json::from_value::<CurrentUserPayload>(payload) {
                Ok(user) if user.kind.as_deref() != Some("anonymous") => {
                    debug!(
                        user = user.username.as_deref().unwrap_or(username),
                        "session verified"
                    );
                    return Ok(());
                }
                Ok(_) => {
                    DirectoryError::Auth(format!("credentials for {username} were not accepted"))
                }
                Err(error) => DirectoryError::Decode(error.to_string()),
            },
            Err(failure) if failure.is_auth() => DirectoryError::Auth(failure.message),
            Err(failure) => DirectoryError::Transport(failure.message),
        };
        self.credentials = None;
        Err(failure)
    }

    fn logout(&mut self) -> Result<(), DirectoryError> {
        self.credentials = None;
        Ok(())
    }

    fn find_page(
        &mut self,
        space: &str,
        title: &str,
    ) -> Result<Option<RemotePage>, DirectoryError> {
        let url = self.content_url();
        let payload = self
            .send(
                |client| {
                    client.get(&url).query(&[
                        ("spaceKey", space),
                        ("title", title),
                        ("type", "page"),
                        ("expand", "body.storage,version,ancestors,space"),
                    ])
                },
                false,
            )
            .map_err(HttpFailure::into_read_error)?;
        let parsed: ContentSearchResponse = serde_json::from_value(payload)
            .map_err(|error| DirectoryError::Decode(error.to_string()))?;
        Ok(matching_page(parsed.results, title)
            .map(|item| page_from_payload(item, space, None, "")))
    }

    fn create_page(
        &mut self,
        space: &str,
        title: &str,
        parent_id: &str,
        body: &str,
    ) -> Result<RemotePage, DirectoryError> {
        let url = self.content_url();
        let request = create_request(space, title, parent_id, body);
        let payload = self
            .send(|client| client.post(&url).json(&request), true)
            .map_err(|failure| failure.into_write_error(space, title))?;
        let parsed: ContentPayload = serde_json::from_value(payload)
            .map_err(|error| DirectoryError::Decode(error.to_string()))?;
        Ok(page_from_payload(parsed, space, Some(parent_id), body))
    }

    fn update_page(&mut self, page: &RemotePage, body: &str) -> Result<RemotePage, DirectoryError> {
        let url = format!("{}/{}", self.content_url(), page.id);
        let request = update_request(page, body, &self.config.version_message);
        let payload = self
            .send(|client| client.put(&url).json(&request), true)
            .map_err(|failure| failure.into_write_error(&page.space_key, &page.title))?;
        let parsed: ContentPayload = serde_json::from_value(payload)
            .map_err(|error| DirectoryError::Decode(error.to_string()))?;
        Ok(page_from_payload(
            parsed,
            &page.space_key,
            page.parent_id.as_deref(),
            body,
        ))
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

impl HttpFailure {
    fn is_auth(&self) -> bool {
        matches!(
            self.status,
            Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        )
    }

    fn is_conflict(&self) -> bool {
        match self.status {
            Some(StatusCode::CONFLICT) => true,
            Some(StatusCode::BAD_REQUEST) => self.message.contains("already exists"),
            _ => false,
        }
    }

    fn into_read_error(self) -> DirectoryError {
        if self.is_auth() {
            DirectoryError::Auth(self.message)
        } else {
            DirectoryError::Transport(self.message)
        }
    }

    fn into_write_error(self, space: &str, title: &str) -> DirectoryError {
        if self.is_auth() {
            DirectoryError::Auth(self.message)
        } else if self.is_conflict() {
            DirectoryError::Conflict {
                space: space.to_string(),
                title: title.to_string(),
            }
        } else {
            warn!(title, message = %self.message, "Confluence rejected page write");
            DirectoryError::RemoteWrite(self.message)
        }
    }
}

/// REST base for an endpoint, accepting the legacy XML-RPC URL form.
pub fn api_base(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    trimmed
        .strip_suffix(LEGACY_RPC_SUFFIX)
        .unwrap_or(trimmed)
        .trim_end_matches('/')
        .to_string()
}

fn create_request(space: &str, title: &str, parent_id: &str, body: &str) -> Value {
    json!({
        "type": "page",
        "title": title,
        "space": { "key": space },
        "ancestors": [{ "id": parent_id }],
        "body": { "storage": { "value": body, "representation": "storage" } },
    })
}

fn update_request(page: &RemotePage, body: &str, message: &str) -> Value {
    json!({
        "id": page.id,
        "type": "page",
        "title": page.title,
        "space": { "key": page.space_key },
        "version": { "number": page.version + 1, "message": message },
        "body": { "storage": { "value": body, "representation": "storage" } },
    })
}

/// Build a page from a content payload, using what the caller already knows
/// for fields the service left out of its response.
fn page_from_payload(
    payload: ContentPayload,
    space: &str,
    parent_id: Option<&str>,
    body: &str,
) -> RemotePage {
    let parent_from_ancestors = payload.ancestors.last().map(|item| item.id.clone());
    RemotePage {
        id: payload.id,
        title: payload.title,
        space_key: payload
            .space
            .map(|item| item.key)
            .unwrap_or_else(|| space.to_string()),
        parent_id: parent_from_ancestors.or_else(|| parent_id.map(ToString::to_string)),
        body: payload
            .body
            .and_then(|item| item.storage)
            .map(|item| item.value)
            .unwrap_or_else(|| body.to_string()),
        version: payload.version.map(|item| item.number).unwrap_or(1),
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| payload.message)
        .unwrap_or_else(|| body.chars().take(200).collect())
}

/// Overload and gateway failures. Anything else is answered for good.
fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || matches!(status.as_u16(), 502..=504)
}

/// Server-requested wait, in seconds.
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Doubles per attempt; writes wait twice as long.
fn backoff_delay(retry_delay_ms: u64, attempt: usize, is_write: bool) -> Duration {
    let factor = 1u64 << attempt.min(16);
    let scale = if is_write { 2 } else { 1 };
    Duration::from_millis(retry_delay_ms.saturating_mul(factor).saturating_mul(scale))
}

fn jitter() -> Duration {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.subsec_millis() % 100)
        .unwrap_or(0);
    Duration::from_millis(u64::from(millis))
}

/// The search matches titles the way the server stores them; prefer the
/// exact spelling and fall back to a case-insensitive match.
fn matching_page(results: Vec<ContentPayload>, title: &str) -> Option<ContentPayload> {
    let wanted = title.to_lowercase();
    let mut fallback = None;
    for item in results {
        if item.title == title {
            return Some(item);
        }
        if fallback.is_none() && item.title.to_lowercase() == wanted {
            fallback = Some(item);
        }
    }
    fallback
}

#[derive(Debug, Deserialize, Default)]
struct ContentSearchResponse {
    #[serde(default)]
    results: Vec<ContentPayload>,
}

#[derive(Debug, Deserialize)]
struct ContentPayload {
    id: String,
    title: String,
    space: Option<SpacePayload>,
    version: Option<VersionPayload>,
    body: Option<BodyPayload>,
    #[serde(default)]
    ancestors: Vec<AncestorPayload>,
}

#[derive(Debug, Deserialize)]
struct SpacePayload {
    key: String,
}

#[derive(Debug, Deserialize)]
struct VersionPayload {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct BodyPayload {
    storage: Option<StoragePayload>,
}

#[derive(Debug, Deserialize)]
struct StoragePayload {
    value: String,
}

#[derive(Debug, Deserialize)]
struct AncestorPayload {
    id: String,
}

#[derive(Debug, Deserialize, Default)]
struct CurrentUserPayload {
    #[serde(rename = "type")]
    kind: Option<String>,
    username: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ErrorPayload {
    message: Option<String>,
}
