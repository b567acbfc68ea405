use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, RequestBuilder, Response, header};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::backend::ChatBackend;
use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUESTS, CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS};
use crate::sse::process_frames;
use crate::stream::{EventStream, StreamHandler, StreamOutcome, stream_with_callbacks};
use crate::types::{ChatRequest, CreatedSession, SessionId, StreamEvent, Turn};

const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/";
const BASE_URL_ENV: &str = "CHATSTREAM_BASE_URL";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client for the chat backend.
#[derive(Clone)]
pub struct Client {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl Client {
    /// Create a new client.
    ///
    /// The base URL is read from the CHATSTREAM_BASE_URL environment variable,
    /// falling back to a backend on localhost.
    pub fn new() -> Result<Self> {
        Self::with_options(None, None)
    }

    /// Create a new client with custom settings.
    ///
    /// `timeout` bounds connecting and the non-streaming requests.  An open
    /// stream is never cut short by it.
    pub fn with_options(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = match base_url {
            Some(url) => url,
            None => env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        };
        let base_url = parse_base_url(&base_url)?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
            logger: None,
        })
    }

    /// Attach a logger that observes sessions, stream events and reloads.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The URL every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn session_endpoint(&self, prefix: &str, id: &SessionId) -> Result<Url> {
        if id.as_str().is_empty() || id.as_str().contains(['/', '?', '#']) {
            return Err(Error::validation(
                format!("session id {id:?} cannot be used in a URL"),
                Some("session_id".to_string()),
            ));
        }
        self.endpoint(&format!("{prefix}/{id}/"))
    }

    /// Send a request, mapping transport failures and non-2xx statuses to errors.
    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        CLIENT_REQUESTS.click();
        let started = Instant::now();
        let result = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout(
                    format!("Request timed out: {}", e),
                    Some(self.timeout.as_secs_f64()),
                )
            } else if e.is_connect() {
                Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
            } else {
                Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
            }
        });
        CLIENT_REQUEST_DURATION.add(started.elapsed().as_secs_f64());

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                CLIENT_REQUEST_ERRORS.click();
                return Err(err);
            }
        };
        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }
        Ok(response)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();
        let body = response.text().await.ok().filter(|body| !body.is_empty());
        Error::http(status_code, body)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        response.json::<T>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })
    }

    /// Ask the backend for a new session.
    pub async fn create_session(&self) -> Result<CreatedSession> {
        let url = self.endpoint("create-chat/")?;
        let request = self
            .client
            .post(url)
            .headers(self.default_headers())
            .timeout(self.timeout);
        let created: CreatedSession = Self::read_json(self.execute(request).await?).await?;
        if let Some(logger) = &self.logger {
            logger.log_session_created(&created.id);
        }
        Ok(created)
    }

    /// Load every turn of a session, oldest first.
    pub async fn list_turns(&self, id: &SessionId) -> Result<Vec<Turn>> {
        let url = self.session_endpoint("chat-messages", id)?;
        let request = self
            .client
            .get(url)
            .headers(self.default_headers())
            .timeout(self.timeout);
        let turns: Vec<Turn> = Self::read_json(self.execute(request).await?).await?;
        if let Some(logger) = &self.logger {
            logger.log_turns(id, &turns);
        }
        Ok(turns)
    }

    /// Send a message and get a streaming response.
    ///
    /// Returns a stream of events that ends with exactly one terminal item; see
    /// [`process_frames`].  Dropping the stream closes the response.
    pub async fn open_stream(
        &self,
        id: &SessionId,
        prompt: &str,
    ) -> Result<impl Stream<Item = Result<StreamEvent>> + Send + 'static> {
        let url = self.session_endpoint("chat-stream", id)?;

        let mut headers = self.default_headers();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );

        let request = self
            .client
            .post(url)
            .headers(headers)
            .json(&ChatRequest::new(prompt));
        let response = self.execute(request).await?;

        let logger = self.logger.clone();
        let id = id.clone();
        let events = process_frames(response.bytes_stream()).inspect(move |item| {
            if let (Some(logger), Ok(event)) = (&logger, item) {
                logger.log_stream_event(&id, event);
            }
        });
        Ok(events)
    }

    /// Send a message and deliver the response to `handler`, push style.
    ///
    /// Every failure, from connecting to a silent termination, becomes one
    /// `on_error` call.  Cancelling `cancel` aborts the request without any
    /// terminal callback.
    pub async fn stream_turn<H>(
        &self,
        id: &SessionId,
        prompt: &str,
        handler: &mut H,
        cancel: CancellationToken,
    ) -> StreamOutcome
    where
        H: StreamHandler + ?Sized,
    {
        let client = self.clone();
        let id = id.clone();
        let prompt = prompt.to_string();
        stream_with_callbacks(
            async move {
                let events = client.open_stream(&id, &prompt).await?;
                Ok(Box::pin(events) as EventStream)
            },
            handler,
            cancel,
        )
        .await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

#[async_trait::async_trait]
impl ChatBackend for Client {
    async fn create_session(&self) -> Result<CreatedSession> {
        Client::create_session(self).await
    }

    async fn open_stream(&self, id: &SessionId, prompt: &str) -> Result<EventStream> {
        let events = Client::open_stream(self, id, prompt).await?;
        Ok(Box::pin(events))
    }

    async fn list_turns(&self, id: &SessionId) -> Result<Vec<Turn>> {
        Client::list_turns(self, id).await
    }
}

/// Parse a base URL, making sure relative endpoints resolve beneath it.
fn parse_base_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)?;
    if url.cannot_be_a_base() {
        return Err(Error::url(
            format!("{base_url} cannot be used as a base URL"),
            None,
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let client =
            Client::with_options(Some("http://example.com/api".to_string()), None).unwrap();
        assert_eq!(client.base_url().as_str(), "http://example.com/api/");
    }

    #[test]
    fn endpoints_resolve_beneath_base() {
        let client =
            Client::with_options(Some("http://example.com/api/".to_string()), None).unwrap();
        assert_eq!(
            client.endpoint("create-chat/").unwrap().as_str(),
            "http://example.com/api/create-chat/"
        );
        assert_eq!(
            client
                .session_endpoint("chat-stream", &SessionId::new("abc-123"))
                .unwrap()
                .as_str(),
            "http://example.com/api/chat-stream/abc-123/"
        );
    }

    #[test]
    fn session_ids_cannot_escape_the_path() {
        let client =
            Client::with_options(Some("http://example.com/api/".to_string()), None).unwrap();
        let err = client
            .session_endpoint("chat-messages", &SessionId::new("../admin"))
            .unwrap_err();
        assert!(err.is_validation());
        assert!(
            client
                .session_endpoint("chat-messages", &SessionId::new(""))
                .is_err()
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(Client::with_options(Some("not a url".to_string()), None).is_err());
        assert!(Client::with_options(Some("mailto:someone@example.com".to_string()), None).is_err());
    }

    #[test]
    fn explicit_timeout_is_kept() {
        let client = Client::with_options(
            Some("http://example.com/".to_string()),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(client.timeout, Duration::from_secs(5));
    }
}
