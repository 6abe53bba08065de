use crate::{
    error::{self, CommonRequestError},
    streaming::{ErrorEventPolicy, SseParser, StreamPayload, StreamState},
};
use async_stream::try_stream;
use futures_util::stream::{self, BoxStream};
use reqwest::{Method, RequestBuilder as ReqwestRequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::HashMap, time::Duration};

/// HTTP method for API endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Patch => Method::PATCH,
        }
    }
}

/// Authentication method for API requests
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Bearer token authentication (Authorization: Bearer <token>)
    Bearer(String),
    /// Token in a custom header (e.g., x-api-key: <key>)
    Header { name: String, value: String },
}

/// Represents an API endpoint with its configuration
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub path: String,
    pub method: HttpMethod,
    pub extra_headers: Option<HashMap<String, String>>,
    pub query_params: Vec<(String, Option<String>)>,
    /// Overrides the configured timeout for this endpoint only
    pub timeout: Option<Duration>,
}

impl Endpoint {
    pub fn new(path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            path: path.into(),
            method,
            extra_headers: None,
            query_params: Vec::new(),
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(path, HttpMethod::Get)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(path, HttpMethod::Post)
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers = self.extra_headers.unwrap_or_default();
        headers.insert(key.into(), value.into());
        self.extra_headers = Some(headers);
        self
    }

    /// Add a query parameter; `None` values are left out of the URL.
    #[must_use]
    pub fn with_query_param(mut self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        self.query_params
            .push((key.into(), value.map(|v| v.to_string())));
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Configuration for request building
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub base_url: String,
    pub auth: Option<AuthMethod>,
    pub default_headers: HashMap<String, String>,
    pub user_agent: Option<String>,
    /// Applied to every non-streaming request unless the endpoint overrides it
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: None,
            default_headers: HashMap::new(),
            user_agent: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_auth(mut self, auth: AuthMethod) -> Self {
        self.auth = Some(auth);
        self
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Build a URL query string, skipping parameters without a value.
pub fn build_query_string<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, Option<V>)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        if let Some(value) = value {
            serializer.append_pair(key.as_ref(), value.as_ref());
        }
    }
    serializer.finish()
}

/// Whether `status` is in the 2xx range.
pub fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Options that control how streaming requests are handled.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamOptions {
    /// How events carrying an `error` field are treated.
    pub error_events: ErrorEventPolicy,
}

/// Generic request builder that handles common HTTP patterns
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    client: reqwest::Client,
    config: RequestConfig,
}

impl RequestBuilder {
    pub fn new(client: reqwest::Client, config: RequestConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Absolute URL of `path` under the configured base URL.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Build a reqwest RequestBuilder for the given endpoint
    pub fn build_request(
        &self,
        endpoint: &Endpoint,
    ) -> Result<ReqwestRequestBuilder, CommonRequestError> {
        self.build_request_with_options(endpoint, true)
    }

    /// Build a reqwest RequestBuilder with options for content-type handling
    pub fn build_request_with_options(
        &self,
        endpoint: &Endpoint,
        add_json_content_type: bool,
    ) -> Result<ReqwestRequestBuilder, CommonRequestError> {
        let req = self.prepare(endpoint, add_json_content_type)?;

        Ok(match endpoint.timeout.or(self.config.timeout) {
            Some(timeout) => req.timeout(timeout),
            None => req,
        })
    }

    /// Everything but the timeout, which streaming requests must not inherit.
    fn prepare(
        &self,
        endpoint: &Endpoint,
        add_json_content_type: bool,
    ) -> Result<ReqwestRequestBuilder, CommonRequestError> {
        if self.config.base_url.trim().is_empty() {
            return Err(CommonRequestError::RequestBuilder(
                "base URL is empty".to_string(),
            ));
        }

        let mut url = self.url(&endpoint.path);
        let query = build_query_string(
            endpoint
                .query_params
                .iter()
                .map(|(key, value)| (key, value.as_ref())),
        );
        if !query.is_empty() {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&query);
        }

        let mut req = self.client.request(endpoint.method.into(), &url);

        if let Some(ref auth) = self.config.auth {
            req = match auth {
                AuthMethod::Bearer(token) => req.bearer_auth(token),
                AuthMethod::Header { name, value } => req.header(name, value),
            };
        }

        for (key, value) in &self.config.default_headers {
            req = req.header(key, value);
        }

        if let Some(ref headers) = endpoint.extra_headers {
            for (key, value) in headers {
                req = req.header(key, value);
            }
        }

        if let Some(ref user_agent) = self.config.user_agent {
            req = req.header("user-agent", user_agent);
        }

        // Add content-type for POST/PUT/PATCH requests (only for JSON requests)
        if add_json_content_type
            && matches!(
                endpoint.method,
                HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch
            )
        {
            req = req.header("content-type", "application/json");
        }

        Ok(req)
    }

    /// Execute a request with JSON body and return deserialized response
    pub async fn request_json<T: for<'de> Deserialize<'de>, B: Serialize + ?Sized>(
        &self,
        endpoint: &Endpoint,
        body: Option<&B>,
    ) -> Result<T, CommonRequestError> {
        let mut req = self.build_request(endpoint)?;

        if let Some(body) = body {
            let val = serde_json::to_value(body)?;
            log::debug!("{:?} {} payload: {}", endpoint.method, endpoint.path, val);
            req = req.json(&val);
        }

        let res = req.send().await?;
        self.handle_response(endpoint, res).await
    }

    /// Execute a request without body and return deserialized response
    pub async fn request<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &Endpoint,
    ) -> Result<T, CommonRequestError> {
        let req = self.build_request(endpoint)?;
        let res = req.send().await?;
        self.handle_response(endpoint, res).await
    }

    /// Execute a request and return raw bytes (for file downloads)
    pub async fn request_bytes(
        &self,
        endpoint: &Endpoint,
    ) -> Result<bytes::Bytes, CommonRequestError> {
        let req = self.build_request(endpoint)?;
        let res = req.send().await?;
        let status = res.status();
        let bytes = res.bytes().await?;

        if is_success_status(status.as_u16()) {
            Ok(bytes)
        } else {
            Err(error::parse_error_response(status, &bytes))
        }
    }

    /// Execute a multipart form request (for file uploads)
    pub async fn request_multipart<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &Endpoint,
        form: reqwest::multipart::Form,
    ) -> Result<T, CommonRequestError> {
        // reqwest sets the multipart content-type with its boundary
        let req = self.build_request_with_options(endpoint, false)?;
        let res = req.multipart(form).send().await?;
        self.handle_response(endpoint, res).await
    }

    /// Send a streaming request and return a reader positioned at the first event.
    ///
    /// Moves the call through `connecting` to `reading`. A non-success status
    /// fails the call before any event is read.
    pub async fn open_stream(
        &self,
        endpoint: &Endpoint,
        body: Option<Value>,
        options: StreamOptions,
    ) -> Result<SseParser, CommonRequestError> {
        let mut req = self
            .prepare(endpoint, true)?
            .header("accept", "text/event-stream");
        if let Some(timeout) = endpoint.timeout {
            req = req.timeout(timeout);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        log::debug!("event stream {} {}", StreamState::Connecting, endpoint.path);
        let response = req.send().await.inspect_err(|err| {
            log::debug!("event stream {}: {err}", StreamState::Failed);
        })?;

        let status = response.status();
        if !is_success_status(status.as_u16()) {
            let bytes = response.bytes().await?;
            let err = error::parse_error_response(status, &bytes);
            log::debug!("event stream {}: {err}", StreamState::Failed);
            return Err(err);
        }

        log::debug!("event stream {} {}", StreamState::Reading, endpoint.path);
        Ok(SseParser::new(response).with_error_policy(options.error_events))
    }

    /// Execute a streaming request, yielding events until `[DONE]` or end of body.
    pub fn stream<T, B>(
        &self,
        endpoint: &Endpoint,
        body: Option<&B>,
        options: StreamOptions,
    ) -> BoxStream<'static, Result<T, CommonRequestError>>
    where
        T: StreamPayload + Send + 'static,
        B: Serialize + ?Sized,
    {
        let body = match body.map(serde_json::to_value).transpose() {
            Ok(body) => body,
            Err(e) => {
                return Box::pin(stream::once(async move {
                    Err(CommonRequestError::from(e))
                }));
            }
        };

        let builder = self.clone();
        let endpoint = endpoint.clone();

        Box::pin(try_stream! {
            let mut parser = builder.open_stream(&endpoint, body, options).await?;

            while let Some(event) = parser.next_event::<T>().await? {
                yield event;
            }
        })
    }

    /// Handle response and parse errors
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &Endpoint,
        res: Response,
    ) -> Result<T, CommonRequestError> {
        let status = res.status();
        let bytes = res.bytes().await?;

        if !is_success_status(status.as_u16()) {
            let err = error::parse_error_response(status, &bytes);
            log::warn!("{:?} {} failed: {err}", endpoint.method, endpoint.path);
            return Err(err);
        }

        serde_json::from_slice::<T>(&bytes).map_err(|e| {
            CommonRequestError::UnexpectedResponse(format!(
                "HTTP {} but failed to decode JSON: {}; body: {}",
                status.as_u16(),
                e,
                String::from_utf8_lossy(&bytes)
            ))
        })
    }
}

/// Helper struct for building multipart forms
pub struct MultipartForm {
    form: reqwest::multipart::Form,
}

impl MultipartForm {
    /// Create a new multipart form
    pub fn new() -> Self {
        Self {
            form: reqwest::multipart::Form::new(),
        }
    }

    /// Add a text field
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form = self.form.text(name.into(), value.into());
        self
    }

    /// Add a file from bytes
    #[must_use]
    pub fn file_from_bytes(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        let part = reqwest::multipart::Part::bytes(data).file_name(filename.into());
        self.form = self.form.part(name.into(), part);
        self
    }

    /// Add a file from bytes with an explicit mime type
    pub fn file_from_bytes_with_mime(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        data: Vec<u8>,
        mime_type: &str,
    ) -> Result<Self, CommonRequestError> {
        let part = reqwest::multipart::Part::bytes(data)
            .file_name(filename.into())
            .mime_str(mime_type)?;
        self.form = self.form.part(name.into(), part);
        Ok(self)
    }

    /// Build the final form
    pub fn build(self) -> reqwest::multipart::Form {
        self.form
    }
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}
