//! HTTP transport shared by all API calls.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::decode::decode_response;
use crate::deferred::Deferred;
use crate::task::Task;
use crate::{Error, Result};

/// A fully described API request.
///
/// Built once and never mutated after it is handed to [`Transport::execute`].
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    token: Option<String>,
    headers: HeaderMap,
    body: Option<std::result::Result<Bytes, Error>>,
}

impl Request {
    /// Create a request with no body, token or extra headers.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            token: None,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Send `Authorization: Bearer <token>`.
    pub fn bearer_auth(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set a single header, replacing any previous value.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Merge `headers` into the request.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Serialize `body` as JSON.
    ///
    /// A serialization failure is not reported here; it is delivered as
    /// [`Error::Encoding`] when the request runs, and nothing is sent.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        self.body = Some(
            serde_json::to_vec(body)
                .map(Bytes::from)
                .map_err(|e| Error::Encoding(e.to_string())),
        );
        self
    }

    /// Use pre-encoded bytes as the body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(Ok(body.into()));
        self
    }

    /// HTTP method of the request.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL, including any query.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Headers as they will be sent, including authorization and the
    /// default content type.
    ///
    /// Fails with [`Error::Encoding`] when the token is not a valid header
    /// value; such a request is never sent.
    pub fn effective_headers(&self) -> Result<HeaderMap> {
        let mut headers = self.headers.clone();
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| Error::Encoding(format!("invalid bearer token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        if self.body.is_some() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        Ok(headers)
    }
}

/// Issues requests and decodes their responses.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    timeout: Option<Duration>,
}

impl Transport {
    /// Wrap an existing `reqwest` client.
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            timeout: None,
        }
    }

    /// Apply `timeout` to every request made through this transport.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Describe `request` as a cold call decoding to `T`.
    ///
    /// Nothing is sent until the returned value is awaited, subscribed or
    /// spawned.
    pub fn execute<T>(&self, request: Request) -> Deferred<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let transport = self.clone();
        let request = Arc::new(request);
        Deferred::new(move || {
            let transport = transport.clone();
            let request = Arc::clone(&request);
            async move { transport.perform(&request).await }
        })
    }

    /// Cold `GET` of `url`.
    pub fn get<T>(&self, url: Url, token: Option<&str>, headers: HeaderMap) -> Deferred<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.execute(with_token(Request::get(url), token).headers(headers))
    }

    /// Cold request with an optional JSON body.
    pub fn request<T, B>(
        &self,
        method: Method,
        url: Url,
        token: Option<&str>,
        headers: HeaderMap,
        body: Option<&B>,
    ) -> Deferred<T>
    where
        T: DeserializeOwned + Send + 'static,
        B: Serialize + ?Sized,
    {
        let mut request = with_token(Request::new(method, url), token).headers(headers);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.execute(request)
    }

    /// Callback form of [`Transport::get`].
    pub fn execute_get<T, F>(
        &self,
        url: Url,
        token: Option<&str>,
        headers: HeaderMap,
        callback: F,
    ) -> Task
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Result<T>) + Send + 'static,
    {
        self.get(url, token, headers).spawn(callback)
    }

    /// Callback form of [`Transport::request`].
    pub fn execute_request<T, B, F>(
        &self,
        method: Method,
        url: Url,
        token: Option<&str>,
        headers: HeaderMap,
        body: Option<&B>,
        callback: F,
    ) -> Task
    where
        T: DeserializeOwned + Send + 'static,
        B: Serialize + ?Sized,
        F: FnOnce(Result<T>) + Send + 'static,
    {
        self.request(method, url, token, headers, body).spawn(callback)
    }

    /// Send `request` once and decode the response.
    async fn perform<T: DeserializeOwned>(&self, request: &Request) -> Result<T> {
        let body = match &request.body {
            Some(Ok(bytes)) => Some(bytes.clone()),
            Some(Err(err)) => return Err(err.clone()),
            None => None,
        };
        let headers = request.effective_headers()?;

        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        debug!(method = %request.method, url = %request.url, "sending request");
        let response = builder.send().await.map_err(Error::network)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(Error::network)?;
        debug!(%status, len = bytes.len(), "response received");

        decode_response(status, Some(&bytes))
    }
}

fn with_token(request: Request, token: Option<&str>) -> Request {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://api.mail.tm/messages/1").unwrap()
    }

    #[test]
    fn bearer_token_replaces_caller_authorization() {
        let request = Request::get(url())
            .header(AUTHORIZATION, HeaderValue::from_static("Basic abc"))
            .bearer_auth("jwt");
        let headers = request.effective_headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer jwt");
        assert!(!headers.contains_key(CONTENT_TYPE));
    }

    #[test]
    fn body_gets_default_content_type() {
        let request = Request::new(Method::POST, url()).json(&serde_json::json!({"a": 1}));
        assert_eq!(request.effective_headers().unwrap()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn caller_content_type_is_kept() {
        let request = Request::new(Method::PATCH, url())
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/merge-patch+json"),
            )
            .json(&serde_json::json!({"seen": true}));
        assert_eq!(
            request.effective_headers().unwrap()[CONTENT_TYPE],
            "application/merge-patch+json"
        );
    }

    #[test]
    fn unencodable_token_is_an_error() {
        let request = Request::get(url()).bearer_auth("bad\ntoken");
        assert!(matches!(request.effective_headers(), Err(Error::Encoding(_))));
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("not encodable"))
        }
    }

    #[tokio::test]
    async fn encoding_failure_is_delivered_as_result() {
        let transport = Transport::new(reqwest::Client::new());
        let deferred: Deferred<crate::EmptyResult> = transport.request(
            Method::POST,
            // Port 9 is never contacted: encoding fails first.
            Url::parse("http://127.0.0.1:9/token").unwrap(),
            None,
            HeaderMap::new(),
            Some(&Unencodable),
        );
        assert!(matches!(deferred.await, Err(Error::Encoding(_))));
    }

    #[tokio::test]
    async fn unencodable_token_never_reaches_the_network() {
        let transport = Transport::new(reqwest::Client::new());
        let deferred: Deferred<crate::EmptyResult> = transport.get(
            Url::parse("http://127.0.0.1:9/me").unwrap(),
            Some("bad\ntoken"),
            HeaderMap::new(),
        );
        assert!(matches!(deferred.await, Err(Error::Encoding(_))));
    }
}
