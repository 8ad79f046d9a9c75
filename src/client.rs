//! Mail.tm async client implementation.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::decode::unwrap_collection;
use crate::deferred::Deferred;
use crate::endpoints::{BASE_URL, Endpoints, SSE_URL};
use crate::envelope::HydraCollection;
use crate::live::{LiveMailService, Topology};
use crate::models::{Account, Auth, Domain, EmptyResult, Message, MessageSource, Token};
use crate::transport::{Request, Transport};
use crate::{Error, Result};

const MERGE_PATCH_JSON: &str = "application/merge-patch+json";
const DEFAULT_LIVE_CAPACITY: usize = 64;

/// Async client for the Mail.tm temporary email service.
///
/// Use [`Client::new`] for defaults or [`Client::builder`] for custom settings
/// like proxies, TLS behavior, endpoints and a custom user agent.
///
/// Every API method returns a cold [`Deferred`]: nothing is sent until it is
/// awaited, [subscribed](Deferred::subscribe) or
/// [spawned](Deferred::spawn) with a callback.
#[derive(Debug, Clone)]
pub struct Client {
    transport: Transport,
    endpoints: Endpoints,
    live_capacity: usize,
}

impl Client {
    /// Create a builder for configuring the client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client for the public Mail.tm endpoints.
    ///
    /// No request is made.
    ///
    /// # Examples
    /// ```no_run
    /// # use mailtm_client::Client;
    /// # fn main() -> Result<(), mailtm_client::Error> {
    /// let client = Client::new()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new() -> Result<Self> {
        ClientBuilder::new().build()
    }

    /// The transport used for REST calls.
    ///
    /// Useful for endpoints this client does not wrap.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// URLs the client sends requests to.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Exchange credentials for a JWT.
    ///
    /// # Examples
    /// ```no_run
    /// # use mailtm_client::{Auth, Client};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mailtm_client::Error> {
    /// let client = Client::new()?;
    /// let token = client.login(&Auth::new("user@example.com", "hunter22")).await?;
    /// println!("{token}");
    /// # Ok(())
    /// # }
    /// ```
    pub fn login(&self, auth: &Auth) -> Deferred<String> {
        self.send::<Token, _>(Method::POST, self.endpoints.token(), None, Some(auth))
            .map(|token| token.token)
    }

    /// Register a new account with the given credentials.
    pub fn create_account(&self, auth: &Auth) -> Deferred<Account> {
        self.send(Method::POST, self.endpoints.accounts(), None, Some(auth))
    }

    /// The account the token belongs to.
    pub fn my_account(&self, token: &str) -> Deferred<Account> {
        self.transport.get(self.endpoints.me(), Some(token), HeaderMap::new())
    }

    /// Delete an account. The API answers with an empty body.
    pub fn delete_account(&self, id: &str, token: &str) -> Deferred<EmptyResult> {
        self.send::<_, ()>(Method::DELETE, self.endpoints.account(id), Some(token), None)
    }

    /// List the domains new accounts can be created on.
    ///
    /// # Examples
    /// ```no_run
    /// # use mailtm_client::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mailtm_client::Error> {
    /// let client = Client::new()?;
    /// for domain in client.domains().await? {
    ///     println!("{}", domain.domain);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn domains(&self) -> Deferred<Vec<Domain>> {
        self.collection(self.endpoints.domains(), None)
    }

    /// A single domain by id.
    pub fn domain(&self, id: &str) -> Deferred<Domain> {
        self.transport.get(self.endpoints.domain(id), None, HeaderMap::new())
    }

    /// First page of the inbox.
    pub fn messages(&self, token: &str) -> Deferred<Vec<Message>> {
        self.messages_page(token, 1)
    }

    /// One page of the inbox, newest first. Page numbers start at 1; `0` is
    /// treated as `1`.
    ///
    /// Listed messages carry no body; fetch one with [`Client::message`].
    pub fn messages_page(&self, token: &str, page: u32) -> Deferred<Vec<Message>> {
        self.collection(self.endpoints.messages_page(page), Some(token))
    }

    /// A single message including its text and HTML bodies.
    pub fn message(&self, token: &str, id: &str) -> Deferred<Message> {
        self.transport.get(self.endpoints.message(id), Some(token), HeaderMap::new())
    }

    /// Delete a message. The API answers with an empty body.
    pub fn delete_message(&self, token: &str, id: &str) -> Deferred<EmptyResult> {
        self.send::<_, ()>(Method::DELETE, self.endpoints.message(id), Some(token), None)
    }

    /// Set the `seen` flag of a message. Returns the updated message.
    pub fn mark_message_seen(&self, token: &str, id: &str, seen: bool) -> Deferred<Message> {
        #[derive(Serialize)]
        struct SeenPatch {
            seen: bool,
        }

        let request = Request::new(Method::PATCH, self.endpoints.message(id))
            .bearer_auth(token)
            .header(CONTENT_TYPE, HeaderValue::from_static(MERGE_PATCH_JSON))
            .json(&SeenPatch { seen });
        self.transport.execute(request)
    }

    /// Raw RFC 822 source of a message.
    pub fn message_source(&self, token: &str, id: &str) -> Deferred<MessageSource> {
        self.transport.get(self.endpoints.source(id), Some(token), HeaderMap::new())
    }

    /// Live account and message updates for `account_id`.
    ///
    /// Returned stopped; subscribe to [`LiveMailService::accounts`] and
    /// [`LiveMailService::messages`], then call [`LiveMailService::start`].
    ///
    /// # Examples
    /// ```no_run
    /// # use mailtm_client::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mailtm_client::Error> {
    /// let client = Client::new()?;
    /// let mut live = client.live_mail("jwt", "account-id");
    /// let mut messages = live.messages();
    /// live.start();
    /// while let Ok(message) = messages.recv().await {
    ///     println!("{}: {}", message.from.address, message.subject);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn live_mail(&self, token: &str, account_id: &str) -> LiveMailService {
        self.live(token, account_id, Topology::Split)
    }

    /// Live message updates for `account_id` as results, with decode and
    /// connection failures delivered as errors.
    pub fn live_messages(&self, token: &str, account_id: &str) -> LiveMailService {
        self.live(token, account_id, Topology::MessageResults)
    }

    fn live(&self, token: &str, account_id: &str, topology: Topology) -> LiveMailService {
        LiveMailService::new(
            self.transport.http().clone(),
            self.endpoints.live(account_id),
            token.to_string(),
            topology,
            self.live_capacity,
        )
    }

    fn send<T, B>(
        &self,
        method: Method,
        url: Url,
        token: Option<&str>,
        body: Option<&B>,
    ) -> Deferred<T>
    where
        T: DeserializeOwned + Send + 'static,
        B: Serialize + ?Sized,
    {
        self.transport.request(method, url, token, HeaderMap::new(), body)
    }

    /// GET a Hydra collection and unwrap its members.
    fn collection<T>(&self, url: Url, token: Option<&str>) -> Deferred<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let page: Deferred<HydraCollection<T>> = self.transport.get(url, token, HeaderMap::new());
        Deferred::new(move || {
            let page = page.clone();
            async move { unwrap_collection(page.await) }
        })
    }
}

/// Builder for configuring a Mail.tm client.
///
/// Start with [`Client::builder`] to override defaults.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    base_url: String,
    sse_url: String,
    proxy: Option<String>,
    danger_accept_invalid_certs: bool,
    user_agent: String,
    timeout: Option<Duration>,
    live_capacity: usize,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Create a new builder with default settings.
    ///
    /// Defaults:
    /// - `https://api.mail.tm` and the public Mercure hub
    /// - No proxy
    /// - `danger_accept_invalid_certs = false`
    /// - `mailtm-client/<version>` user agent
    /// - No request timeout
    /// - Live channel capacity of 64 events
    pub fn new() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            sse_url: SSE_URL.to_string(),
            proxy: None,
            danger_accept_invalid_certs: false,
            user_agent: concat!("mailtm-client/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: None,
            live_capacity: DEFAULT_LIVE_CAPACITY,
        }
    }

    /// Override the REST API base URL.
    ///
    /// Useful for testing against a local server.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the Mercure hub URL used for live events.
    pub fn sse_url(mut self, sse_url: impl Into<String>) -> Self {
        self.sse_url = sse_url.into();
        self
    }

    /// Set a proxy URL (e.g., "socks5://127.0.0.1:9050").
    ///
    /// This uses reqwest's proxy support for all requests.
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Control whether to accept invalid TLS certificates (default: false).
    pub fn danger_accept_invalid_certs(mut self, value: bool) -> Self {
        self.danger_accept_invalid_certs = value;
        self
    }

    /// Override the default user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Time limit for each REST call. The live event stream is not affected.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Number of undelivered events each live channel buffers per observer.
    ///
    /// Slow observers skip the oldest events once this is exceeded.
    pub fn live_channel_capacity(mut self, capacity: usize) -> Self {
        self.live_capacity = capacity.max(1);
        self
    }

    /// Build the client.
    ///
    /// Validates the configured URLs; no request is made.
    ///
    /// # Examples
    /// ```no_run
    /// # use mailtm_client::Client;
    /// # fn main() -> Result<(), mailtm_client::Error> {
    /// let client = Client::builder()
    ///     .user_agent("my-app/1.0")
    ///     .timeout(std::time::Duration::from_secs(10))
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn build(self) -> Result<Client> {
        let endpoints = Endpoints::new(&self.base_url, &self.sse_url)?;

        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(self.danger_accept_invalid_certs)
            .user_agent(self.user_agent);

        if let Some(proxy_url) = &self.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| Error::Config(format!("invalid proxy {proxy_url:?}: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Client {
            transport: Transport::new(http).with_timeout(self.timeout),
            endpoints,
            live_capacity: self.live_capacity,
        })
    }
}
