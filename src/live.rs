//! Live account and message notifications over the Mercure SSE hub.
//!
//! A [`LiveMailService`] owns at most one connection to
//! `<sse_url>?topic=/accounts/<id>`. Each `message` event carries a JSON-LD
//! document whose `@type` decides how the rest of it is decoded.
//!
//! Subscribe to the channels before calling [`LiveMailService::start`];
//! events published while nobody is subscribed are lost.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use reqwest::Url;
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderValue};
use serde::Deserialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::{Account, Message};
use crate::sse::{DEFAULT_EVENT_TYPE, SseEvent, SseEventStream};
use crate::{Error, Result};

/// Connection state of a [`LiveMailService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveState {
    /// The event stream handshake succeeded and events are flowing.
    Open,
    /// No connection. This is the initial state.
    Closed,
}

/// Which notification channels a [`LiveMailService`] publishes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    /// Accounts go to [`LiveMailService::accounts`], messages to
    /// [`LiveMailService::messages`]. Bad events are logged and dropped.
    #[default]
    Split,
    /// Only [`LiveMailService::message_results`] is used. Account events are
    /// skipped; decode and stream failures are delivered as errors.
    MessageResults,
}

/// A decoded live event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    /// The account changed, usually its used quota after new mail.
    Account(Account),
    /// A message arrived or was updated.
    Message(Message),
    /// The payload carried an `@type` this client does not handle.
    Unrecognized(String),
}

#[derive(Deserialize)]
struct TypeTag {
    #[serde(rename = "@type")]
    kind: String,
}

/// Decode a live event payload.
///
/// The `@type` tag is read first; only `Account` and `Message` are decoded
/// further. Any other tag yields [`LiveEvent::Unrecognized`].
pub fn decode_live_event(data: &str) -> Result<LiveEvent> {
    let tag: TypeTag = serde_json::from_str(data).map_err(|e| Error::Decoding(e.to_string()))?;
    match tag.kind.as_str() {
        "Account" => serde_json::from_str(data)
            .map(LiveEvent::Account)
            .map_err(|e| Error::Decoding(e.to_string())),
        "Message" => serde_json::from_str(data)
            .map(LiveEvent::Message)
            .map_err(|e| Error::Decoding(e.to_string())),
        _ => Ok(LiveEvent::Unrecognized(tag.kind)),
    }
}

/// Channels shared between the service and its driver task.
#[derive(Debug)]
struct Hub {
    /// Bumped whenever the current driver is superseded.
    generation: AtomicU64,
    state: watch::Sender<LiveState>,
    accounts: broadcast::Sender<Account>,
    messages: broadcast::Sender<Message>,
    results: broadcast::Sender<Result<Message>>,
}

impl Hub {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (state, _) = watch::channel(LiveState::Closed);
        Self {
            generation: AtomicU64::new(0),
            state,
            accounts: broadcast::channel(capacity).0,
            messages: broadcast::channel(capacity).0,
            results: broadcast::channel(capacity).0,
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    /// Run `publish` only while `generation` still owns the hub.
    ///
    /// Holds the watch read lock throughout, so [`Hub::supersede`] cannot
    /// complete between the check and the send.
    fn publish_if_current(&self, generation: u64, publish: impl FnOnce()) {
        let _guard = self.state.borrow();
        if self.is_current(generation) {
            publish();
        }
    }

    /// Publish `next` if `generation` still owns the hub.
    ///
    /// The generation check runs under the watch lock, so it cannot
    /// interleave with [`Hub::supersede`].
    fn set_state(&self, generation: u64, next: LiveState) {
        self.state.send_if_modified(|state| {
            if !self.is_current(generation) || *state == next {
                return false;
            }
            *state = next;
            true
        });
    }

    /// Retire the current driver and mark the connection closed.
    ///
    /// Returns the generation for the next driver.
    fn supersede(&self) -> u64 {
        let mut generation = 0;
        self.state.send_if_modified(|state| {
            generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
            let changed = *state != LiveState::Closed;
            *state = LiveState::Closed;
            changed
        });
        generation
    }
}

/// Listener for live account and message updates of one account.
///
/// Requires a Tokio runtime for [`start`](Self::start) and
/// [`restart`](Self::restart). Dropping the service closes the connection and
/// completes every channel.
#[derive(Debug)]
pub struct LiveMailService {
    http: reqwest::Client,
    url: Url,
    token: String,
    topology: Topology,
    auto_retry: Arc<AtomicBool>,
    hub: Arc<Hub>,
    driver: Option<JoinHandle<()>>,
}

impl LiveMailService {
    pub(crate) fn new(
        http: reqwest::Client,
        url: Url,
        token: String,
        topology: Topology,
        capacity: usize,
    ) -> Self {
        Self {
            http,
            url,
            token,
            topology,
            auto_retry: Arc::new(AtomicBool::new(false)),
            hub: Arc::new(Hub::new(capacity)),
            driver: None,
        }
    }

    /// Connect to the event stream, replacing any existing connection.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn start(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        let generation = self.hub.supersede();
        let driver = Driver {
            http: self.http.clone(),
            url: self.url.clone(),
            token: self.token.clone(),
            topology: self.topology,
            auto_retry: Arc::clone(&self.auto_retry),
            hub: Arc::clone(&self.hub),
            generation,
        };
        self.driver = Some(tokio::spawn(driver.run()));
    }

    /// Close the connection. Does nothing when already closed.
    pub fn stop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
            self.hub.supersede();
        }
    }

    /// Close the connection and open a new one.
    pub fn restart(&mut self) {
        self.stop();
        self.start();
    }

    /// Reconnect immediately whenever the stream closes.
    ///
    /// There is no backoff or attempt limit; disable the flag to stop a
    /// reconnect loop. Disabled by default.
    pub fn set_auto_retry(&self, enabled: bool) {
        self.auto_retry.store(enabled, Ordering::Release);
    }

    /// Whether auto-retry is enabled.
    pub fn auto_retry(&self) -> bool {
        self.auto_retry.load(Ordering::Acquire)
    }

    /// The channel layout chosen at construction.
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Current connection state.
    pub fn state(&self) -> LiveState {
        *self.hub.state.borrow()
    }

    /// Observe connection state changes.
    pub fn state_changes(&self) -> watch::Receiver<LiveState> {
        self.hub.state.subscribe()
    }

    /// Account updates ([`Topology::Split`] only).
    pub fn accounts(&self) -> broadcast::Receiver<Account> {
        self.hub.accounts.subscribe()
    }

    /// Message updates ([`Topology::Split`] only).
    pub fn messages(&self) -> broadcast::Receiver<Message> {
        self.hub.messages.subscribe()
    }

    /// Message updates and failures ([`Topology::MessageResults`] only).
    pub fn message_results(&self) -> broadcast::Receiver<Result<Message>> {
        self.hub.results.subscribe()
    }
}

impl Drop for LiveMailService {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

/// Background task owning one connection (and its auto-retry successors).
struct Driver {
    http: reqwest::Client,
    url: Url,
    token: String,
    topology: Topology,
    auto_retry: Arc<AtomicBool>,
    hub: Arc<Hub>,
    generation: u64,
}

impl Driver {
    async fn run(self) {
        loop {
            self.connect_and_stream().await;
            self.hub.set_state(self.generation, LiveState::Closed);

            if !self.auto_retry.load(Ordering::Acquire) || !self.hub.is_current(self.generation) {
                return;
            }
            debug!(url = %self.url, "live stream closed, reconnecting");
            tokio::task::yield_now().await;
        }
    }

    async fn connect_and_stream(&self) {
        info!(url = %self.url, "live stream connecting");
        let response = match self.connect().await {
            Ok(response) => response,
            Err(err) => {
                warn!(url = %self.url, error = %err, "live stream connection failed");
                self.publish_failure(err);
                return;
            }
        };

        self.hub.set_state(self.generation, LiveState::Open);
        info!(url = %self.url, "live stream open");

        let mut events = SseEventStream::new(Box::pin(response.bytes_stream()));
        loop {
            match events.next_event().await {
                Ok(Some(event)) => self.dispatch(event),
                Ok(None) => {
                    info!(url = %self.url, "live stream ended");
                    return;
                }
                Err(err) => {
                    warn!(error = %err, "live stream error");
                    self.publish_failure(Error::network(err));
                }
            }
        }
    }

    async fn connect(&self) -> Result<reqwest::Response> {
        let response = self
            .http
            .get(self.url.clone())
            .bearer_auth(&self.token)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .send()
            .await
            .map_err(Error::network)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!("status {}: {}", status.as_u16(), body)));
        }
        Ok(response)
    }

    fn dispatch(&self, event: SseEvent) {
        if event.event != DEFAULT_EVENT_TYPE {
            debug!(event_type = %event.event, "ignoring live event");
            return;
        }

        let decoded = decode_live_event(&event.data);
        match self.topology {
            Topology::Split => match decoded {
                Ok(LiveEvent::Account(account)) => {
                    self.hub.publish_if_current(self.generation, || {
                        let _ = self.hub.accounts.send(account);
                    });
                }
                Ok(LiveEvent::Message(message)) => {
                    self.hub.publish_if_current(self.generation, || {
                        let _ = self.hub.messages.send(message);
                    });
                }
                Ok(LiveEvent::Unrecognized(kind)) => {
                    warn!(%kind, "dropping live event of unknown type");
                }
                Err(err) => {
                    warn!(error = %err, "dropping undecodable live event");
                }
            },
            Topology::MessageResults => {
                let result = match decoded {
                    Ok(LiveEvent::Account(_)) => return,
                    Ok(LiveEvent::Message(message)) => Ok(message),
                    Ok(LiveEvent::Unrecognized(kind)) => {
                        Err(Error::Decoding(format!("unknown live event type {kind:?}")))
                    }
                    Err(err) => Err(err),
                };
                self.publish_result(result);
            }
        }
    }

    fn publish_failure(&self, err: Error) {
        if self.topology == Topology::MessageResults {
            self.publish_result(Err(err));
        }
    }

    fn publish_result(&self, result: Result<Message>) {
        self.hub.publish_if_current(self.generation, || {
            let _ = self.hub.results.send(result);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    const ACCOUNT: &str = r#"{"@context":"/contexts/Account","@id":"/accounts/a1","@type":"Account","id":"a1","address":"user@example.com","quota":40000000,"used":0,"isDisabled":false,"isDeleted":false,"createdAt":"2021-09-21T14:45:09+00:00","updatedAt":"2021-09-21T14:45:09+00:00"}"#;
    const MESSAGE: &str = r#"{"@context":"/contexts/Message","@id":"/messages/m1","@type":"Message","id":"m1","msgid":"<m1@example.com>","from":{"address":"a@example.com","name":"A"},"to":[{"address":"user@example.com","name":""}],"subject":"Hi","seen":false,"flagged":false,"isDeleted":false,"retention":true,"retentionDate":"2021-09-28T14:45:09+00:00","hasAttachments":false,"size":512,"downloadUrl":"/messages/m1/download","createdAt":"2021-09-21T14:45:09+00:00","updatedAt":"2021-09-21T14:45:09+00:00"}"#;

    fn driver(topology: Topology) -> Driver {
        Driver {
            http: reqwest::Client::new(),
            url: Url::parse("http://127.0.0.1:9/hub").unwrap(),
            token: "jwt".to_string(),
            topology,
            auto_retry: Arc::new(AtomicBool::new(false)),
            hub: Arc::new(Hub::new(8)),
            generation: 0,
        }
    }

    fn event(data: &str) -> SseEvent {
        SseEvent {
            event: DEFAULT_EVENT_TYPE.to_string(),
            data: data.to_string(),
            id: None,
            retry: None,
        }
    }

    #[test]
    fn decodes_by_type_tag() {
        assert!(matches!(decode_live_event(ACCOUNT), Ok(LiveEvent::Account(a)) if a.id == "a1"));
        assert!(matches!(decode_live_event(MESSAGE), Ok(LiveEvent::Message(m)) if m.id == "m1"));
        assert_eq!(
            decode_live_event(r#"{"@type":"Widget","id":"w1"}"#),
            Ok(LiveEvent::Unrecognized("Widget".to_string()))
        );
    }

    #[test]
    fn missing_tag_or_bad_shape_is_decoding_error() {
        assert!(matches!(decode_live_event(r#"{"id":"x"}"#), Err(Error::Decoding(_))));
        assert!(matches!(
            decode_live_event(r#"{"@type":"Message","id":"m1"}"#),
            Err(Error::Decoding(_))
        ));
    }

    #[test]
    fn split_routes_by_type() {
        let driver = driver(Topology::Split);
        let mut accounts = driver.hub.accounts.subscribe();
        let mut messages = driver.hub.messages.subscribe();

        driver.dispatch(event(MESSAGE));
        assert_eq!(messages.try_recv().unwrap().id, "m1");
        assert_eq!(accounts.try_recv(), Err(TryRecvError::Empty));

        driver.dispatch(event(ACCOUNT));
        assert_eq!(accounts.try_recv().unwrap().id, "a1");
        assert_eq!(messages.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn split_drops_unknown_and_malformed_events() {
        let driver = driver(Topology::Split);
        let mut accounts = driver.hub.accounts.subscribe();
        let mut messages = driver.hub.messages.subscribe();

        driver.dispatch(event(r#"{"@type":"Widget"}"#));
        driver.dispatch(event("not json"));
        assert_eq!(accounts.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(messages.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn ignores_other_event_types() {
        let driver = driver(Topology::Split);
        let mut messages = driver.hub.messages.subscribe();
        let mut ping = event(MESSAGE);
        ping.event = "ping".to_string();
        driver.dispatch(ping);
        assert_eq!(messages.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn results_topology_filters_accounts_and_reports_failures() {
        let driver = driver(Topology::MessageResults);
        let mut results = driver.hub.results.subscribe();

        driver.dispatch(event(ACCOUNT));
        driver.dispatch(event(MESSAGE));
        driver.dispatch(event(r#"{"@type":"Widget"}"#));

        assert_eq!(results.try_recv().unwrap().unwrap().id, "m1");
        assert!(matches!(results.try_recv().unwrap(), Err(Error::Decoding(_))));
        assert_eq!(results.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn superseded_driver_cannot_publish() {
        let driver = driver(Topology::Split);
        let mut messages = driver.hub.messages.subscribe();
        let state = driver.hub.state.subscribe();

        driver.hub.supersede();
        driver.hub.set_state(driver.generation, LiveState::Open);
        driver.dispatch(event(MESSAGE));

        assert_eq!(*state.borrow(), LiveState::Closed);
        assert_eq!(messages.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn supersede_waits_for_in_flight_publish() {
        let hub = Arc::new(Hub::new(4));
        let mut pending = None;

        hub.publish_if_current(0, || {
            let hub = Arc::clone(&hub);
            let handle = std::thread::spawn(move || hub.supersede());
            std::thread::sleep(std::time::Duration::from_millis(50));
            assert!(!handle.is_finished());
            pending = Some(handle);
        });

        assert_eq!(pending.unwrap().join().unwrap(), 1);
        let mut ran = false;
        hub.publish_if_current(0, || ran = true);
        assert!(!ran);
    }

    #[test]
    fn state_transitions_are_published_once() {
        let hub = Hub::new(1);
        let mut state = hub.state.subscribe();
        hub.set_state(0, LiveState::Open);
        assert!(state.has_changed().unwrap());
        assert_eq!(*state.borrow_and_update(), LiveState::Open);

        hub.set_state(0, LiveState::Open);
        assert!(!state.has_changed().unwrap());
    }
}
