//! # Mail.tm Client
//! Asynchronous wrapper around the Mail.tm disposable email HTTP API, providing typed methods to create accounts, read and delete messages, and follow an inbox live from Rust using [`Client`] and [`ClientBuilder`].
//!
//! ## Audience and uses
//! For Rust developers who need throwaway addresses in integration tests, demos, or automation scripts without running mail infrastructure: configure with [`ClientBuilder`], pick a [`Domain`], register an [`Account`] with [`Auth::random`], log in, then poll for [`Message`]s or listen with a [`LiveMailService`].
//!
//! ## Calling conventions
//! Every API method returns a cold [`Deferred`] that performs exactly one request each time it is consumed:
//! - `.await` it for the result;
//! - [`Deferred::subscribe`] for a cancellable single-item [`futures::Stream`];
//! - [`Deferred::spawn`] with a completion callback, returning a cancellable [`Task`].
//!
//! ## Runtime requirements
//! Async-only; run inside a Tokio (v1) runtime. HTTP calls use `reqwest`, so ensure the chosen Tokio features (`rt-multi-thread` or `current_thread`) are available in your application. Diagnostics are emitted through `tracing`; install a subscriber to see them.
//!
//! ## Out of scope
//! Not a general-purpose mail client, SMTP sender, or durable mailbox. It only proxies the Mail.tm service and inherits its availability, rate limits, and retention limits. There are no retries, and live reconnection is an optional immediate restart without backoff.
//!
//! ## Errors
//! Transport failures and non-2xx statuses surface as [`Error::Network`]. A structured API error document becomes [`Error::Remote`] regardless of status. Shape mismatches become [`Error::Decoding`], unserializable bodies [`Error::Encoding`], and invalid builder settings [`Error::Config`]. The crate-wide [`Result`] alias wraps these errors.
//!
//! ## Example
//! ```no_run
//! use mailtm_client::{Auth, Client};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mailtm_client::Error> {
//!     let client = Client::new()?;
//!     let domain = client.domains().await?.remove(0);
//!     let auth = Auth::random(&domain.domain);
//!
//!     let account = client.create_account(&auth).await?;
//!     let token = client.login(&auth).await?;
//!     println!("Created: {}", account.address);
//!
//!     for msg in client.messages(&token).await? {
//!         println!("From: {}, Subject: {}", msg.from.address, msg.subject);
//!     }
//!
//!     client.delete_account(&account.id, &token).await?;
//!     Ok(())
//! }
//! ```

mod client;
pub mod datetime;
pub mod decode;
mod deferred;
mod endpoints;
mod envelope;
mod error;
mod live;
mod models;
pub mod sse;
mod task;
mod transport;

pub use client::{Client, ClientBuilder};
pub use decode::{decode_response, unwrap_collection};
pub use deferred::{Deferred, Subscription};
pub use endpoints::{BASE_URL, Endpoints, SSE_URL};
pub use envelope::{HydraCollection, HydraError, Violation};
pub use error::Error;
pub use live::{LiveEvent, LiveMailService, LiveState, Topology, decode_live_event};
pub use models::{
    Account, Attachment, Auth, Domain, EmptyResult, Message, MessageSource, MessageUser, Token,
};
pub use task::{Task, TaskState};
pub use transport::{Request, Transport};

/// Result type alias for Mail.tm operations.
///
/// This is equivalent to `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
