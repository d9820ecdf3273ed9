//! # 24mail Client
//! Asynchronous wrapper around the 24mail.chacuo.net disposable email service, providing simple methods to register a temporary inbox, poll it, and read messages from Rust using [`Client`] and [`ClientBuilder`].
//!
//! ## Audience and uses
//! For Rust developers who need throwaway addresses in integration tests, demos, or automation scripts without running mail infrastructure: configure with [`ClientBuilder`], read the address, poll for messages ([`Message`]), and load bodies only for the messages you care about.
//!
//! ## Runtime requirements
//! Async-only; run inside a Tokio (v1) runtime. HTTP calls use `reqwest` with a cookie store that carries the mailbox binding.
//!
//! ## Message bodies
//! Listing returns headers only. [`Message::content`] fetches the body on first access through a weak link to the producing [`Client`] and caches it on the message. Once the client is dropped, unloaded bodies read as `None`.
//!
//! ## Out of scope
//! Not a general-purpose mail client, SMTP sender, or durable mailbox. It only proxies the 24mail service and inherits its availability and retention limits. A client expects one owner issuing one operation at a time; there is no retry or timeout policy.
//!
//! ## Errors
//! Transport failures and non-2xx statuses surface as [`Error::Request`], malformed JSON as [`Error::Json`], and responses of the wrong shape as [`Error::ResponseParse`]. Bad inbox entries produce [`Error::FieldParse`] and are skipped by [`Client::list_messages`]. The crate-wide [`Result`] alias wraps these errors.
//!
//! ## Example
//! ```no_run
//! use mail24_client::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mail24_client::Error> {
//!     let client = Client::builder().prefix("test_").build().await?;
//!     println!("Inbox: {}", client.address());
//!
//!     for msg in client.receive().await? {
//!         println!("{msg}");
//!         if let Some(body) = msg.content().await? {
//!             println!("{body}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod models;

pub use client::{random_name, Client, ClientBuilder};
pub use error::Error;
pub use models::{parse_send_time, BodyState, Contact, Message};

/// Result type alias for 24mail operations.
///
/// This is equivalent to `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
