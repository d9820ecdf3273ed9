//! Public data models returned by the client.

use crate::client::Session;
use crate::{Client, Error, Result};
use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{LazyLock, Weak};
use tokio::sync::Mutex;
use tracing::debug;

const SEND_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static SEND_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").unwrap());

static CONTACT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.*)<(.+)>$").unwrap());

/// Parse a `SENDTIME` value such as `2023-01-02 03:04:05`.
///
/// The service sends wall-clock time without a zone, so the result is naive.
pub fn parse_send_time(raw: &str) -> Result<NaiveDateTime> {
    if !SEND_TIME_RE.is_match(raw) {
        return Err(Error::field("SENDTIME", raw));
    }
    NaiveDateTime::parse_from_str(raw, SEND_TIME_FORMAT).map_err(|_| Error::field("SENDTIME", raw))
}

/// A display name and address pair, as found in `FROM` and `TO`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    /// Display name; the address itself when the sender gave none.
    pub name: String,
    /// Bare email address.
    pub address: String,
}

impl Contact {
    /// Parse `Display Name<user@example.com>`.
    ///
    /// Returns `None` when there is no angle-bracketed address.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = CONTACT_RE.captures(raw.trim())?;
        let address = caps[2].trim().to_string();
        if address.is_empty() {
            return None;
        }
        let name = match caps[1].trim() {
            "" => address.clone(),
            name => name.to_string(),
        };
        Some(Self { name, address })
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}>", self.name, self.address)
    }
}

/// Raw inbox entry as sent by the service.
#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "SUBJECT")]
    subject: String,
    #[serde(rename = "SENDTIME")]
    send_time: String,
    #[serde(rename = "TO")]
    to: String,
    #[serde(rename = "FROM")]
    from: String,
    #[serde(rename = "ISREAD")]
    is_read: Value,
    #[serde(rename = "MID", default)]
    id: Value,
    #[serde(rename = "CONTENT", default)]
    content: Option<String>,
}

/// `ISREAD` is read unless it is zero, `"0"` or `false`.
fn parse_flag(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_none_or(|n| n != 0.0),
        Value::String(s) => s.trim().parse::<f64>().map_or(true, |n| n != 0.0),
        _ => true,
    }
}

/// `MID` is opaque; a missing one only matters when the body is fetched.
fn parse_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Pull the body text out of a `mailinfo` result payload.
pub(crate) fn extract_body(result: &Value) -> Result<String> {
    // Some responses wrap the payload in a further sequence.
    let node = if result.is_array() {
        result.pointer("/1/0/DATA/0")
    } else {
        result.pointer("/DATA/0/DATA/0")
    };

    match node {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Err(Error::shape(format!("message body is not a string: {other}"))),
        None => Err(Error::shape("missing message body in `mailinfo` result")),
    }
}

#[derive(Debug)]
enum Body {
    Unloaded,
    Loading,
    Loaded(String),
}

/// Load state of a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyState {
    /// Not fetched yet.
    Unloaded,
    /// A fetch is in flight.
    Loading,
    /// Fetched and cached on the message.
    Loaded,
}

/// One inbox entry.
///
/// Every field except the body is filled in when the message is parsed. The
/// body is fetched on first call to [`Message::content`] and cached from then
/// on. The message keeps only a weak link to its [`Client`], so it never
/// keeps the session alive.
#[derive(Serialize)]
pub struct Message {
    /// Service-issued message identifier (`MID`).
    pub id: String,
    /// Subject line.
    pub subject: String,
    /// Time the message was sent.
    pub send_time: NaiveDateTime,
    /// Sender.
    pub from: Contact,
    /// Recipient.
    pub to: Contact,
    /// Whether the message has been read.
    pub is_read: bool,
    #[serde(skip)]
    body: Mutex<Body>,
    #[serde(skip)]
    session: Weak<Session>,
}

impl Message {
    /// Build a message from a raw inbox entry.
    ///
    /// Without a `client` the body can only come from a `CONTENT` field
    /// already present in `raw`.
    pub fn from_raw(raw: &Value, client: Option<&Client>) -> Result<Self> {
        Self::parse(raw, client.map(Client::downgrade).unwrap_or_default())
    }

    fn parse(raw: &Value, session: Weak<Session>) -> Result<Self> {
        let raw = RawMessage::deserialize(raw)
            .map_err(|e| Error::shape(format!("malformed message entry: {e}")))?;

        let body = match raw.content {
            Some(content) if !content.is_empty() => Body::Loaded(content),
            _ => Body::Unloaded,
        };

        Ok(Self {
            id: parse_id(&raw.id),
            send_time: parse_send_time(&raw.send_time)?,
            from: Contact::parse(&raw.from).ok_or_else(|| Error::field("FROM", raw.from.as_str()))?,
            to: Contact::parse(&raw.to).ok_or_else(|| Error::field("TO", raw.to.as_str()))?,
            is_read: parse_flag(&raw.is_read),
            subject: raw.subject,
            body: Mutex::new(body),
            session,
        })
    }

    /// Get the message body, fetching it on first access.
    ///
    /// Returns `Ok(None)` when the body is not cached and the client that
    /// produced this message is gone. After one successful fetch the cached
    /// body is returned without further requests.
    ///
    /// # Examples
    /// ```no_run
    /// # use mail24_client::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mail24_client::Error> {
    /// let client = Client::new().await?;
    /// if let Some(msg) = client.receive().await?.first() {
    ///     println!("{}", msg.content().await?.unwrap_or_default());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn content(&self) -> Result<Option<String>> {
        let mut body = self.body.lock().await;
        if let Body::Loaded(text) = &*body {
            return Ok(Some(text.clone()));
        }

        let Some(session) = self.session.upgrade() else {
            return Ok(None);
        };

        if self.id.is_empty() {
            return Err(Error::field("MID", self.id.as_str()));
        }

        *body = Body::Loading;
        debug!(id = %self.id, "fetching message body");

        let fetched = match session.request("mailinfo", &[("f", self.id.as_str())]).await {
            Ok(result) => extract_body(&result),
            Err(err) => Err(err),
        };

        match fetched {
            Ok(text) => {
                *body = Body::Loaded(text.clone());
                Ok(Some(text))
            }
            Err(err) => {
                *body = Body::Unloaded;
                Err(err)
            }
        }
    }

    /// The body if it has already been loaded. Never touches the network.
    pub fn cached_content(&self) -> Option<String> {
        match self.body.try_lock().as_deref() {
            Ok(Body::Loaded(text)) => Some(text.clone()),
            _ => None,
        }
    }

    /// Current load state of the body.
    pub fn body_state(&self) -> BodyState {
        match self.body.try_lock().as_deref() {
            Ok(Body::Loaded(_)) => BodyState::Loaded,
            // A cancelled fetch leaves `Loading` behind with the lock free.
            Ok(Body::Unloaded | Body::Loading) => BodyState::Unloaded,
            Err(_) => BodyState::Loading,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} {}", self.subject, self.from, self.send_time)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Message {} from {}>", self.subject, self.from.address)
    }
}
