//! 24mail async client implementation.

use crate::{Error, Message, Result};
use rand::Rng;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT,
};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

const BASE_URL: &str = "http://24mail.chacuo.net/";
const DEFAULT_SUFFIX: &str = "chacuo.net";
const USER_AGENT_VALUE: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:131.0) Gecko/20100101 Firefox/131.0";

const NAME_LEN: usize = 11;
const NAME_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random mailbox name: 11 lowercase letters or digits.
///
/// The random source is passed in so callers can seed it.
pub fn random_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..NAME_LEN)
        .map(|_| NAME_CHARSET[rng.random_range(0..NAME_CHARSET.len())] as char)
        .collect()
}

/// Encode the `arg` form field.
///
/// The service expects a query string whose `&` separators are replaced by `_`.
pub(crate) fn encode_arg(args: &[(&str, &str)]) -> Result<String> {
    Ok(serde_urlencoded::to_string(args)?.replace('&', "_"))
}

/// Pull the result payload out of a response envelope.
///
/// The payload is the last element of the top-level `data` sequence.
pub(crate) fn unwrap_envelope(body: Value) -> Result<Value> {
    let Value::Object(mut envelope) = body else {
        return Err(Error::shape("response is not a JSON object"));
    };

    match envelope.remove("data") {
        Some(Value::Array(mut items)) => items.pop().ok_or_else(|| Error::shape("`data` is empty")),
        Some(_) => Err(Error::shape("`data` is not a sequence")),
        None => Err(Error::shape("missing `data` field")),
    }
}

/// State shared between a [`Client`] and the messages it produced.
#[derive(Debug)]
pub(crate) struct Session {
    http: reqwest::Client,
    name: String,
    suffix: String,
    base_url: String,
    user_agent: String,
}

impl Session {
    /// Common POST API request pattern.
    pub(crate) async fn request(&self, kind: &str, args: &[(&str, &str)]) -> Result<Value> {
        let arg = encode_arg(args)?;
        let form = [
            ("data", self.name.as_str()),
            ("type", kind),
            ("arg", arg.as_str()),
        ];
        debug!(mailbox = %self.name, kind, arg = %arg, "posting request");

        let body = self
            .http
            .post(&self.base_url)
            .form(&form)
            .headers(self.headers())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        unwrap_envelope(serde_json::from_str(&body)?)
    }

    fn address(&self) -> String {
        format!("{}@{}", self.name, self.suffix)
    }

    /// Build headers for API requests.
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, value);
        }
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.5"));
        headers.insert(
            "X-Requested-With",
            HeaderValue::from_static("XMLHttpRequest"),
        );
        if let Ok(value) = HeaderValue::from_str(&self.base_url) {
            headers.insert(REFERER, value);
        }
        headers
    }
}

/// Async client for the 24mail temporary email service.
///
/// A client is bound to one mailbox name for its whole lifetime and owns the
/// HTTP session (cookies) used for every call. Operations are meant to be
/// issued one at a time by a single owner.
///
/// Use [`Client::new`] for a random mailbox or [`Client::builder`] to pick the
/// name, prefix, domain or transport settings.
pub struct Client {
    session: Arc<Session>,
}

impl Client {
    /// Create a builder for configuring the client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client for a random mailbox on the default domain.
    ///
    /// # Examples
    /// ```no_run
    /// # use mail24_client::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mail24_client::Error> {
    /// let client = Client::new().await?;
    /// println!("{}", client.address());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new() -> Result<Self> {
        ClientBuilder::new().build().await
    }

    /// The mailbox local-name, including any prefix.
    pub fn name(&self) -> &str {
        &self.session.name
    }

    /// The domain part of the address.
    pub fn suffix(&self) -> &str {
        &self.session.suffix
    }

    /// The full email address.
    pub fn address(&self) -> String {
        self.session.address()
    }

    /// Issue a raw API call and return its result payload.
    ///
    /// `args` is encoded in order into the `arg` form field. The payload is
    /// the last element of the response's `data` sequence.
    pub async fn request(&self, kind: &str, args: &[(&str, &str)]) -> Result<Value> {
        self.session.request(kind, args).await
    }

    /// Fetch the raw inbox entries without parsing them.
    ///
    /// An absent `list` field means an empty inbox.
    pub async fn list_raw(&self) -> Result<Vec<Value>> {
        let mut result = self.request("refresh", &[]).await?;

        match result.get_mut("list").map(Value::take) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(Error::shape("`list` is not a sequence")),
        }
    }

    /// Get the messages currently in the inbox.
    ///
    /// Entries are returned in the order the service sent them. An entry that
    /// fails to parse is logged and skipped; the rest of the listing is kept.
    ///
    /// # Examples
    /// ```no_run
    /// # use mail24_client::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mail24_client::Error> {
    /// let client = Client::new().await?;
    /// for msg in client.list_messages().await? {
    ///     println!("{msg}");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn list_messages(&self) -> Result<Vec<Message>> {
        let raw = self.list_raw().await?;
        let total = raw.len();

        let messages: Vec<Message> = raw
            .iter()
            .filter_map(|entry| match Message::from_raw(entry, Some(self)) {
                Ok(message) => Some(message),
                Err(err) => {
                    warn!(mailbox = %self.name(), error = %err, "skipping malformed message");
                    None
                }
            })
            .collect();

        debug!(mailbox = %self.name(), total, parsed = messages.len(), "listed messages");
        Ok(messages)
    }

    /// Alias for [`Client::list_messages`].
    pub async fn receive(&self) -> Result<Vec<Message>> {
        self.list_messages().await
    }

    /// Release and refresh the mailbox on the service side.
    ///
    /// Never called automatically.
    pub async fn renew(&self) -> Result<Value> {
        info!(address = %self.address(), "renewing mailbox");
        self.request("renew", &[("d", self.suffix())]).await
    }

    pub(crate) fn downgrade(&self) -> Weak<Session> {
        Arc::downgrade(&self.session)
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Client {}>", self.address())
    }
}

/// Builder for configuring a 24mail client.
///
/// Start with [`Client::builder`] to override defaults.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    name: Option<String>,
    prefix: String,
    suffix: String,
    http: Option<reqwest::Client>,
    proxy: Option<String>,
    danger_accept_invalid_certs: bool,
    user_agent: String,
    base_url: String,
    verify_registration: bool,
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
    /// - Random 11 character name, no prefix
    /// - Domain `chacuo.net`
    /// - A fresh cookie-enabled session, no proxy, strict TLS
    /// - The inbox is probed after the handshake
    pub fn new() -> Self {
        Self {
            name: None,
            prefix: String::new(),
            suffix: DEFAULT_SUFFIX.to_string(),
            http: None,
            proxy: None,
            danger_accept_invalid_certs: false,
            user_agent: USER_AGENT_VALUE.to_string(),
            base_url: BASE_URL.to_string(),
            verify_registration: true,
        }
    }

    /// Use an explicit mailbox name. An empty name falls back to a random one.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Generate the mailbox name from the given random source.
    pub fn name_from_rng<R: Rng + ?Sized>(mut self, rng: &mut R) -> Self {
        self.name = Some(random_name(rng));
        self
    }

    /// Prepend a prefix to the mailbox name.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the mailbox domain. Must be one the service hosts.
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Reuse an existing HTTP client as the session.
    ///
    /// The client should have its cookie store enabled. Proxy and TLS
    /// settings on this builder are ignored when a client is supplied.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Set a proxy URL (e.g., "socks5://127.0.0.1:1080").
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

    /// Override the service root URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Probe the inbox after the `set` handshake (default: true).
    ///
    /// When enabled, a `refresh` call that fails (transport, JSON or envelope
    /// shape) is reported as [`Error::Registration`]. The service does not echo
    /// the bound name, so a name it silently ignored is not detected.
    pub fn verify_registration(mut self, value: bool) -> Self {
        self.verify_registration = value;
        self
    }

    /// Build the client and register the mailbox.
    ///
    /// This fetches the service root to open the session, then binds the
    /// session to the mailbox name.
    ///
    /// # Examples
    /// ```no_run
    /// # use mail24_client::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mail24_client::Error> {
    /// let client = Client::builder()
    ///     .name("abcabcabc1")
    ///     .prefix("test_")
    ///     .build()
    ///     .await?;
    /// assert_eq!(client.address(), "test_abcabcabc1@chacuo.net");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn build(self) -> Result<Client> {
        let http = match self.http {
            Some(http) => http,
            None => {
                let mut builder = reqwest::Client::builder()
                    .danger_accept_invalid_certs(self.danger_accept_invalid_certs);

                if let Some(proxy_url) = &self.proxy {
                    builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
                }

                // Cookies carry the mailbox binding between requests
                builder.cookie_store(true).build()?
            }
        };

        let name = match self.name.filter(|name| !name.is_empty()) {
            Some(name) => name,
            None => random_name(&mut rand::rng()),
        };

        let session = Session {
            http,
            name: format!("{}{}", self.prefix, name),
            suffix: self.suffix,
            base_url: self.base_url,
            user_agent: self.user_agent,
        };

        session
            .http
            .get(&session.base_url)
            .headers(session.headers())
            .send()
            .await?
            .error_for_status()?;

        session
            .request("set", &[("d", session.suffix.as_str())])
            .await?;

        if self.verify_registration {
            session
                .request("refresh", &[])
                .await
                .map_err(|source| Error::Registration {
                    name: session.name.clone(),
                    source: Box::new(source),
                })?;
        }

        info!(address = %session.address(), "mailbox registered");
        Ok(Client {
            session: Arc::new(session),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    #[test]
    fn arg_separators_become_underscores() {
        assert_eq!(encode_arg(&[("d", "chacuo.net")]).unwrap(), "d=chacuo.net");
        assert_eq!(encode_arg(&[("a", "1"), ("b", "2")]).unwrap(), "a=1_b=2");
        assert_eq!(encode_arg(&[]).unwrap(), "");
    }

    #[test]
    fn arg_values_are_query_encoded() {
        let encoded = encode_arg(&[("q", "a&b c"), ("f", "x")]).unwrap();
        assert_eq!(encoded, "q=a%26b+c_f=x");
        assert!(!encoded.contains('&'));
    }

    #[test]
    fn envelope_yields_last_element() {
        let body = json!({"data": ["A", "B", {"list": []}]});
        assert_eq!(unwrap_envelope(body).unwrap(), json!({"list": []}));

        let single = json!({"data": [1]});
        assert_eq!(unwrap_envelope(single).unwrap(), json!(1));
    }

    #[test]
    fn envelope_shape_errors() {
        for body in [
            json!({"data": []}),
            json!({"status": 1}),
            json!({"data": {"list": []}}),
            json!([1, 2, 3]),
        ] {
            assert!(matches!(
                unwrap_envelope(body),
                Err(Error::ResponseParse(_))
            ));
        }
    }

    #[test]
    fn random_names_are_lowercase_alphanumeric() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let name = random_name(&mut rng);
            assert_eq!(name.len(), 11);
            assert!(
                name.chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            );
        }
    }

    #[test]
    fn seeded_rng_gives_repeatable_names() {
        let first = random_name(&mut StdRng::seed_from_u64(24));
        let second = random_name(&mut StdRng::seed_from_u64(24));
        assert_eq!(first, second);
        assert_ne!(first, random_name(&mut StdRng::seed_from_u64(25)));
    }
}
