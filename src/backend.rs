use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use crate::error::ConfigError;
use crate::models::{BackendOutcome, Verb};

/// Issues one outbound call to a concrete instance.
///
/// Implementations never fail with an error type; every result, including
/// transport problems, is folded into a [`BackendOutcome`].
pub trait Upstream: Send + Sync {
    fn call(
        &self,
        verb: Verb,
        url: &str,
        body: Option<&Value>,
    ) -> impl Future<Output = BackendOutcome> + Send;
}

// reqwest-backed client with a fixed per-call timeout
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Upstream for HttpBackend {
    async fn call(&self, verb: Verb, url: &str, body: Option<&Value>) -> BackendOutcome {
        let mut request = match verb {
            Verb::Get => self.client.get(url),
            Verb::Post => self.client.post(url),
            Verb::Put => self.client.put(url),
            Verb::Delete => self.client.delete(url),
        };
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(res) => res,
            Err(e) => return classify_transport_error(&e),
        };

        let status = response.status();
        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => return classify_transport_error(&e),
        };
        if status.is_success() {
            BackendOutcome::Success {
                status: status.as_u16(),
                body: (!bytes.is_empty()).then(|| parse_body(&bytes)),
            }
        } else {
            BackendOutcome::ApplicationError {
                status: status.as_u16(),
                body: parse_body(&bytes),
            }
        }
    }
}

fn classify_transport_error(e: &reqwest::Error) -> BackendOutcome {
    if e.is_timeout() {
        BackendOutcome::Timeout
    } else {
        BackendOutcome::TransportFailure(e.to_string())
    }
}

// Backends speak JSON; anything else is carried as a JSON string
pub fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
