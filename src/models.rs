use serde::Serialize;
use serde_json::Value;
use std::fmt;
use url::Url;

// Verbs the gateway forwards to backend services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    /// Reads are the only requests eligible for caching.
    pub fn is_read(self) -> bool {
        matches!(self, Verb::Get)
    }

    pub fn is_mutation(self) -> bool {
        !self.is_read()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// One logical request, built by the HTTP layer and handed to the dispatcher.
// Immutable once constructed.
#[derive(Debug, Clone)]
pub struct LogicalRequest {
    pub verb: Verb,
    pub service: String,
    pub resource_id: Option<String>,
    pub body: Option<Value>,
    pub cache_key: Option<String>,
}

impl LogicalRequest {
    pub fn new(verb: Verb, service: impl Into<String>) -> Self {
        Self {
            verb,
            service: service.into(),
            resource_id: None,
            body: None,
            cache_key: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    // Path on the backend, e.g. "/chat" or "/chat/42"
    pub fn path(&self) -> String {
        match &self.resource_id {
            Some(id) => format!("/{}/{}", self.service, id),
            None => format!("/{}", self.service),
        }
    }

    /// Full backend URL on `instance`.
    ///
    /// The id is pushed as one percent-encoded path segment, so `/`, `?` or `#`
    /// inside it can never leave `/{service}/{id}`. Returns `None` when the
    /// instance address cannot carry a path.
    pub fn backend_url(&self, instance: &str) -> Option<String> {
        let mut url = Url::parse(instance).ok()?;
        {
            let mut segments = url.path_segments_mut().ok()?;
            segments.pop_if_empty().push(&self.service);
            if let Some(id) = &self.resource_id {
                segments.push(id);
            }
        }
        Some(url.into())
    }

    // Low-cardinality route label for metrics
    pub fn route(&self) -> String {
        match self.resource_id {
            Some(_) => format!("/api/{}/{{id}}", self.service),
            None => format!("/api/{}", self.service),
        }
    }
}

// What the dispatcher hands back on success
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayResponse {
    pub status: u16,
    // None when the backend sent no body (e.g. 204)
    pub body: Option<Value>,
    #[serde(skip)]
    pub from_cache: bool,
}

// Explicit result of one backend call. The dispatcher matches on this instead of
// guessing from the shape of a transport error.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendOutcome {
    Success { status: u16, body: Option<Value> },
    ApplicationError { status: u16, body: Value },
    Timeout,
    TransportFailure(String),
}

impl BackendOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BackendOutcome::Success { .. })
    }
}
