use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::json::JsonMap;

/// A feedback submission as captured by the web layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub message: String,
    #[serde(default)]
    pub context: Option<String>,
}

impl Feedback {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Context trimmed to nothing counts as absent
    pub fn present_context(&self) -> Option<&str> {
        self.context
            .as_deref()
            .filter(|context| !context.trim().is_empty())
    }

    /// Validation messages; empty when the submission is acceptable
    pub fn validate(&self, max_context_length: usize) -> Vec<String> {
        let mut errors = Vec::new();
        if self.message.trim().is_empty() {
            errors.push("Message can't be blank".to_string());
        }
        if let Some(context) = &self.context {
            if context.chars().count() > max_context_length {
                errors.push(format!(
                    "Context is too long (maximum is {} characters)",
                    max_context_length
                ));
            }
        }
        errors
    }
}

/// Request body for the feedback endpoint: `{"feedback": {...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub feedback: FeedbackParams,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackParams {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

impl From<FeedbackParams> for Feedback {
    fn from(params: FeedbackParams) -> Self {
        Self {
            message: params.message.unwrap_or_default(),
            context: params.context,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredFeedback {
    pub id: u64,
    pub feedback: Feedback,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// OAuth client-credentials response. Both fields are optional on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl TokenResponse {
    pub const DEFAULT_EXPIRES_IN: u64 = 3600;

    /// Reads the fields out of an already-parsed body, tolerating odd types
    pub fn from_map(map: &JsonMap) -> Self {
        let access_token = map
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string);
        // Fractions are truncated and negatives clamp to zero
        let expires_in = map.get("expires_in").and_then(|value| match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_i64().map(|secs| secs.max(0) as u64))
                .or_else(|| n.as_f64().map(whole_seconds)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(|secs| secs.max(0) as u64)
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(whole_seconds))
            }
            _ => None,
        });

        Self {
            access_token,
            expires_in,
        }
    }

    pub fn expires_in_or_default(&self) -> u64 {
        self.expires_in.unwrap_or(Self::DEFAULT_EXPIRES_IN)
    }
}

fn whole_seconds(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        secs.trunc() as u64
    } else {
        0
    }
}

/// Ticket identifier as returned by TDX, which may be numeric or text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TicketId {
    Number(i64),
    Text(String),
}

impl TicketId {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(TicketId::Number),
            Value::String(s) if !s.is_empty() => Some(TicketId::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketId::Number(n) => write!(f, "{}", n),
            TicketId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for TicketId {
    fn from(id: i64) -> Self {
        TicketId::Number(id)
    }
}

/// TDX request body, keyed by the vendor's PascalCase field names.
///
/// Keys keep insertion order. `insert_opt` skips `None` so absent settings
/// never reach the wire as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketPayload(JsonMap);

impl TicketPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl fmt::Display, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn insert_opt<V: Into<Value>>(&mut self, key: impl fmt::Display, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.insert(key, value);
        }
        self
    }

    /// Merges caller-supplied attributes; later keys win
    pub fn merge<K, V, I>(&mut self, attributes: I) -> &mut Self
    where
        K: fmt::Display,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in attributes {
            self.insert(key, value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> JsonMap {
        self.0
    }
}

impl From<JsonMap> for TicketPayload {
    fn from(map: JsonMap) -> Self {
        Self(map)
    }
}
