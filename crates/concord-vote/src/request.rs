//! Lenient parsing of vote request bodies.
//!
//! Clients send small JSON objects with loosely typed fields. A body that is
//! missing or not JSON at all reads as an empty request.

use serde::Deserialize;
use serde_json::Value;

/// Name used when a request carries no user.
pub const DEFAULT_USER: &str = "Player";

/// Ballot strings that count as yes.
const YES: [&str; 5] = ["1", "true", "yes", "y", "t"];

/// Trimmed user name, or [`DEFAULT_USER`].
pub fn request_user(user: Option<&str>) -> String {
    user.map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(DEFAULT_USER)
        .to_string()
}

/// Interpret a ballot value. Absent or unrecognized values vote no.
pub fn parse_ballot(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => YES.contains(&n.to_string().as_str()),
        Some(Value::String(s)) => YES.contains(&s.trim().to_ascii_lowercase().as_str()),
        _ => false,
    }
}

fn parse_body<T: for<'de> Deserialize<'de> + Default>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap_or_default()
}

/// Body of `start`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub cost: Option<Value>,
}

impl StartRequest {
    pub fn from_body(body: &[u8]) -> Self {
        parse_body(body)
    }

    pub fn requester(&self) -> String {
        request_user(self.user.as_deref())
    }

    /// Title, defaulting to the tech id.
    pub fn title_or(&self, tech: &str) -> String {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(tech)
            .to_string()
    }

    /// Cost as a finite number, zero when absent or unparsable.
    pub fn cost(&self) -> f64 {
        let cost = match &self.cost {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        cost.filter(|c| c.is_finite()).unwrap_or(0.0)
    }
}

/// Body of `cast`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CastRequest {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub vote: Option<Value>,
}

impl CastRequest {
    pub fn from_body(body: &[u8]) -> Self {
        parse_body(body)
    }

    pub fn voter(&self) -> String {
        request_user(self.user.as_deref())
    }

    pub fn ballot(&self) -> bool {
        parse_ballot(self.vote.as_ref())
    }
}

/// Body carrying only a user, as sent to `cancel`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserRequest {
    #[serde(default)]
    pub user: Option<String>,
}

impl UserRequest {
    pub fn from_body(body: &[u8]) -> Self {
        parse_body(body)
    }

    pub fn user(&self) -> String {
        request_user(self.user.as_deref())
    }
}
