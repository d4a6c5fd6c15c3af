use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of the acting user, passed in by the caller rather than read from session storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn can_edit_metrics(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Entity selector for a daily summary: every camera/zone/cashier, or exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ScopeFilter {
    #[default]
    All,
    Entity(String),
}

impl ScopeFilter {
    pub fn entity(id: impl Into<String>) -> Self {
        Self::Entity(id.into())
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, ScopeFilter::All)
    }

    pub fn entity_id(&self) -> Option<&str> {
        match self {
            ScopeFilter::All => None,
            ScopeFilter::Entity(id) => Some(id),
        }
    }

    /// Value sent to endpoints that take `all` literally.
    pub fn as_query_value(&self) -> &str {
        self.entity_id().unwrap_or("all")
    }
}

impl fmt::Display for ScopeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query_value())
    }
}

impl FromStr for ScopeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("scope must not be empty".to_string());
        }
        if s.eq_ignore_ascii_case("all") {
            Ok(ScopeFilter::All)
        } else {
            Ok(ScopeFilter::Entity(s.to_string()))
        }
    }
}
