//! Variable Store (component A)
//!
//! A mutable keyed string store, scoped to one attempt and never shared
//! across workers. Values flagged `secret` are redacted whenever the store
//! is rendered for logs.

use std::collections::HashMap;
use std::fmt;

/// Wraps a value whose `Debug`/`Display` output is always `***`, so a
/// secret can be carried right up to the edge of a `tracing` call or sink
/// without an extra filtering step remembering to strip it.
#[derive(Clone)]
pub struct Redacted<T>(pub T);

impl<T> fmt::Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

impl<T> fmt::Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

#[derive(Clone)]
struct Value {
    content: String,
    secret: bool,
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.secret {
            f.debug_struct("Value")
                .field("content", &Redacted(&self.content))
                .field("secret", &self.secret)
                .finish()
        } else {
            f.debug_struct("Value")
                .field("content", &self.content)
                .field("secret", &self.secret)
                .finish()
        }
    }
}

/// Per-attempt variable store used while building requests and extracting
/// fields from responses.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    values: HashMap<String, Value>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefill the built-ins a template may reference (spec §4.4):
    /// `USER`, `PASS`, `EMAIL` plus lowercase aliases.
    pub fn from_combo(username: &str, password: &str, email: Option<&str>) -> Self {
        let mut store = Self::new();
        store.set("USER", username);
        store.set("username", username);
        store.set_secret("PASS", password);
        store.set_secret("password", password);
        if let Some(email) = email {
            store.set("EMAIL", email);
            store.set("email", email);
        }
        store
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(
            name.into(),
            Value {
                content: value.into(),
                secret: false,
            },
        );
    }

    pub fn set_secret(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(
            name.into(),
            Value {
                content: value.into(),
                secret: true,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|v| v.content.as_str())
    }

    pub fn is_secret(&self, name: &str) -> bool {
        self.values.get(name).map(|v| v.secret).unwrap_or(false)
    }

    /// Snapshot of non-secret key/value pairs, suitable for a result's
    /// `captured_variables` or for structured logging.
    pub fn snapshot_redacted(&self) -> HashMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| {
                let rendered = if v.secret {
                    Redacted(&v.content).to_string()
                } else {
                    v.content.clone()
                };
                (k.clone(), rendered)
            })
            .collect()
    }

    /// Snapshot of every key/value pair, secrets included. Only for use
    /// inside the request-building path, never for logs.
    pub fn snapshot_raw(&self) -> HashMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.content.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_combo_populates_builtins() {
        let store = VariableStore::from_combo("alice", "hunter2", Some("alice@example.com"));
        assert_eq!(store.get("USER"), Some("alice"));
        assert_eq!(store.get("username"), Some("alice"));
        assert_eq!(store.get("PASS"), Some("hunter2"));
        assert_eq!(store.get("EMAIL"), Some("alice@example.com"));
    }

    #[test]
    fn secrets_redacted_in_snapshot() {
        let store = VariableStore::from_combo("alice", "hunter2", None);
        let snapshot = store.snapshot_redacted();
        assert_eq!(snapshot.get("PASS").map(String::as_str), Some("***"));
        assert_eq!(snapshot.get("USER").map(String::as_str), Some("alice"));
    }

    #[test]
    fn secret_value_debug_output_never_shows_raw_content() {
        let store = VariableStore::from_combo("alice", "hunter2", None);
        let debug_output = format!("{:?}", store);
        assert!(!debug_output.contains("hunter2"));
        assert!(debug_output.contains("alice"));
    }

    #[test]
    fn no_email_when_absent() {
        let store = VariableStore::from_combo("alice", "hunter2", None);
        assert!(store.get("EMAIL").is_none());
    }
}
