//! Combo Data Model

use std::sync::Arc;

/// A single `username:password` credential pair parsed from a combo file.
///
/// Immutable after construction. `email` is populated iff `username`
/// contains an `@`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combo {
    pub raw_line: Arc<str>,
    pub username: Arc<str>,
    pub password: Arc<str>,
    pub email: Option<Arc<str>>,
}

impl Combo {
    /// Parse a single combo line of the form `username:password`.
    ///
    /// Returns `None` for blank lines or lines with fewer than two
    /// `:`-separated fields, matching spec §6.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (username, password) = line.split_once(':')?;
        if username.is_empty() {
            return None;
        }

        let email = username.contains('@').then(|| Arc::from(username));

        Some(Self {
            raw_line: Arc::from(line),
            username: Arc::from(username),
            password: Arc::from(password),
            email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_combo() {
        let combo = Combo::parse("alice:hunter2").unwrap();
        assert_eq!(&*combo.username, "alice");
        assert_eq!(&*combo.password, "hunter2");
        assert!(combo.email.is_none());
    }

    #[test]
    fn detects_email_username() {
        let combo = Combo::parse("alice@example.com:hunter2").unwrap();
        assert_eq!(combo.email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn password_may_contain_colons() {
        let combo = Combo::parse("alice:pa:ss:word").unwrap();
        assert_eq!(&*combo.username, "alice");
        assert_eq!(&*combo.password, "pa:ss:word");
    }

    #[test]
    fn skips_blank_lines() {
        assert!(Combo::parse("").is_none());
        assert!(Combo::parse("   ").is_none());
    }

    #[test]
    fn skips_lines_without_separator() {
        assert!(Combo::parse("no-separator-here").is_none());
    }

    #[test]
    fn skips_lines_with_empty_username() {
        assert!(Combo::parse(":password").is_none());
    }
}
