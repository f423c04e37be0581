//! Variable Store and Workflow/Template Subsystem (components A + B)

mod parsers;
mod template;
mod transforms;
mod variables;

use serde::Deserialize;

pub use parsers::Parser;
pub use template::render;
pub use transforms::Transform;
pub use variables::{Redacted, VariableStore};

/// One step of a response-capture workflow: run a parser over the body,
/// optionally post-process with transforms, and assign into the store.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureStep {
    pub parser: Parser,
    #[serde(default)]
    pub transforms: Vec<Transform>,
    pub capture_as: String,
    #[serde(default)]
    pub join_with: Option<String>,
}

impl CaptureStep {
    /// Run this step against a response body, writing the result into
    /// `store` under `capture_as`. A step whose parser finds nothing is a
    /// no-op (spec §4.4: missing input yields empty list, not an error).
    pub fn run(&self, body: &str, store: &mut VariableStore) {
        let mut matches = self.parser.extract(body);
        if matches.is_empty() {
            return;
        }

        let mut value = match &self.join_with {
            Some(sep) => matches.join(sep),
            None => matches.remove(0),
        };

        for transform in &self.transforms {
            value = transform.apply(&value);
        }

        store.set(self.capture_as.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_step_writes_first_match() {
        let step = CaptureStep {
            parser: Parser::Regex {
                pattern: r"token=(\w+)".to_string(),
                group: 1,
            },
            transforms: vec![Transform::Upper],
            capture_as: "TOKEN".to_string(),
            join_with: None,
        };
        let mut store = VariableStore::new();
        step.run("token=abc123", &mut store);
        assert_eq!(store.get("TOKEN"), Some("ABC123"));
    }

    #[test]
    fn capture_step_no_match_is_noop() {
        let step = CaptureStep {
            parser: Parser::Regex {
                pattern: r"nomatch(\w+)".to_string(),
                group: 1,
            },
            transforms: vec![],
            capture_as: "TOKEN".to_string(),
            join_with: None,
        };
        let mut store = VariableStore::new();
        step.run("nothing here", &mut store);
        assert!(store.get("TOKEN").is_none());
    }
}
