//! Template Substitution (component B)
//!
//! `{NAME}` placeholders, substituted case-sensitively in one left-to-right
//! pass. Missing variables are left intact rather than erroring (spec §4.4).

use super::variables::VariableStore;

/// Substitute every `{NAME}` placeholder in `template` using `store`.
/// Non-recursive: the output of one substitution is never rescanned.
pub fn render(template: &str, store: &VariableStore) -> String {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = template[i + 1..].find('}') {
                let name = &template[i + 1..i + 1 + end];
                if is_valid_name(name) {
                    match store.get(name) {
                        Some(value) => {
                            out.push_str(value);
                            i = i + 1 + end + 1;
                            continue;
                        }
                        None => {
                            out.push_str(&template[i..=i + 1 + end]);
                            i = i + 1 + end + 1;
                            continue;
                        }
                    }
                }
            }
        }
        let ch = template[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_when_no_placeholders() {
        let store = VariableStore::new();
        assert_eq!(render("https://example.com/login", &store), "https://example.com/login");
    }

    #[test]
    fn substitutes_known_variable() {
        let mut store = VariableStore::new();
        store.set("USER", "alice");
        assert_eq!(render("user={USER}", &store), "user=alice");
    }

    #[test]
    fn leaves_unknown_placeholder_intact() {
        let store = VariableStore::new();
        assert_eq!(render("user={MISSING}", &store), "user={MISSING}");
    }

    #[test]
    fn not_recursive() {
        let mut store = VariableStore::new();
        store.set("A", "{B}");
        store.set("B", "leaked");
        assert_eq!(render("{A}", &store), "{B}");
    }

    #[test]
    fn multiple_placeholders_left_to_right() {
        let mut store = VariableStore::new();
        store.set("USER", "alice");
        store.set("PASS", "hunter2");
        assert_eq!(render("{USER}:{PASS}", &store), "alice:hunter2");
    }
}
