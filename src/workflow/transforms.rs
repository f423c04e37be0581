//! Transformation Functions
//!
//! Value transforms a workflow step may apply while building a request or
//! processing a captured variable (spec §4.4).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;
use serde::Deserialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// A closed set of transformation functions, modeled as a tagged union
/// rather than a plugin registry (spec §9).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum Transform {
    Base64Encode,
    Base64Decode,
    UrlEncode,
    UrlDecode,
    Md5,
    Sha1,
    Sha256,
    Upper,
    Lower,
    Trim,
    Replace { from: String, to: String },
    Substring { start: usize, len: usize },
    RegexCapture { pattern: String, group: usize },
}

impl Transform {
    pub fn apply(&self, input: &str) -> String {
        match self {
            Transform::Base64Encode => STANDARD.encode(input.as_bytes()),
            Transform::Base64Decode => STANDARD
                .decode(input.as_bytes())
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .unwrap_or_default(),
            Transform::UrlEncode => utf8_percent_encode(input, NON_ALPHANUMERIC).to_string(),
            Transform::UrlDecode => percent_decode_str(input)
                .decode_utf8()
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| input.to_string()),
            Transform::Md5 => format!("{:x}", md5::compute(input.as_bytes())),
            Transform::Sha1 => {
                let mut hasher = Sha1::new();
                hasher.update(input.as_bytes());
                format!("{:x}", hasher.finalize())
            }
            Transform::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(input.as_bytes());
                format!("{:x}", hasher.finalize())
            }
            Transform::Upper => input.to_uppercase(),
            Transform::Lower => input.to_lowercase(),
            Transform::Trim => input.trim().to_string(),
            Transform::Replace { from, to } => input.replace(from.as_str(), to.as_str()),
            Transform::Substring { start, len } => {
                let chars: Vec<char> = input.chars().collect();
                if *start >= chars.len() {
                    return String::new();
                }
                let end = (*start + *len).min(chars.len());
                chars[*start..end].iter().collect()
            }
            Transform::RegexCapture { pattern, group } => Regex::new(pattern)
                .ok()
                .and_then(|re| re.captures(input))
                .and_then(|caps| caps.get(*group))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        }
    }
}
