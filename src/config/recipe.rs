//! Check-Config Recipe Loader
//!
//! A minimal TOML-directory reader that produces the already-parsed
//! [`CheckConfig`] values the core expects (spec §1: `.opk`/`.svb`/`.loli`
//! parsing itself is out of scope; this is the narrow collaborator that
//! feeds the core in this crate's own CLI).

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::checker::types::{CheckConfig, HttpMethod};
use crate::workflow::CaptureStep;
use crate::Result;

#[derive(Debug, Deserialize)]
struct RawConfig {
    name: String,
    method: String,
    url_template: String,
    #[serde(default)]
    header_templates: HashMap<String, String>,
    #[serde(default)]
    body_fields: HashMap<String, String>,
    #[serde(default)]
    success_statuses: Vec<u16>,
    #[serde(default)]
    failure_statuses: Vec<u16>,
    #[serde(default)]
    success_markers: Vec<String>,
    #[serde(default)]
    failure_markers: Vec<String>,
    #[serde(default)]
    requires_proxy: bool,
    #[serde(default)]
    may_use_proxy: bool,
    /// Optional response-capture workflow (spec §4.4), e.g.:
    /// `[[capture_steps]]` / `parser = { type = "regex", pattern = "...", group = 1 }`.
    #[serde(default)]
    capture_steps: Vec<CaptureStep>,
}

fn parse_method(raw: &str) -> Option<HttpMethod> {
    match raw.to_ascii_uppercase().as_str() {
        "GET" => Some(HttpMethod::Get),
        "POST" => Some(HttpMethod::Post),
        "PUT" => Some(HttpMethod::Put),
        "DELETE" => Some(HttpMethod::Delete),
        "HEAD" => Some(HttpMethod::Head),
        "OPTIONS" => Some(HttpMethod::Options),
        "PATCH" => Some(HttpMethod::Patch),
        _ => None,
    }
}

impl TryFrom<RawConfig> for CheckConfig {
    type Error = anyhow::Error;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        let method = parse_method(&raw.method)
            .ok_or_else(|| anyhow::anyhow!("unknown method '{}' in config '{}'", raw.method, raw.name))?;

        Ok(CheckConfig {
            name: Arc::from(raw.name.as_str()),
            method,
            url_template: raw.url_template,
            header_templates: raw.header_templates,
            body_fields: raw.body_fields,
            success_statuses: raw.success_statuses.into_iter().collect(),
            failure_statuses: raw.failure_statuses.into_iter().collect(),
            success_markers: raw.success_markers,
            failure_markers: raw.failure_markers,
            requires_proxy: raw.requires_proxy,
            may_use_proxy: raw.may_use_proxy || raw.requires_proxy,
            capture_steps: raw.capture_steps,
        })
    }
}

/// Load every `*.toml` recipe file in `dir` into a [`CheckConfig`]. A file
/// that fails to parse is skipped and logged, not fatal to the batch.
pub async fn load_configs_from_dir(dir: impl AsRef<Path>) -> Result<Vec<CheckConfig>> {
    let dir = dir.as_ref();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| anyhow::anyhow!("failed to read config directory {}: {}", dir.display(), e))?;

    let mut configs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }

        match load_one(&path).await {
            Ok(config) => configs.push(config),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unparseable config recipe"),
        }
    }

    Ok(configs)
}

async fn load_one(path: &Path) -> Result<CheckConfig> {
    let content = tokio::fs::read_to_string(path).await?;
    let raw: RawConfig = toml::from_str(&content)?;
    raw.try_into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_valid_recipe_directory() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("site.toml"),
            r#"
            name = "site"
            method = "POST"
            url_template = "https://example.test/login"
            success_statuses = [200]
            failure_markers = ["Invalid"]
            "#,
        )
        .await
        .unwrap();

        let configs = load_configs_from_dir(dir.path()).await.unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(&*configs[0].name, "site");
        assert_eq!(configs[0].method, HttpMethod::Post);
    }

    #[tokio::test]
    async fn loads_recipe_with_capture_steps() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("site.toml"),
            r#"
            name = "site"
            method = "POST"
            url_template = "https://example.test/login"
            success_statuses = [200]

            [[capture_steps]]
            capture_as = "TOKEN"
            parser = { type = "regex", pattern = "token=(\\w+)", group = 1 }
            transforms = [{ type = "upper" }]
            "#,
        )
        .await
        .unwrap();

        let configs = load_configs_from_dir(dir.path()).await.unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].capture_steps.len(), 1);
        assert_eq!(configs[0].capture_steps[0].capture_as, "TOKEN");
    }

    #[tokio::test]
    async fn skips_unparseable_file_without_failing_batch() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("bad.toml"), "not valid toml {{{").await.unwrap();
        tokio::fs::write(
            dir.path().join("good.toml"),
            r#"
            name = "good"
            method = "GET"
            url_template = "https://example.test/"
            success_statuses = [200]
            "#,
        )
        .await
        .unwrap();

        let configs = load_configs_from_dir(dir.path()).await.unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(&*configs[0].name, "good");
    }
}
