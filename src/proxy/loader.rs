//! Proxy File Loading
//!
//! `host:port[:scheme]` per line, scheme defaulting to `http`. Malformed
//! lines are skipped and counted (spec §6).

use std::path::Path;

use tokio::fs;
use tracing::warn;

use super::types::Scheme;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedProxy {
    pub host: String,
    pub port: u16,
    pub scheme: Scheme,
}

#[derive(Debug)]
pub struct ProxyLoadResult {
    pub proxies: Vec<ParsedProxy>,
    pub skipped: usize,
}

fn parse_line(line: &str) -> Option<ParsedProxy> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let mut parts = line.splitn(3, ':');
    let host = parts.next()?.to_string();
    let port: u16 = parts.next()?.parse().ok()?;
    let scheme = match parts.next() {
        Some(s) => Scheme::parse(s)?,
        None => Scheme::Http,
    };

    if host.is_empty() {
        return None;
    }

    Some(ParsedProxy { host, port, scheme })
}

pub async fn load_proxies(path: impl AsRef<Path>) -> Result<ProxyLoadResult> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to read proxy file {}: {}", path.display(), e))?;

    let mut proxies = Vec::new();
    let mut skipped = 0usize;

    for line in contents.lines() {
        match parse_line(line) {
            Some(p) => proxies.push(p),
            None if line.trim().is_empty() => {}
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, path = %path.display(), "skipped malformed proxy lines");
    }

    Ok(ProxyLoadResult { proxies, skipped })
}
