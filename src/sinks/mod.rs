//! Output Sinks
//!
//! Normalizes one `AttemptResult` per record in `txt`, `json`, or `csv`
//! form, partitioned by config name and status under `output_dir/` (spec
//! §6). Sink failures are logged and dropped; they never block the
//! pipeline (spec §7).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::checker::types::{AttemptResult, AttemptStatus};
use crate::config::OutputFormat;
use crate::Result;

/// The core calls `write(result)` for every result that should be
/// persisted; the sink decides how and where.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn write(&mut self, result: &AttemptResult) -> Result<()>;
    async fn flush(&mut self) -> Result<()>;
}

fn status_dirname(status: AttemptStatus) -> &'static str {
    match status {
        AttemptStatus::Success => "valid",
        AttemptStatus::Fail => "invalid",
        AttemptStatus::Error => "errors",
    }
}

fn extension(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Txt => "txt",
        OutputFormat::Json => "json",
        OutputFormat::Csv => "csv",
    }
}

fn format_txt(result: &AttemptResult) -> String {
    format!(
        "{}:{} | {} | {:?} | {}",
        result.combo.username,
        result.combo.password,
        result.config_name,
        result.status,
        result.latency_ms as u64
    )
}

fn format_json(result: &AttemptResult) -> String {
    let captured: HashMap<&str, &str> = result
        .captured_variables
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    serde_json::json!({
        "task_id": result.task_id,
        "correlation_id": result.correlation_id,
        "username": &*result.combo.username,
        "password": &*result.combo.password,
        "config": &*result.config_name,
        "status": format!("{:?}", result.status).to_lowercase(),
        "http_status": result.http_status,
        "latency_ms": result.latency_ms,
        "error_kind": result.error_kind,
        "captured_variables": captured,
    })
    .to_string()
}

const CSV_HEADER: &str = "username,password,config,status,http_status,latency_ms,error_kind";

fn format_csv(result: &AttemptResult) -> String {
    format!(
        "{},{},{},{:?},{},{},{}",
        csv_escape(&result.combo.username),
        csv_escape(&result.combo.password),
        csv_escape(&result.config_name),
        result.status,
        result.http_status.map(|s| s.to_string()).unwrap_or_default(),
        result.latency_ms as u64,
        result.error_kind.as_deref().unwrap_or("")
    )
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Writes one flat file per (config, status) pair under `output_dir/`.
pub struct FileSink {
    output_dir: PathBuf,
    format: OutputFormat,
    handles: Mutex<HashMap<PathBuf, tokio::fs::File>>,
}

impl FileSink {
    pub fn new(output_dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
            handles: Mutex::new(HashMap::new()),
        }
    }

    fn path_for(&self, result: &AttemptResult) -> PathBuf {
        self.output_dir
            .join(&*result.config_name)
            .join(format!("{}.{}", status_dirname(result.status), extension(self.format)))
    }

    async fn ensure_open(&self, path: &Path) -> Result<()> {
        let mut handles = self.handles.lock().await;
        if handles.contains_key(path) {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let is_new = !path.exists();
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        if is_new && self.format == OutputFormat::Csv {
            file.write_all(CSV_HEADER.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }

        handles.insert(path.to_path_buf(), file);
        Ok(())
    }
}

#[async_trait]
impl ResultSink for FileSink {
    async fn write(&mut self, result: &AttemptResult) -> Result<()> {
        let path = self.path_for(result);
        self.ensure_open(&path).await?;

        let line = match self.format {
            OutputFormat::Txt => format_txt(result),
            OutputFormat::Json => format_json(result),
            OutputFormat::Csv => format_csv(result),
        };

        let mut handles = self.handles.lock().await;
        if let Some(file) = handles.get_mut(&path) {
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        let mut handles = self.handles.lock().await;
        for file in handles.values_mut() {
            file.flush().await?;
        }
        Ok(())
    }
}

/// Forwards every result to `tracing` as a structured event; always present
/// alongside the export sink (spec §4.7 step 4).
pub struct LoggerSink;

#[async_trait]
impl ResultSink for LoggerSink {
    async fn write(&mut self, result: &AttemptResult) -> Result<()> {
        tracing::debug!(
            task_id = result.task_id,
            config = %result.config_name,
            status = ?result.status,
            "result logged"
        );
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::SystemTime;

    fn sample_result(status: AttemptStatus) -> AttemptResult {
        AttemptResult {
            task_id: 1,
            correlation_id: "abc123".to_string(),
            combo: crate::combo::Combo::parse("alice:hunter2").unwrap(),
            config_name: Arc::from("site"),
            status,
            http_status: Some(200),
            latency_ms: 42.0,
            error_kind: None,
            proxy_used: None,
            captured_variables: HashMap::new(),
            timestamp: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn file_sink_partitions_by_config_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path(), OutputFormat::Txt);
        sink.write(&sample_result(AttemptStatus::Success)).await.unwrap();
        sink.flush().await.unwrap();

        let expected = dir.path().join("site").join("valid.txt");
        assert!(expected.exists());
    }

    #[tokio::test]
    async fn csv_sink_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path(), OutputFormat::Csv);
        sink.write(&sample_result(AttemptStatus::Fail)).await.unwrap();
        sink.write(&sample_result(AttemptStatus::Fail)).await.unwrap();
        sink.flush().await.unwrap();

        let path = dir.path().join("site").join("invalid.csv");
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.matches(CSV_HEADER).count(), 1);
    }
}
