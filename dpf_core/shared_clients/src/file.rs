use crate::{apply_limit, AdapterError, ConnectionInfo, SourceAdapter};
use async_trait::async_trait;
use catalog::{DataSource, DataSourceConfig, FileFormat};
use common::types::Record;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Local files holding either a JSON array of objects or JSON lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileAdapter;

fn file_config(source: &DataSource) -> Result<(PathBuf, FileFormat), AdapterError> {
    match &source.config {
        DataSourceConfig::File { path, format } => Ok((PathBuf::from(path), *format)),
        other => Err(AdapterError::unsupported(format!(
            "file adapter cannot serve {} source '{}'",
            other.kind(),
            source.id
        ))),
    }
}

fn into_record(value: Value, path: &Path, position: usize) -> Result<Record, AdapterError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(AdapterError::extraction(format!(
            "{}: entry {position} is not an object (found {})",
            path.display(),
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn parse(raw: &str, format: FileFormat, path: &Path) -> Result<Vec<Record>, AdapterError> {
    match format {
        FileFormat::Json => {
            if raw.trim().is_empty() {
                return Ok(Vec::new());
            }
            let value: Value = serde_json::from_str(raw).map_err(|e| {
                AdapterError::extraction(format!("{}: invalid JSON: {e}", path.display()))
            })?;
            match value {
                Value::Array(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| into_record(v, path, i))
                    .collect(),
                other => Err(AdapterError::extraction(format!(
                    "{}: expected an array of objects, found {}",
                    path.display(),
                    type_name(&other)
                ))),
            }
        }
        FileFormat::JsonLines => raw
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                let value: Value = serde_json::from_str(line).map_err(|e| {
                    AdapterError::extraction(format!(
                        "{}:{}: invalid JSON: {e}",
                        path.display(),
                        i + 1
                    ))
                })?;
                into_record(value, path, i + 1)
            })
            .collect(),
    }
}

#[async_trait]
impl SourceAdapter for FileAdapter {
    async fn probe(&self, source: &DataSource) -> Result<ConnectionInfo, AdapterError> {
        let (path, _) = file_config(source)?;
        let meta = tokio::fs::metadata(&path).await.map_err(|e| {
            AdapterError::connection(format!("cannot access {}: {e}", path.display()))
        })?;
        if !meta.is_file() {
            return Err(AdapterError::connection(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        Ok(ConnectionInfo::for_source(source).with_detail(format!("{} bytes", meta.len())))
    }

    async fn extract(&self, source: &DataSource) -> Result<Vec<Record>, AdapterError> {
        let (path, format) = file_config(source)?;
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            AdapterError::extraction(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(apply_limit(source, parse(&raw, format, &path)?))
    }

    async fn load(&self, destination: &DataSource, records: &[Record]) -> Result<usize, AdapterError> {
        let (path, format) = file_config(destination)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        match format {
            FileFormat::JsonLines => {
                let mut buf = String::new();
                for record in records {
                    let line = serde_json::to_string(record)
                        .map_err(|e| AdapterError::load(format!("cannot encode record: {e}")))?;
                    buf.push_str(&line);
                    buf.push('\n');
                }
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .await?;
                file.write_all(buf.as_bytes()).await?;
                file.flush().await?;
            }
            FileFormat::Json => {
                // arrays can't be appended to in place
                let mut existing = match tokio::fs::read_to_string(&path).await {
                    Ok(raw) => parse(&raw, format, &path)
                        .map_err(|e| AdapterError::load(e.message().to_string()))?,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
                    Err(e) => return Err(e.into()),
                };
                existing.extend(records.iter().cloned());
                let body = serde_json::to_vec_pretty(&existing)
                    .map_err(|e| AdapterError::load(format!("cannot encode records: {e}")))?;
                tokio::fs::write(&path, body).await?;
            }
        }
        log::debug!("wrote {} records to {}", records.len(), path.display());
        Ok(records.len())
    }
}
