//! 取得結果のファイル出力（JSON / NDJSON / CSV）

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde::Serialize;
use tracing::info;

use crate::config::{OutputConfig, OutputFormat};
use crate::error::ScraperError;
use crate::extract::{NormalizedRecord, RECORD_COLUMNS};
use crate::orchestrator::RunMetadata;
use crate::traits::RecordSink;

const MAX_FILENAME_CHARS: usize = 100;

fn reserved_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("static regex"))
}

fn whitespace_runs() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// ファイル名に使えない文字と空白の連続を `_` に置き換える
///
/// 前後の `.` と `_` は落とし、最大100文字。空になったら `unnamed`。
pub fn safe_filename(name: &str) -> String {
    let replaced = reserved_chars().replace_all(name, "_");
    let replaced = whitespace_runs().replace_all(&replaced, "_");
    let trimmed: String = replaced
        .trim_matches(|c: char| c == '.' || c == '_')
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect();
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed
    }
}

/// `{prefix}_{unix秒}_{6文字の乱数}.{ext}`
pub fn uniq_name(prefix: &str, ext: &str) -> String {
    let salt: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!(
        "{}_{}_{}.{}",
        safe_filename(prefix),
        Utc::now().timestamp(),
        salt,
        ext
    )
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    url: &'a str,
    timestamp: String,
    total_products: usize,
    products: &'a [NormalizedRecord],
}

/// `OutputConfig` に従って出力ディレクトリへ書き出す
#[derive(Debug, Clone)]
pub struct FileSink {
    config: OutputConfig,
}

impl FileSink {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    fn write_json(
        &self,
        path: &Path,
        records: &[NormalizedRecord],
        metadata: &RunMetadata,
    ) -> Result<(), ScraperError> {
        let document = JsonDocument {
            url: &metadata.url,
            timestamp: metadata.timestamp.to_rfc3339(),
            total_products: records.len(),
            products: records,
        };
        let json = serde_json::to_string_pretty(&document)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn write_ndjson(&self, path: &Path, records: &[NormalizedRecord]) -> Result<(), ScraperError> {
        let mut body = String::new();
        for record in records {
            body.push_str(&serde_json::to_string(record)?);
            body.push('\n');
        }
        std::fs::write(path, body)?;
        Ok(())
    }

    fn write_csv(&self, path: &Path, records: &[NormalizedRecord]) -> Result<(), ScraperError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(RECORD_COLUMNS)?;
        for record in records {
            writer.write_record(csv_row(record))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// 列順は `RECORD_COLUMNS` と同じ。欠損値は空文字
fn csv_row(record: &NormalizedRecord) -> [String; 8] {
    fn opt<T: ToString>(value: &Option<T>) -> String {
        value.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    [
        record.brand.clone(),
        record.title.clone(),
        opt(&record.original_price),
        opt(&record.discounted_price),
        opt(&record.discount_percent),
        opt(&record.detail_link),
        opt(&record.image_url),
        record.description.clone(),
    ]
}

#[async_trait]
impl RecordSink for FileSink {
    async fn write(
        &self,
        records: &[NormalizedRecord],
        metadata: &RunMetadata,
    ) -> Result<Vec<PathBuf>, ScraperError> {
        std::fs::create_dir_all(&self.config.output_dir).map_err(|e| {
            ScraperError::Output(format!("{:?}: {}", self.config.output_dir, e))
        })?;

        let mut written = Vec::new();
        for format in &self.config.formats {
            let ext = match format {
                OutputFormat::Json => "json",
                OutputFormat::Ndjson => "ndjson",
                OutputFormat::Csv => "csv",
            };
            let path = self
                .config
                .output_dir
                .join(uniq_name(&self.config.prefix, ext));

            match format {
                OutputFormat::Json => self.write_json(&path, records, metadata)?,
                OutputFormat::Ndjson => self.write_ndjson(&path, records)?,
                OutputFormat::Csv => self.write_csv(&path, records)?,
            }
            info!("Saved {} records -> {:?}", records.len(), path);
            written.push(path);
        }

        Ok(written)
    }
}
