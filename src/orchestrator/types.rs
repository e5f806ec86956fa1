//! 試行・実行結果の型定義

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::error::ScraperError;
use crate::extract::NormalizedRecord;

/// 試行が失敗した理由の分類
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub message: String,
    /// 別のアイデンティティで再試行する価値があるか
    pub retryable: bool,
}

/// 1回の試行の結果。試行をまたいで保持しない
#[derive(Debug, Clone)]
pub struct AttemptResult {
    pub attempt_number: u32,
    pub records: Vec<NormalizedRecord>,
    pub succeeded: bool,
    pub failure: Option<AttemptFailure>,
}

impl AttemptResult {
    pub fn from_records(attempt_number: u32, records: Vec<NormalizedRecord>) -> Self {
        Self {
            attempt_number,
            succeeded: !records.is_empty(),
            records,
            failure: None,
        }
    }

    pub fn failed(attempt_number: u32, error: &ScraperError) -> Self {
        Self {
            attempt_number,
            records: Vec::new(),
            succeeded: false,
            failure: Some(AttemptFailure {
                message: error.to_string(),
                retryable: error.is_retryable(),
            }),
        }
    }
}

/// 出力ファイルに付与するメタデータ
#[derive(Debug, Clone)]
pub struct RunMetadata {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub attempt_number: u32,
}

impl RunMetadata {
    pub fn new(url: impl Into<String>, attempt_number: u32) -> Self {
        Self {
            url: url.into(),
            timestamp: Utc::now(),
            attempt_number,
        }
    }
}

/// URL 1件分の最終結果
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub url: String,
    pub succeeded: bool,
    pub attempt_count: u32,
    pub records: Vec<NormalizedRecord>,
    pub outputs: Vec<PathBuf>,
}

impl RunSummary {
    pub fn failed(url: impl Into<String>, attempt_count: u32) -> Self {
        Self {
            url: url.into(),
            succeeded: false,
            attempt_count,
            records: Vec::new(),
            outputs: Vec::new(),
        }
    }
}
