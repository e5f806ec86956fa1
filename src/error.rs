use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("ドライバ操作エラー: {0}")]
    Driver(String),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("出力エラー: {0}")]
    Output(String),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("JSONエラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSVエラー: {0}")]
    Csv(#[from] csv::Error),

    #[error("キャンセルされました")]
    Cancelled,
}

impl ScraperError {
    /// 別のアイデンティティで再試行する価値があるか
    ///
    /// 設定ミスや出力先の問題はリトライしても解決しないため `false`。
    pub fn is_retryable(&self) -> bool {
        match self {
            ScraperError::BrowserInit(_)
            | ScraperError::Navigation(_)
            | ScraperError::Timeout(_)
            | ScraperError::JavaScript(_)
            | ScraperError::Driver(_) => true,
            ScraperError::Config(_)
            | ScraperError::Output(_)
            | ScraperError::FileIO(_)
            | ScraperError::Json(_)
            | ScraperError::Csv(_)
            | ScraperError::Cancelled => false,
        }
    }
}
