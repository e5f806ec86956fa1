//! 商品一覧ページのスクレイパーライブラリ
//!
//! - 無限スクロールで遅延読み込みされる商品カードを人間らしい操作で出し切る
//! - カードごとにセレクタのフォールバックチェーンで項目を抽出し、型付きレコードに正規化
//! - 試行ごとにアイデンティティ（UA・ビューポート・ヘッダー）を変えて指数バックオフで再試行
//! - JSON / NDJSON / CSV で保存
//!
//! # 使用例
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use listing_scraper::browser::ChromiumLauncher;
//! use listing_scraper::{ScrapeRequest, ScraperConfig, ScraperService};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Arc::new(ScraperConfig::new().with_prefix("ajio_backpacks"));
//!     let launcher = ChromiumLauncher::new(config.browser.clone());
//!     let mut service = ScraperService::new(config, launcher);
//!
//!     let request = ScrapeRequest::new("https://www.ajio.com/men-backpacks/c/830201001");
//!     let summary = service.call(request).await.unwrap();
//!     println!("records: {}, files: {:?}", summary.records.len(), summary.outputs);
//! }
//! ```

pub mod browser;
pub mod config;
pub mod error;
pub mod extract;
pub mod identity;
pub mod orchestrator;
pub mod output;
pub mod overlay;
pub mod pacing;
pub mod reveal;
pub mod selector;
pub mod service;
pub mod traits;

// 主要な型をリエクスポート
pub use config::{RetryPolicy, ScraperConfig, WaitRange};
pub use error::ScraperError;
pub use extract::{NormalizedRecord, RawRecord};
pub use identity::{IdentityProfile, IdentityProvider, RotatingIdentityPool};
pub use orchestrator::{AttemptOrchestrator, AttemptResult, RetryOrchestrator, RunSummary};
pub use output::FileSink;
pub use pacing::{HumanPacer, InstantPacer, Pacer};
pub use reveal::{RevealController, RevealReport};
pub use service::{ScrapeRequest, ScraperService};
pub use traits::{AttemptRunner, DocumentDriver, RecordSink, SessionFactory};
