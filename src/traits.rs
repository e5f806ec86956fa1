use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ScraperError;
use crate::extract::NormalizedRecord;
use crate::identity::IdentityProfile;
use crate::orchestrator::{AttemptResult, RunMetadata};

/// ネイティブダイアログ（alert / confirm / prompt）の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogPolicy {
    Dismiss,
    Accept,
}

/// 1つのブラウザセッション（タブ）に対する操作
///
/// 同一セッションへの操作は常に逐次実行される前提。実装は並行呼び出しに備える必要はない。
#[async_trait]
pub trait DocumentDriver: Send + Sync {
    /// 同じDOMノードを指すハンドルは等しい
    type Element: Clone + PartialEq + Send + Sync + 'static;

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), ScraperError>;

    /// ページ内でスクリプトを評価。`undefined` は `Value::Null`
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, ScraperError>;

    /// `scope` が `None` ならドキュメント全体から、文書順で返す
    async fn query_all(
        &self,
        scope: Option<&Self::Element>,
        selector: &str,
    ) -> Result<Vec<Self::Element>, ScraperError>;

    async fn read_text(&self, element: &Self::Element) -> Result<String, ScraperError>;

    async fn read_attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, ScraperError>;

    /// DOMプロパティ（解決済み `href` など）を文字列として読む
    async fn read_property(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, ScraperError>;

    async fn is_visible(&self, element: &Self::Element) -> Result<bool, ScraperError>;

    async fn click(&self, element: &Self::Element, timeout: Duration) -> Result<(), ScraperError>;

    async fn hover(&self, element: &Self::Element) -> Result<(), ScraperError>;

    async fn scroll_into_view(&self, element: &Self::Element) -> Result<(), ScraperError>;

    async fn move_pointer(&self, x: f64, y: f64) -> Result<(), ScraperError>;

    /// ネットワークが静かになるまで待つ。タイムアウト時は `Ok(false)`
    async fn wait_network_idle(&self, timeout: Duration) -> Result<bool, ScraperError>;

    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<(), ScraperError>;

    async fn set_headers(&self, headers: &HashMap<String, String>) -> Result<(), ScraperError>;

    async fn on_dialog(&self, policy: DialogPolicy) -> Result<(), ScraperError>;

    /// 以降に読み込まれるすべてのドキュメントで先に評価されるスクリプトを登録
    async fn add_init_script(&self, script: &str) -> Result<(), ScraperError>;

    /// セッションを破棄。複数回呼ばれても安全であること
    async fn close(&self) -> Result<(), ScraperError>;
}

/// 試行ごとに新しいセッションを開く
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: DocumentDriver + 'static;

    async fn open(&self, identity: &IdentityProfile) -> Result<Self::Session, ScraperError>;
}

/// 1回分の取得試行。`RetryOrchestrator` から呼ばれる
#[async_trait]
pub trait AttemptRunner: Send + Sync {
    async fn run_attempt(
        &self,
        url: &str,
        attempt_number: u32,
        cancel: &CancellationToken,
    ) -> Result<AttemptResult, ScraperError>;
}

/// 取得結果の永続化先
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn write(
        &self,
        records: &[NormalizedRecord],
        metadata: &RunMetadata,
    ) -> Result<Vec<PathBuf>, ScraperError>;
}
