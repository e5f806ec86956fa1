use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::extract::{ExtractionPipeline, NormalizedRecord};
use crate::identity::{IdentityProfile, IdentityProvider};
use crate::output::uniq_name;
use crate::overlay::OverlayDismisser;
use crate::pacing::Pacer;
use crate::reveal::RevealController;
use crate::traits::{AttemptRunner, DialogPolicy, DocumentDriver, SessionFactory};

use super::types::AttemptResult;

/// 1回分の取得試行
///
/// アイデンティティ選択 → セッション作成 → 遷移 → reveal → 抽出 →
/// スクリーンショット。セッションはどの経路でも必ず閉じる。
pub struct AttemptOrchestrator<F: SessionFactory> {
    config: Arc<ScraperConfig>,
    factory: F,
    identities: Arc<dyn IdentityProvider>,
    pacer: Arc<dyn Pacer>,
}

impl<F: SessionFactory> AttemptOrchestrator<F> {
    pub fn new(
        config: Arc<ScraperConfig>,
        factory: F,
        identities: Arc<dyn IdentityProvider>,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Self {
            config,
            factory,
            identities,
            pacer,
        }
    }

    async fn drive(
        &self,
        session: &F::Session,
        identity: &IdentityProfile,
        url: &str,
        attempt_number: u32,
    ) -> Result<Vec<NormalizedRecord>, ScraperError> {
        let config = &*self.config;
        let pacer = &*self.pacer;

        session.on_dialog(DialogPolicy::Dismiss).await?;
        for script in &config.browser.init_scripts {
            session.add_init_script(script).await?;
        }
        if !identity.headers.is_empty() {
            session.set_headers(&identity.headers).await?;
        }

        info!("Navigating to {}", url);
        session
            .navigate(url, config.browser.page_load_timeout)
            .await?;
        pacer.pause(config.attempt.initial_settle).await;
        OverlayDismisser::new(session, pacer, &config.overlay)
            .dismiss_blocking_overlays()
            .await;

        RevealController::new(
            session,
            pacer,
            &config.reveal,
            &config.selectors.container,
            &config.overlay,
        )
        .reveal_all()
        .await;

        let records = ExtractionPipeline::new(
            session,
            pacer,
            &config.selectors,
            config.attempt.final_settle,
            config.attempt.record_timeout,
        )
        .run(url)
        .await?;
        info!("Extracted {} records", records.len());

        if config.attempt.screenshot {
            self.capture_screenshot(session, attempt_number).await;
        }

        Ok(records)
    }

    /// 失敗しても試行は失敗扱いにしない
    async fn capture_screenshot(&self, session: &F::Session, attempt_number: u32) {
        let dir = &self.config.attempt.screenshot_dir;
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Failed to create screenshot directory {:?}: {}", dir, e);
            return;
        }

        let name = uniq_name(
            &format!("{}_attempt{}", self.config.output.prefix, attempt_number),
            "png",
        );
        let path = dir.join(name);
        match session.screenshot(&path, true).await {
            Ok(()) => info!("Saved screenshot: {:?}", path),
            Err(e) => warn!("Screenshot failed: {}", e),
        }
    }
}

#[async_trait]
impl<F: SessionFactory> AttemptRunner for AttemptOrchestrator<F> {
    async fn run_attempt(
        &self,
        url: &str,
        attempt_number: u32,
        cancel: &CancellationToken,
    ) -> Result<AttemptResult, ScraperError> {
        let identity = self.identities.select(attempt_number);
        info!("Attempt {} | UA: {}", attempt_number, identity.user_agent);

        // 起動途中で中断するとプロセスやプロファイルが残るため、open は最後まで待つ
        let session = match self.factory.open(&identity).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Attempt {} could not open a session: {}", attempt_number, e);
                return Ok(AttemptResult::failed(attempt_number, &e));
            }
        };
        if cancel.is_cancelled() {
            if let Err(e) = session.close().await {
                warn!("Failed to close session: {}", e);
            }
            warn!("Attempt {} cancelled while opening a session", attempt_number);
            return Err(ScraperError::Cancelled);
        }

        let outcome = tokio::select! {
            result = self.drive(&session, &identity, url, attempt_number) => Some(result),
            _ = cancel.cancelled() => None,
        };

        // 成功・エラー・キャンセルのいずれでも必ず閉じる
        if let Err(e) = session.close().await {
            warn!("Failed to close session: {}", e);
        }

        match outcome {
            None => {
                warn!("Attempt {} cancelled", attempt_number);
                Err(ScraperError::Cancelled)
            }
            Some(Ok(records)) => Ok(AttemptResult::from_records(attempt_number, records)),
            Some(Err(e)) => {
                warn!("Attempt {} error: {}", attempt_number, e);
                Ok(AttemptResult::failed(attempt_number, &e))
            }
        }
    }
}
