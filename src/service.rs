use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::info;

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::identity::{IdentityProvider, RotatingIdentityPool};
use crate::orchestrator::{AttemptOrchestrator, RetryOrchestrator, RunSummary};
use crate::output::FileSink;
use crate::pacing::{HumanPacer, Pacer};
use crate::traits::SessionFactory;

/// スクレイピングリクエスト
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub url: String,
    pub prefix: Option<String>,
    pub max_attempts: Option<u32>,
    pub cancel: CancellationToken,
}

impl ScrapeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            prefix: None,
            max_attempts: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// tower::Serviceを実装したスクレイパーサービス
///
/// 1リクエスト = 1 URL。試行ごとに `F` から新しいセッションを開く。
#[derive(Clone)]
pub struct ScraperService<F> {
    config: Arc<ScraperConfig>,
    factory: F,
    identities: Arc<dyn IdentityProvider>,
    pacer: Arc<dyn Pacer>,
}

impl<F: SessionFactory + Clone + 'static> ScraperService<F> {
    pub fn new(config: Arc<ScraperConfig>, factory: F) -> Self {
        let identities = Arc::new(RotatingIdentityPool::new(config.identity.clone()));
        Self {
            config,
            factory,
            identities,
            pacer: Arc::new(HumanPacer),
        }
    }

    pub fn with_identities(mut self, identities: Arc<dyn IdentityProvider>) -> Self {
        self.identities = identities;
        self
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }
}

impl<F: SessionFactory + Clone + 'static> Service<ScrapeRequest> for ScraperService<F> {
    type Response = RunSummary;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScrapeRequest) -> Self::Future {
        info!("スクレイピングリクエスト受信: url={}", req.url);

        let config = self.config.clone();
        let factory = self.factory.clone();
        let identities = self.identities.clone();
        let pacer = self.pacer.clone();

        Box::pin(async move {
            url::Url::parse(&req.url)
                .map_err(|e| ScraperError::Config(format!("{}: {}", req.url, e)))?;

            // リクエスト単位の上書きはスクリーンショット名にも反映させる
            let config = match (&req.prefix, req.max_attempts) {
                (None, None) => config,
                (prefix, max_attempts) => {
                    let mut owned = (*config).clone();
                    if let Some(prefix) = prefix {
                        owned.output.prefix = prefix.clone();
                    }
                    if let Some(max_attempts) = max_attempts {
                        owned.retry.max_attempts = max_attempts.max(1);
                    }
                    Arc::new(owned)
                }
            };
            let policy = config.retry.clone();
            let sink = FileSink::new(config.output.clone());

            let attempts = AttemptOrchestrator::new(config, factory, identities, pacer.clone());
            let summary = RetryOrchestrator::new(attempts, sink, pacer)
                .run(&req.url, &policy, &req.cancel)
                .await?;

            info!(
                "スクレイピング完了: url={}, succeeded={}, records={}, attempts={}",
                summary.url,
                summary.succeeded,
                summary.records.len(),
                summary.attempt_count
            );
            Ok(summary)
        })
    }
}
