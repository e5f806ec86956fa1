use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::RetryPolicy;
use crate::error::ScraperError;
use crate::pacing::Pacer;
use crate::traits::{AttemptRunner, RecordSink};

use super::types::{RunMetadata, RunSummary};

/// 試行を指数バックオフ付きで繰り返す
///
/// 試行間で引き継ぐのはバックオフ時間だけ。セッションや reveal 状態は毎回作り直す。
pub struct RetryOrchestrator<A: AttemptRunner, S: RecordSink> {
    runner: A,
    sink: S,
    pacer: Arc<dyn Pacer>,
}

impl<A: AttemptRunner, S: RecordSink> RetryOrchestrator<A, S> {
    pub fn new(runner: A, sink: S, pacer: Arc<dyn Pacer>) -> Self {
        Self {
            runner,
            sink,
            pacer,
        }
    }

    pub async fn run(
        &self,
        url: &str,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, ScraperError> {
        for attempt in 1..=policy.max_attempts {
            if cancel.is_cancelled() {
                return Err(ScraperError::Cancelled);
            }

            let result = self.runner.run_attempt(url, attempt, cancel).await?;

            if result.succeeded {
                let metadata = RunMetadata::new(url, attempt);
                let outputs = self.sink.write(&result.records, &metadata).await?;
                info!(
                    "Attempt {} succeeded with {} records",
                    attempt,
                    result.records.len()
                );
                return Ok(RunSummary {
                    url: url.to_string(),
                    succeeded: true,
                    attempt_count: attempt,
                    records: result.records,
                    outputs,
                });
            }

            if let Some(failure) = &result.failure {
                if !failure.retryable {
                    warn!(
                        "Attempt {} failed with a non-retryable error, giving up: {}",
                        attempt, failure.message
                    );
                    return Ok(RunSummary::failed(url, attempt));
                }
            }

            if attempt < policy.max_attempts {
                let jitter = self.pacer.uniform(0.0, policy.max_jitter.as_secs_f64());
                let delay = policy.delay_for(attempt, jitter);
                info!(
                    "No data or failed; rotating identity & backing off {:.1}s...",
                    delay.as_secs_f64()
                );

                tokio::select! {
                    _ = self.pacer.sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(ScraperError::Cancelled),
                }
            }
        }

        warn!("All {} attempts produced no records", policy.max_attempts);
        Ok(RunSummary::failed(url, policy.max_attempts))
    }
}
