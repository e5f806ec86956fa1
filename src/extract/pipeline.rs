use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{SelectorConfig, WaitRange};
use crate::error::ScraperError;
use crate::pacing::Pacer;
use crate::traits::DocumentDriver;

use super::fields::FieldExtractor;
use super::normalize::Normalizer;
use super::types::NormalizedRecord;

/// 抽出パスの集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub containers: usize,
    pub emitted: usize,
    /// タイムアウトで読めなかったカード
    pub missed: usize,
    /// タイトルが空で捨てたカード
    pub untitled: usize,
    pub field_misses: u32,
}

/// 読み込み済みの全カードを文書順に抽出・正規化する
pub struct ExtractionPipeline<'a, D: DocumentDriver> {
    driver: &'a D,
    pacer: &'a dyn Pacer,
    selectors: &'a SelectorConfig,
    settle: WaitRange,
    record_timeout: Duration,
}

impl<'a, D: DocumentDriver> ExtractionPipeline<'a, D> {
    pub fn new(
        driver: &'a D,
        pacer: &'a dyn Pacer,
        selectors: &'a SelectorConfig,
        settle: WaitRange,
        record_timeout: Duration,
    ) -> Self {
        Self {
            driver,
            pacer,
            selectors,
            settle,
            record_timeout,
        }
    }

    /// カード列挙そのものに失敗した場合のみエラー。カード単位の失敗はスキップ
    pub async fn run(&self, base_url: &str) -> Result<Vec<NormalizedRecord>, ScraperError> {
        self.run_with_stats(base_url).await.map(|(records, _)| records)
    }

    pub async fn run_with_stats(
        &self,
        base_url: &str,
    ) -> Result<(Vec<NormalizedRecord>, ExtractionStats), ScraperError> {
        info!("Extracting records (final short wait for lazy images)...");
        self.pacer.pause(self.settle).await;

        let containers = self
            .driver
            .query_all(None, &self.selectors.container)
            .await?;
        info!("Found {} record containers", containers.len());

        let extractor = FieldExtractor::new(self.driver, self.selectors);
        let normalizer = Normalizer::new(base_url);
        let mut records = Vec::with_capacity(containers.len());
        let mut stats = ExtractionStats {
            containers: containers.len(),
            ..Default::default()
        };

        for (index, container) in containers.iter().enumerate() {
            let raw = match tokio::time::timeout(self.record_timeout, extractor.extract(container))
                .await
            {
                Ok(raw) => raw,
                Err(_) => {
                    warn!(
                        "Record {} extraction timed out after {:?}, skipping",
                        index + 1,
                        self.record_timeout
                    );
                    stats.missed += 1;
                    continue;
                }
            };
            stats.field_misses += raw.field_misses;

            match normalizer.normalize(&raw) {
                Some(record) => records.push(record),
                None => stats.untitled += 1,
            }

            if (index + 1) % 50 == 0 {
                debug!("Processed {} records...", index + 1);
            }
        }

        stats.emitted = records.len();
        info!(
            "Records extracted: {} (missed: {}, untitled: {}, field misses: {})",
            stats.emitted, stats.missed, stats.untitled, stats.field_misses
        );
        Ok((records, stats))
    }
}
