use tracing::{debug, info, warn};

use crate::config::{OverlayConfig, RevealConfig};
use crate::overlay::OverlayDismisser;
use crate::pacing::Pacer;
use crate::traits::DocumentDriver;

use super::growth::GrowthMonitor;
use super::scripts;
use super::types::{RevealExit, RevealState};

/// スイープの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub exit: RevealExit,
    pub rounds: u32,
}

/// 段階的スクロールが停滞した後の、末尾ジャンプによる最終確認
///
/// 件数だけでなくページ高さの安定も確認してから「停滞ラウンド」と数える。
/// 画像読み込み中などは件数が横ばいでも高さが伸び続けるため。
pub struct FallbackSweepController<'a, D: DocumentDriver> {
    driver: &'a D,
    pacer: &'a dyn Pacer,
    config: &'a RevealConfig,
    monitor: GrowthMonitor<'a, D>,
    overlays: OverlayDismisser<'a, D>,
}

impl<'a, D: DocumentDriver> FallbackSweepController<'a, D> {
    pub fn new(
        driver: &'a D,
        pacer: &'a dyn Pacer,
        config: &'a RevealConfig,
        container: &'a str,
        overlay: &'a OverlayConfig,
    ) -> Self {
        Self {
            driver,
            pacer,
            config,
            monitor: GrowthMonitor::new(driver, pacer, container),
            overlays: OverlayDismisser::new(driver, pacer, overlay),
        }
    }

    pub async fn run(&self, state: &mut RevealState, history: &mut Vec<usize>) -> SweepOutcome {
        info!("Fallback: persistent scroll-to-bottom (until true end)");
        state.enter_sweep();

        let config = self.config;
        let mut stable_rounds = 0;
        let mut round = 0;

        loop {
            if round >= config.sweep_rounds {
                info!("Reached maximum sweep rounds ({}), stopping", config.sweep_rounds);
                return SweepOutcome {
                    exit: RevealExit::RoundCeiling,
                    rounds: round,
                };
            }
            round += 1;

            self.overlays.dismiss_blocking_overlays().await;
            if let Err(e) = self.driver.evaluate(scripts::SCROLL_TO_END).await {
                warn!("Bottom scroll failed: {}", e);
            }
            info!("Bottom scroll (round {})", round);

            match self.driver.wait_network_idle(config.sweep_idle_timeout).await {
                Ok(true) => {}
                Ok(false) => debug!("Network still busy after bottom scroll"),
                Err(e) => debug!("Network idle wait failed: {}", e),
            }
            self.pacer.pause(config.sweep_settle).await;

            let count = self.monitor.count_realized().await;
            let grew = state.observe(count);
            history.push(state.realized_count);
            info!("Records loaded: {}", count);

            if state.realized_count >= config.max_records {
                info!("Reached max_records safety cap, stopping");
                return SweepOutcome {
                    exit: RevealExit::SafetyCap,
                    rounds: round,
                };
            }

            if grew {
                stable_rounds = 0;
            } else if self.height_is_stable().await {
                stable_rounds += 1;
                info!(
                    "No growth & height stable ({}/{})",
                    stable_rounds, config.sweep_stable_repeats
                );
                if stable_rounds >= config.sweep_stable_repeats {
                    state.stagnant_cycles = stable_rounds;
                    info!("Detected end of record list, stopping");
                    return SweepOutcome {
                        exit: RevealExit::EndOfContent,
                        rounds: round,
                    };
                }
            } else {
                stable_rounds = 0;
            }
            state.stagnant_cycles = stable_rounds;

            state.refresh_elapsed();
            if state.elapsed >= config.max_duration {
                info!("Time ceiling reached during sweep after {:?}", state.elapsed);
                return SweepOutcome {
                    exit: RevealExit::TimeCeiling,
                    rounds: round,
                };
            }
        }
    }

    /// 少し間をあけた2回の計測でスクロール高さが変わらないか
    async fn height_is_stable(&self) -> bool {
        let first = self.scroll_height().await;
        self.pacer.pause(self.config.stability_check_gap).await;
        let second = self.scroll_height().await;

        match (first, second) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    async fn scroll_height(&self) -> Option<i64> {
        match self.driver.evaluate(scripts::SCROLL_HEIGHT).await {
            Ok(value) => value.as_f64().map(|h| h.round() as i64),
            Err(e) => {
                debug!("scrollHeight read failed: {}", e);
                None
            }
        }
    }
}
