//! reveal フェーズ：無限スクロールの一覧をすべて読み込ませる
//!
//! 段階的スクロール（`progressive`）で件数の伸びを監視し、停滞したら
//! 末尾ジャンプのスイープ（`sweep`）に切り替える。安全上限・上限時間に
//! 達した場合はスイープを行わずに終了する。

mod growth;
mod progressive;
pub mod scripts;
mod sweep;
mod types;

use tracing::info;

use crate::config::{OverlayConfig, RevealConfig};
use crate::pacing::Pacer;
use crate::traits::DocumentDriver;

pub use growth::GrowthMonitor;
pub use progressive::{ProgressiveOutcome, ProgressiveRevealController};
pub use sweep::{FallbackSweepController, SweepOutcome};
pub use types::{RevealExit, RevealPhase, RevealReport, RevealState, RevealStrategy};

/// 段階的スクロール → （停滞時）スイープ をまとめて実行する
pub struct RevealController<'a, D: DocumentDriver> {
    driver: &'a D,
    pacer: &'a dyn Pacer,
    config: &'a RevealConfig,
    container: &'a str,
    overlay: &'a OverlayConfig,
}

impl<'a, D: DocumentDriver> RevealController<'a, D> {
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
            container,
            overlay,
        }
    }

    pub async fn reveal_all(&self) -> RevealReport {
        let mut state = RevealState::new();
        let mut history = Vec::new();

        let baseline = GrowthMonitor::new(self.driver, self.pacer, self.container)
            .count_realized()
            .await;
        state.observe(baseline);
        info!("Initial record count: {}", baseline);

        let progressive = ProgressiveRevealController::new(
            self.driver,
            self.pacer,
            self.config,
            self.container,
            self.overlay,
        )
        .run(&mut state, &mut history)
        .await;

        let (exit, sweep_rounds) = match progressive.phase {
            RevealPhase::LimitReached(exit) => (exit, 0),
            _ => {
                let sweep = FallbackSweepController::new(
                    self.driver,
                    self.pacer,
                    self.config,
                    self.container,
                    self.overlay,
                )
                .run(&mut state, &mut history)
                .await;
                (sweep.exit, sweep.rounds)
            }
        };

        state.refresh_elapsed();
        info!(
            "Reveal phase done: {} records, exit={:?}, {} cycles + {} sweep rounds in {:?}",
            state.realized_count, exit, progressive.cycles, sweep_rounds, state.elapsed
        );

        RevealReport {
            state,
            exit,
            progressive_cycles: progressive.cycles,
            sweep_rounds,
            count_history: history,
        }
    }
}
