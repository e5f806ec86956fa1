use tracing::{debug, info, warn};

use crate::config::{OverlayConfig, RevealConfig};
use crate::overlay::OverlayDismisser;
use crate::pacing::Pacer;
use crate::traits::DocumentDriver;

use super::growth::GrowthMonitor;
use super::scripts;
use super::types::{RevealExit, RevealPhase, RevealState};

/// 段階的スクロールの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressiveOutcome {
    /// `Stalled` または `LimitReached`
    pub phase: RevealPhase,
    pub cycles: u32,
}

/// 人間らしいスクロールを繰り返し、件数の伸びが止まるまで読み込ませる
pub struct ProgressiveRevealController<'a, D: DocumentDriver> {
    driver: &'a D,
    pacer: &'a dyn Pacer,
    config: &'a RevealConfig,
    container: &'a str,
    monitor: GrowthMonitor<'a, D>,
    overlays: OverlayDismisser<'a, D>,
}

impl<'a, D: DocumentDriver> ProgressiveRevealController<'a, D> {
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
            monitor: GrowthMonitor::new(driver, pacer, container),
            overlays: OverlayDismisser::new(driver, pacer, overlay),
        }
    }

    pub async fn run(&self, state: &mut RevealState, history: &mut Vec<usize>) -> ProgressiveOutcome {
        info!("Human-like progressive scrolling...");
        let mut phase = RevealPhase::Scrolling;
        let mut cycles = 0;

        while phase == RevealPhase::Scrolling {
            cycles += 1;
            self.overlays.dismiss_blocking_overlays().await;
            self.human_scroll_cycle().await;

            match self
                .driver
                .wait_network_idle(self.config.progressive_idle_timeout)
                .await
            {
                Ok(true) => {}
                Ok(false) => debug!("Network still busy, continuing"),
                Err(e) => debug!("Network idle wait failed: {}", e),
            }

            // ビューポート基準の遅延ローダーを発火させる
            self.scroll_to_last_container().await;

            let previous = state.realized_count;
            let count = self
                .monitor
                .await_growth(previous, self.config.growth_window)
                .await;
            phase = next_phase(self.config, state, count);
            history.push(state.realized_count);
            info!("Loaded {} records so far...", count);

            match phase {
                RevealPhase::Stalled => {
                    info!("Progressive scroll stalled, switching to fallback sweep")
                }
                RevealPhase::LimitReached(RevealExit::SafetyCap) => {
                    info!("Hit max_records limit ({})", self.config.max_records)
                }
                RevealPhase::LimitReached(_) => {
                    info!("Time ceiling reached after {:?}", state.elapsed)
                }
                RevealPhase::Scrolling if state.stagnant_cycles > 0 => info!(
                    "DOM growth stalled ({}/{})",
                    state.stagnant_cycles, self.config.stall_threshold
                ),
                _ => {}
            }
        }

        ProgressiveOutcome { phase, cycles }
    }

    async fn human_scroll_cycle(&self) {
        let config = self.config;

        // 読んでいるふりの小休止
        if self.pacer.chance(config.idle_chance) {
            let idle = self.pacer.pause(config.idle_pause).await;
            info!("Idling for {:.1}s", idle.as_secs_f64());
        }

        // 少し戻って読み返す
        if self.pacer.chance(config.upward_chance) {
            let step = self
                .pacer
                .uniform(config.upward_step_min, config.upward_step_max);
            self.scroll_by(-step).await;
            self.pacer.pause(config.upward_settle).await;
        }

        let step = self.pacer.uniform(config.step_min, config.step_max);
        self.scroll_by(step).await;
        self.pacer.pause(config.scroll_wait).await;

        if self.pacer.chance(config.pointer_chance) {
            self.pointer_wiggle().await;
        }
    }

    async fn scroll_by(&self, fraction: f64) {
        if let Err(e) = self
            .driver
            .evaluate(&scripts::scroll_by_viewport(fraction))
            .await
        {
            warn!("Scroll step failed: {}", e);
        }
    }

    /// ビューポート中央付近へポインタを動かし、ときどきカードにホバー
    async fn pointer_wiggle(&self) {
        let (width, height) = match self.driver.evaluate(scripts::VIEWPORT_SIZE).await {
            Ok(size) => (
                size.get("width").and_then(|v| v.as_f64()).unwrap_or(1280.0),
                size.get("height").and_then(|v| v.as_f64()).unwrap_or(800.0),
            ),
            Err(_) => (1280.0, 800.0),
        };

        let x = self.pacer.uniform(width * 0.2, width * 0.8);
        let y = self.pacer.uniform(height * 0.2, height * 0.8);
        if let Err(e) = self.driver.move_pointer(x, y).await {
            debug!("Pointer move failed: {}", e);
            return;
        }

        if self.pacer.chance(0.5) {
            if let Ok(cards) = self.driver.query_all(None, self.container).await {
                if let Some(card) = cards.first() {
                    if let Err(e) = self.driver.hover(card).await {
                        debug!("Hover failed: {}", e);
                    }
                }
            }
        }
    }

    async fn scroll_to_last_container(&self) {
        let cards = match self.driver.query_all(None, self.container).await {
            Ok(cards) => cards,
            Err(e) => {
                debug!("Container lookup failed: {}", e);
                return;
            }
        };
        if let Some(last) = cards.last() {
            if let Err(e) = self.driver.scroll_into_view(last).await {
                debug!("Scroll to last container failed: {}", e);
            }
        }
    }
}

/// 1サイクル後の件数から次の状態を決める
pub(crate) fn next_phase(config: &RevealConfig, state: &mut RevealState, count: usize) -> RevealPhase {
    if state.observe(count) {
        state.stagnant_cycles = 0;
    } else {
        state.stagnant_cycles += 1;
    }

    if state.realized_count >= config.max_records {
        return RevealPhase::LimitReached(RevealExit::SafetyCap);
    }
    if state.stagnant_cycles >= config.stall_threshold {
        return RevealPhase::Stalled;
    }
    if state.elapsed >= config.max_duration {
        return RevealPhase::LimitReached(RevealExit::TimeCeiling);
    }
    RevealPhase::Scrolling
}
