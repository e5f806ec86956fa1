//! reveal フェーズの状態型

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealStrategy {
    Progressive,
    FallbackSweep,
}

/// 段階的スクロールの状態遷移
///
/// `Scrolling → (Stalled | LimitReached) → Done`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealPhase {
    Scrolling,
    Stalled,
    LimitReached(RevealExit),
    Done,
}

/// reveal フェーズの終了理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealExit {
    /// 読み込み件数が安全上限に達した
    SafetyCap,
    /// 上限時間を超えた
    TimeCeiling,
    /// 件数・ページ高さとも安定し、末尾に到達したと判断
    EndOfContent,
    /// スイープの最大ラウンド数に達した
    RoundCeiling,
}

/// 1試行分の reveal 状態。試行開始時に作り直す
#[derive(Debug, Clone)]
pub struct RevealState {
    /// これまでに観測した最大件数
    pub realized_count: usize,
    pub stagnant_cycles: u32,
    pub elapsed: Duration,
    pub strategy: RevealStrategy,
    started: Instant,
}

impl RevealState {
    pub fn new() -> Self {
        Self {
            realized_count: 0,
            stagnant_cycles: 0,
            elapsed: Duration::ZERO,
            strategy: RevealStrategy::Progressive,
            started: Instant::now(),
        }
    }

    /// 新しい件数を反映し、増えたかどうかを返す
    ///
    /// 件数が減った場合（仮想リストなど）も「増えなかった」扱い。
    /// `realized_count` は減らない。
    pub fn observe(&mut self, count: usize) -> bool {
        self.elapsed = self.started.elapsed();
        if count > self.realized_count {
            self.realized_count = count;
            true
        } else {
            false
        }
    }

    pub(crate) fn enter_sweep(&mut self) {
        self.strategy = RevealStrategy::FallbackSweep;
        self.stagnant_cycles = 0;
        self.elapsed = self.started.elapsed();
    }

    pub(crate) fn refresh_elapsed(&mut self) {
        self.elapsed = self.started.elapsed();
    }
}

impl Default for RevealState {
    fn default() -> Self {
        Self::new()
    }
}

/// reveal フェーズの結果
#[derive(Debug, Clone)]
pub struct RevealReport {
    pub state: RevealState,
    pub exit: RevealExit,
    pub progressive_cycles: u32,
    pub sweep_rounds: u32,
    /// 各計測時点での `realized_count`
    pub count_history: Vec<usize>,
}
