//! 人間らしい揺らぎを持った待機・乱数の供給源
//!
//! 制御ロジックは `Pacer` 経由でのみ乱数と待機を使う。テストでは
//! `InstantPacer` に差し替えることで待ち時間ゼロ・決定的に動かせる。

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::config::WaitRange;

#[async_trait]
pub trait Pacer: Send + Sync {
    /// `[lo, hi]` の一様乱数
    fn uniform(&self, lo: f64, hi: f64) -> f64;

    /// 確率 `p` で `true`
    fn chance(&self, p: f64) -> bool;

    async fn sleep(&self, duration: Duration);

    /// `range` 内のランダムな秒数だけ待ち、実際に待った時間を返す
    async fn pause(&self, range: WaitRange) -> Duration {
        let secs = self.uniform(range.min_secs, range.max_secs).max(0.0);
        let duration = Duration::from_secs_f64(secs);
        self.sleep(duration).await;
        duration
    }
}

/// `rand` と `tokio::time::sleep` による本番用実装
#[derive(Debug, Clone, Copy, Default)]
pub struct HumanPacer;

#[async_trait]
impl Pacer for HumanPacer {
    fn uniform(&self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        rand::thread_rng().gen_range(lo..=hi)
    }

    fn chance(&self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        rand::thread_rng().gen::<f64>() < p
    }

    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// 待機しない決定的な実装（下限値を返し、確率イベントは起こさない）
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantPacer;

#[async_trait]
impl Pacer for InstantPacer {
    fn uniform(&self, lo: f64, _hi: f64) -> f64 {
        lo
    }

    fn chance(&self, _p: f64) -> bool {
        false
    }

    async fn sleep(&self, _duration: Duration) {
        tokio::task::yield_now().await;
    }
}
