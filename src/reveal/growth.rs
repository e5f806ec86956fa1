use tracing::debug;

use crate::config::WaitRange;
use crate::pacing::Pacer;
use crate::traits::DocumentDriver;

/// 現在DOMに存在する商品カード数の観測
///
/// 成否の判断はしない。判断は呼び出し側のコントローラが行う。
pub struct GrowthMonitor<'a, D: DocumentDriver> {
    driver: &'a D,
    pacer: &'a dyn Pacer,
    container: &'a str,
}

impl<'a, D: DocumentDriver> GrowthMonitor<'a, D> {
    pub fn new(driver: &'a D, pacer: &'a dyn Pacer, container: &'a str) -> Self {
        Self {
            driver,
            pacer,
            container,
        }
    }

    /// カード数を数える。ドライバエラーは 0 件として扱う
    pub async fn count_realized(&self) -> usize {
        match self.driver.query_all(None, self.container).await {
            Ok(cards) => cards.len(),
            Err(e) => {
                debug!("Container count failed: {}", e);
                0
            }
        }
    }

    /// 遅延マウントを待ってから数え直す。増減に関係なく新しい件数を返す
    pub async fn await_growth(&self, previous: usize, window: WaitRange) -> usize {
        let waited = self.pacer.pause(window).await;
        let count = self.count_realized().await;
        debug!(
            "Growth check after {:?}: {} -> {}",
            waited, previous, count
        );
        count
    }
}
