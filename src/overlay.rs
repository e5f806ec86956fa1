use tracing::{debug, info};

use crate::config::OverlayConfig;
use crate::pacing::Pacer;
use crate::traits::DocumentDriver;

/// 操作を妨げるポップアップ・オーバーレイを閉じる
///
/// 毎サイクル呼んでも安全。オーバーレイがないのが通常で、その場合は何もしない。
pub struct OverlayDismisser<'a, D: DocumentDriver> {
    driver: &'a D,
    pacer: &'a dyn Pacer,
    config: &'a OverlayConfig,
}

impl<'a, D: DocumentDriver> OverlayDismisser<'a, D> {
    pub fn new(driver: &'a D, pacer: &'a dyn Pacer, config: &'a OverlayConfig) -> Self {
        Self {
            driver,
            pacer,
            config,
        }
    }

    /// 閉じたオーバーレイの数を返す。エラーはすべてログに残して吸収する
    pub async fn dismiss_blocking_overlays(&self) -> usize {
        let mut closed = 0;

        for detector in &self.config.detectors {
            let overlays = match self.driver.query_all(None, detector).await {
                Ok(found) => found,
                Err(e) => {
                    debug!("Overlay detector '{}' failed: {}", detector, e);
                    continue;
                }
            };

            for overlay in &overlays {
                if !self.visible(overlay).await {
                    continue;
                }
                info!("Popup detected ({})", detector);

                if self.close(overlay).await {
                    info!("Popup closed");
                    closed += 1;
                    self.pacer.pause(self.config.settle).await;
                }
            }
        }

        closed
    }

    /// 閉じるボタン候補をオーバーレイ内→ページ全体の順に探してクリック
    ///
    /// ページ全体の候補はオーバーレイ内の候補と重複しうるので、一度試した要素は飛ばす。
    async fn close(&self, overlay: &D::Element) -> bool {
        let mut tried: Vec<D::Element> = Vec::new();

        for control in &self.config.close_controls {
            let mut candidates = self
                .driver
                .query_all(Some(overlay), control)
                .await
                .unwrap_or_default();
            candidates.extend(
                self.driver
                    .query_all(None, control)
                    .await
                    .unwrap_or_default(),
            );

            for candidate in candidates {
                if tried.contains(&candidate) {
                    continue;
                }
                if !self.visible(&candidate).await {
                    continue;
                }
                tried.push(candidate.clone());
                match self
                    .driver
                    .click(&candidate, self.config.click_timeout)
                    .await
                {
                    Ok(()) => return true,
                    Err(e) => {
                        debug!("Close control '{}' click failed: {}", control, e);
                    }
                }
            }
        }
        false
    }

    async fn visible(&self, element: &D::Element) -> bool {
        self.driver.is_visible(element).await.unwrap_or(false)
    }
}
