//! reveal フェーズでページに評価させるスクリプト

pub const VIEWPORT_SIZE: &str = "({ width: window.innerWidth, height: window.innerHeight })";

pub const SCROLL_HEIGHT: &str = "document.body.scrollHeight";

pub const SCROLL_TO_END: &str = "window.scrollTo(0, document.body.scrollHeight)";

/// ビューポート高さの `fraction` 倍だけスクロール（負なら上方向）
pub fn scroll_by_viewport(fraction: f64) -> String {
    format!("window.scrollBy(0, window.innerHeight * {:.3})", fraction)
}
