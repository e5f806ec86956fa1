//! chromiumoxide による `DocumentDriver` / `SessionFactory` 実装

mod chromium;

use std::path::PathBuf;

pub use chromium::{ChromiumElement, ChromiumLauncher, ChromiumSession};

/// 実行ファイルのパスを解決する。設定 → `CHROME_PATH` → `CHROMIUM_PATH` の順。
/// どれもなければ `None`（chromiumoxide の自動検出に任せる）
pub fn find_chrome(configured: Option<&PathBuf>) -> Option<PathBuf> {
    if let Some(path) = configured {
        return Some(path.clone());
    }
    std::env::var("CHROME_PATH")
        .or_else(|_| std::env::var("CHROMIUM_PATH"))
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
}
