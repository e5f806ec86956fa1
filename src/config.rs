use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScraperError;
use crate::selector::SelectorChain;

/// 秒単位のランダム待機範囲
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaitRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl WaitRange {
    pub const fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    fn is_valid(&self) -> bool {
        self.min_secs >= 0.0 && self.min_secs <= self.max_secs && self.max_secs.is_finite()
    }
}

/// `Duration` をミリ秒の整数としてシリアライズする
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// リトライ方針（実行中は読み取り専用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(rename = "initial_backoff_ms", with = "millis")]
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
    #[serde(rename = "max_jitter_ms", with = "millis")]
    pub max_jitter: Duration,
    /// ジッター抜きの待ち時間の上限
    #[serde(rename = "max_backoff_ms", with = "millis")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(4),
            backoff_multiplier: 1.8,
            max_jitter: Duration::from_secs(2),
            max_backoff: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// `attempt` 回目の失敗後に待つ基本時間（ジッター抜き）
    ///
    /// `initial_backoff × multiplier^(attempt-1)`。`max_backoff` で頭打ち
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if self.initial_backoff.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(Duration::MAX)
            .min(self.max_backoff)
    }

    /// 実際に眠る時間。ジッター秒数が表現できない値なら `max_jitter` を使う
    pub fn delay_for(&self, attempt: u32, jitter_secs: f64) -> Duration {
        let jitter = Duration::try_from_secs_f64(jitter_secs.max(0.0))
            .unwrap_or(self.max_jitter)
            .min(self.max_jitter);
        self.backoff_for(attempt).saturating_add(jitter)
    }
}

/// 段階的スクロールとフォールバックスイープの設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    /// 読み込み件数の安全上限
    pub max_records: usize,
    /// reveal フェーズ全体の上限時間
    #[serde(rename = "max_duration_ms", with = "millis")]
    pub max_duration: Duration,
    /// 連続して件数が増えなかったサイクル数の閾値
    pub stall_threshold: u32,
    /// 1回の下スクロール量（ビューポート高さに対する比率）
    pub step_min: f64,
    pub step_max: f64,
    pub scroll_wait: WaitRange,
    pub idle_chance: f64,
    pub idle_pause: WaitRange,
    pub upward_chance: f64,
    pub upward_step_min: f64,
    pub upward_step_max: f64,
    pub upward_settle: WaitRange,
    pub pointer_chance: f64,
    pub growth_window: WaitRange,
    #[serde(rename = "progressive_idle_timeout_ms", with = "millis")]
    pub progressive_idle_timeout: Duration,
    pub sweep_rounds: u32,
    pub sweep_stable_repeats: u32,
    #[serde(rename = "sweep_idle_timeout_ms", with = "millis")]
    pub sweep_idle_timeout: Duration,
    pub sweep_settle: WaitRange,
    pub stability_check_gap: WaitRange,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            max_records: 2000,
            max_duration: Duration::from_secs(12 * 60),
            stall_threshold: 6,
            step_min: 0.6,
            step_max: 1.1,
            scroll_wait: WaitRange::new(1.2, 2.8),
            idle_chance: 0.10,
            idle_pause: WaitRange::new(3.0, 8.0),
            upward_chance: 0.15,
            upward_step_min: 0.15,
            upward_step_max: 0.4,
            upward_settle: WaitRange::new(0.4, 0.9),
            pointer_chance: 0.25,
            growth_window: WaitRange::new(1.0, 2.5),
            progressive_idle_timeout: Duration::from_millis(3000),
            sweep_rounds: 40,
            sweep_stable_repeats: 3,
            sweep_idle_timeout: Duration::from_millis(5000),
            sweep_settle: WaitRange::new(2.0, 4.5),
            stability_check_gap: WaitRange::new(1.0, 2.0),
        }
    }
}

/// 商品カードと各フィールドのセレクタ
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// 1商品を表す繰り返し要素
    pub container: String,
    pub brand: SelectorChain,
    pub title: SelectorChain,
    pub original_price: SelectorChain,
    pub discounted_price: SelectorChain,
    pub discount: SelectorChain,
    pub detail_link: SelectorChain,
    /// 画像を内包する要素（見つからなければカード自身を使う）
    pub image_holders: SelectorChain,
    /// 画像URLを読む属性の優先順
    pub image_attributes: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            container: ".item.rilrtl-products-list__item".to_string(),
            brand: SelectorChain::from(vec!["div.brand", "div[class*='brand']"]),
            title: SelectorChain::from(vec!["div.nameCls", "div[class*='name']"]),
            original_price: SelectorChain::from(vec![
                "span.orginal-price",
                "span[class*='original-price']",
                "span[class*='orginal-price']",
            ]),
            discounted_price: SelectorChain::from(vec![
                "span.price strong",
                "span[class*='price-value']",
                "span[id*='price-value']",
            ]),
            discount: SelectorChain::from(vec!["span.discount", "span[class*='discount']"]),
            detail_link: SelectorChain::from(vec!["a.rilrtl-products-list__link", "a"]),
            image_holders: SelectorChain::from(vec!["div.imgHolder", "div[class*='img']"]),
            image_attributes: ["src", "data-src", "data-lazy", "srcset"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// ポップアップ・オーバーレイ閉じ処理の設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub detectors: Vec<String>,
    pub close_controls: Vec<String>,
    #[serde(rename = "click_timeout_ms", with = "millis")]
    pub click_timeout: Duration,
    pub settle: WaitRange,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            detectors: [
                "div[role='dialog']",
                "div[class*='modal']",
                "div[class*='popup']",
                "#wzrk_wrapper",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            close_controls: [
                "button[aria-label='Close']",
                "#wzrk-cancel",
                ".ic-close",
                ".close",
                "[class*='close']",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            click_timeout: Duration::from_millis(1000),
            settle: WaitRange::new(0.5, 1.5),
        }
    }
}

/// ビューポートの幅・高さ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

/// アイデンティティのローテーション用プール
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub user_agents: Vec<String>,
    /// デスクトップ用ビューポート候補
    pub viewports: Vec<ViewportSize>,
    /// モバイルUA選択時のビューポート
    pub mobile_viewport: ViewportSize,
    pub header_profiles: Vec<HashMap<String, String>>,
    /// `host:port` 形式のプロキシ。空ならプロキシなし
    pub proxies: Vec<String>,
    /// 毎回付与する追加ヘッダ（地域指定など）
    pub extra_headers: HashMap<String, String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        let user_agents = [
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
            "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let viewports = [
            (1920, 1080),
            (1366, 768),
            (1440, 900),
            (1536, 864),
            (1280, 720),
            (1600, 900),
        ]
        .iter()
        .map(|&(width, height)| ViewportSize { width, height })
        .collect();

        let header_profiles = vec![
            headers(&[
                ("Accept-Language", "en-US,en;q=0.9"),
                (
                    "Accept",
                    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
                ),
                ("DNT", "1"),
                ("Upgrade-Insecure-Requests", "1"),
            ]),
            headers(&[
                ("Accept-Language", "en-GB,en;q=0.8,es;q=0.6"),
                (
                    "Accept",
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                ),
                ("DNT", "0"),
                ("Upgrade-Insecure-Requests", "1"),
            ]),
            headers(&[
                ("Accept-Language", "en-CA,en;q=0.9,fr;q=0.8"),
                (
                    "Accept",
                    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
                ),
                ("Cache-Control", "max-age=0"),
            ]),
        ];

        Self {
            user_agents,
            viewports,
            mobile_viewport: ViewportSize {
                width: 412,
                height: 915,
            },
            header_profiles,
            proxies: Vec::new(),
            extra_headers: HashMap::new(),
        }
    }
}

fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// ブラウザ起動設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    /// 未指定なら環境変数 `CHROME_PATH` / `CHROMIUM_PATH` を参照
    pub chrome_path: Option<PathBuf>,
    #[serde(rename = "page_load_timeout_ms", with = "millis")]
    pub page_load_timeout: Duration,
    #[serde(rename = "request_timeout_ms", with = "millis")]
    pub request_timeout: Duration,
    /// 新しいドキュメントごとに評価されるスクリプト
    pub init_scripts: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            page_load_timeout: Duration::from_secs(180),
            request_timeout: Duration::from_secs(60),
            init_scripts: Vec::new(),
        }
    }
}

/// 1回の試行内のタイミングとスクリーンショット設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttemptSettings {
    /// ナビゲーション直後の待機
    pub initial_settle: WaitRange,
    /// 抽出直前の待機（遅延読み込み画像用）
    pub final_settle: WaitRange,
    #[serde(rename = "record_timeout_ms", with = "millis")]
    pub record_timeout: Duration,
    pub screenshot: bool,
    pub screenshot_dir: PathBuf,
}

impl Default for AttemptSettings {
    fn default() -> Self {
        Self {
            initial_settle: WaitRange::new(2.5, 4.5),
            final_settle: WaitRange::new(2.0, 4.0),
            record_timeout: Duration::from_secs(10),
            screenshot: true,
            screenshot_dir: PathBuf::from("./screenshots"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Ndjson,
    Csv,
}

/// 出力先設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_dir: PathBuf,
    pub prefix: String,
    pub formats: Vec<OutputFormat>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            prefix: "listing".to_string(),
            formats: vec![OutputFormat::Json, OutputFormat::Ndjson, OutputFormat::Csv],
        }
    }
}

/// プロセス起動時に一度だけ構築し、`Arc` で共有する読み取り専用の設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub reveal: RevealConfig,
    pub selectors: SelectorConfig,
    pub overlay: OverlayConfig,
    pub identity: IdentityConfig,
    pub browser: BrowserSettings,
    pub attempt: AttemptSettings,
    pub output: OutputConfig,
    pub retry: RetryPolicy,
}

impl ScraperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// JSONファイルから読み込む。記述のない項目はデフォルト値
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScraperError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: ScraperConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.browser.headless = headless;
        self
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output.output_dir = path.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output.prefix = prefix.into();
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry.max_attempts = max_attempts;
        self
    }

    pub fn with_screenshots(mut self, enabled: bool) -> Self {
        self.attempt.screenshot = enabled;
        self
    }

    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.browser.chrome_path = Some(path.into());
        self
    }

    /// 矛盾した設定を起動前に弾く
    pub fn validate(&self) -> Result<(), ScraperError> {
        let reveal = &self.reveal;
        let ranges = [
            ("reveal.scroll_wait", reveal.scroll_wait),
            ("reveal.idle_pause", reveal.idle_pause),
            ("reveal.upward_settle", reveal.upward_settle),
            ("reveal.growth_window", reveal.growth_window),
            ("reveal.sweep_settle", reveal.sweep_settle),
            ("reveal.stability_check_gap", reveal.stability_check_gap),
            ("overlay.settle", self.overlay.settle),
            ("attempt.initial_settle", self.attempt.initial_settle),
            ("attempt.final_settle", self.attempt.final_settle),
        ];
        for (name, range) in ranges {
            if !range.is_valid() {
                return Err(ScraperError::Config(format!(
                    "{} の範囲が不正です: {:?}",
                    name, range
                )));
            }
        }

        if !(reveal.step_min > 0.0 && reveal.step_min <= reveal.step_max) {
            return Err(ScraperError::Config(format!(
                "スクロール量の範囲が不正です: {}..{}",
                reveal.step_min, reveal.step_max
            )));
        }
        if reveal.upward_step_min > reveal.upward_step_max {
            return Err(ScraperError::Config(format!(
                "上スクロール量の範囲が不正です: {}..{}",
                reveal.upward_step_min, reveal.upward_step_max
            )));
        }
        if reveal.stall_threshold == 0 || reveal.sweep_stable_repeats == 0 {
            return Err(ScraperError::Config(
                "停滞判定の閾値は1以上にしてください".into(),
            ));
        }
        if self.selectors.container.trim().is_empty() {
            return Err(ScraperError::Config("商品カードのセレクタが空です".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ScraperError::Config("max_attempts は1以上にしてください".into()));
        }
        if !(self.retry.backoff_multiplier >= 1.0 && self.retry.backoff_multiplier.is_finite()) {
            return Err(ScraperError::Config(format!(
                "backoff_multiplier は1以上にしてください: {}",
                self.retry.backoff_multiplier
            )));
        }
        if self.retry.max_backoff < self.retry.initial_backoff {
            return Err(ScraperError::Config(format!(
                "max_backoff が initial_backoff より短いです: {:?} < {:?}",
                self.retry.max_backoff, self.retry.initial_backoff
            )));
        }
        if self.identity.user_agents.is_empty() {
            return Err(ScraperError::Config("user_agents が空です".into()));
        }
        Ok(())
    }
}
