use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, EventJavascriptDialogOpening,
    HandleJavaScriptDialogParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::layout::Point;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::BrowserSettings;
use crate::error::ScraperError;
use crate::identity::IdentityProfile;
use crate::traits::{DialogPolicy, DocumentDriver, SessionFactory};

use super::find_chrome;

const NETWORK_IDLE_CHECK_INTERVAL_MS: u64 = 250;
const REQUIRED_IDLE_CHECKS: u32 = 3;

const IDLE_CHECK_SCRIPT: &str = r#"
    (() => {
        const entries = performance.getEntriesByType('resource');
        const now = performance.now();
        const recent = entries.filter(e => (now - e.startTime) < 500 && e.duration === 0);
        return recent.length === 0;
    })()
"#;

const VISIBILITY_SCRIPT: &str = r#"
    function() {
        const rect = this.getBoundingClientRect();
        const style = window.getComputedStyle(this);
        return rect.width > 0 && rect.height > 0
            && style.display !== 'none'
            && style.visibility !== 'hidden'
            && parseFloat(style.opacity || '1') > 0;
    }
"#;

fn driver_err(e: impl std::fmt::Display) -> ScraperError {
    ScraperError::Driver(e.to_string())
}

fn remove_profile_dir(dir: &std::path::Path) {
    if let Err(e) = std::fs::remove_dir_all(dir) {
        debug!("Failed to remove {:?}: {}", dir, e);
    }
}

/// `chromiumoxide::element::Element` の共有ハンドル
#[derive(Clone)]
pub struct ChromiumElement(Arc<Element>);

/// 同じバックエンドノードを指していれば等しい
impl PartialEq for ChromiumElement {
    fn eq(&self, other: &Self) -> bool {
        self.0.backend_node_id == other.0.backend_node_id
    }
}

impl ChromiumElement {
    fn inner(&self) -> &Element {
        &self.0
    }
}

/// 試行ごとに独立したブラウザプロセスを起動する
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    settings: BrowserSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SessionFactory for ChromiumLauncher {
    type Session = ChromiumSession;

    async fn open(&self, identity: &IdentityProfile) -> Result<ChromiumSession, ScraperError> {
        info!("Launching browser...");

        // 試行ごとにプロファイルを分離する
        let unique_id = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let user_data_dir = std::env::temp_dir().join(format!("listing-scraper-{}", unique_id));
        let viewport = identity.viewport;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(&user_data_dir)
            .window_size(viewport.width, viewport.height)
            .no_sandbox()
            .request_timeout(self.settings.request_timeout)
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if let Some(chrome_path) = find_chrome(self.settings.chrome_path.as_ref()) {
            builder = builder.chrome_executable(chrome_path);
        }
        if !self.settings.headless {
            builder = builder.with_head();
        }
        if let Some(proxy) = &identity.proxy {
            debug!("Using proxy {}", proxy);
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        let launched = match builder.build() {
            Ok(browser_config) => Browser::launch(browser_config)
                .await
                .map_err(|e| ScraperError::BrowserInit(e.to_string())),
            Err(e) => Err(ScraperError::BrowserInit(e)),
        };
        let (browser, mut handler) = match launched {
            Ok(pair) => pair,
            Err(e) => {
                remove_profile_dir(&user_data_dir);
                return Err(e);
            }
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {}", e);
                }
            }
        });

        let session = ChromiumSession {
            browser: Mutex::new(Some(browser)),
            page: None,
            handler_task,
            dialog_task: Mutex::new(None),
            user_data_dir,
        };

        // ここから先の失敗でもプロセスを残さない
        let prepared = session.prepare_page(identity).await;
        match prepared {
            Ok(page) => Ok(ChromiumSession {
                page: Some(page),
                ..session
            }),
            Err(e) => {
                let _ = session.close().await;
                Err(e)
            }
        }
    }
}

/// 1つのブラウザプロセスと1つのタブ
pub struct ChromiumSession {
    browser: Mutex<Option<Browser>>,
    page: Option<Page>,
    handler_task: JoinHandle<()>,
    dialog_task: Mutex<Option<JoinHandle<()>>>,
    user_data_dir: PathBuf,
}

impl ChromiumSession {
    async fn prepare_page(&self, identity: &IdentityProfile) -> Result<Page, ScraperError> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| ScraperError::BrowserInit("browser already closed".into()))?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        let viewport = identity.viewport;
        page.execute(SetDeviceMetricsOverrideParams::new(
            viewport.width as i64,
            viewport.height as i64,
            viewport.device_scale_factor(),
            viewport.is_mobile(),
        ))
        .await
        .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        page.execute(SetUserAgentOverrideParams::new(identity.user_agent.clone()))
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        debug!(
            "Page prepared: {}x{} mobile={}",
            viewport.width,
            viewport.height,
            viewport.is_mobile()
        );
        Ok(page)
    }

    fn page(&self) -> Result<&Page, ScraperError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScraperError::Driver("page is not available".into()))
    }
}

#[async_trait]
impl DocumentDriver for ChromiumSession {
    type Element = ChromiumElement;

    async fn navigate(&self, url: &str, limit: Duration) -> Result<(), ScraperError> {
        let page = self.page()?;
        match timeout(limit, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ScraperError::Navigation(e.to_string())),
            Err(_) => Err(ScraperError::Timeout(format!(
                "{} did not load within {:?}",
                url, limit
            ))),
        }
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, ScraperError> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?;
        Ok(result
            .into_value::<serde_json::Value>()
            .unwrap_or_default())
    }

    async fn query_all(
        &self,
        scope: Option<&ChromiumElement>,
        selector: &str,
    ) -> Result<Vec<ChromiumElement>, ScraperError> {
        let found = match scope {
            Some(element) => element.inner().find_elements(selector).await,
            None => self.page()?.find_elements(selector).await,
        }
        .map_err(driver_err)?;
        Ok(found
            .into_iter()
            .map(|e| ChromiumElement(Arc::new(e)))
            .collect())
    }

    async fn read_text(&self, element: &ChromiumElement) -> Result<String, ScraperError> {
        let value = element
            .inner()
            .property("textContent")
            .await
            .map_err(driver_err)?;
        Ok(value
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default())
    }

    async fn read_attribute(
        &self,
        element: &ChromiumElement,
        name: &str,
    ) -> Result<Option<String>, ScraperError> {
        element.inner().attribute(name).await.map_err(driver_err)
    }

    async fn read_property(
        &self,
        element: &ChromiumElement,
        name: &str,
    ) -> Result<Option<String>, ScraperError> {
        let value = element.inner().property(name).await.map_err(driver_err)?;
        Ok(match value {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        })
    }

    async fn is_visible(&self, element: &ChromiumElement) -> Result<bool, ScraperError> {
        let returns = element
            .inner()
            .call_js_fn(VISIBILITY_SCRIPT, false)
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?;
        Ok(returns
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn click(&self, element: &ChromiumElement, limit: Duration) -> Result<(), ScraperError> {
        match timeout(limit, element.inner().click()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(driver_err(e)),
            Err(_) => Err(ScraperError::Timeout(format!("click exceeded {:?}", limit))),
        }
    }

    async fn hover(&self, element: &ChromiumElement) -> Result<(), ScraperError> {
        element.inner().hover().await.map_err(driver_err)?;
        Ok(())
    }

    async fn scroll_into_view(&self, element: &ChromiumElement) -> Result<(), ScraperError> {
        element.inner().scroll_into_view().await.map_err(driver_err)?;
        Ok(())
    }

    async fn move_pointer(&self, x: f64, y: f64) -> Result<(), ScraperError> {
        self.page()?
            .move_mouse(Point::new(x, y))
            .await
            .map_err(driver_err)?;
        Ok(())
    }

    /// Performance API で直近のリソース取得を監視し、連続でアイドルなら完了
    async fn wait_network_idle(&self, limit: Duration) -> Result<bool, ScraperError> {
        let page = self.page()?;
        let start = Instant::now();
        let mut idle_count = 0;

        while start.elapsed() < limit {
            match page.evaluate(IDLE_CHECK_SCRIPT).await {
                Ok(val) => {
                    if val.into_value::<bool>().unwrap_or(false) {
                        idle_count += 1;
                        if idle_count >= REQUIRED_IDLE_CHECKS {
                            debug!("Network idle after {:?}", start.elapsed());
                            return Ok(true);
                        }
                    } else {
                        idle_count = 0;
                    }
                }
                Err(e) => {
                    debug!("Network idle check error: {}", e);
                    idle_count = 0;
                }
            }
            sleep(Duration::from_millis(NETWORK_IDLE_CHECK_INTERVAL_MS)).await;
        }

        debug!("Network idle timeout after {:?}, proceeding anyway", start.elapsed());
        Ok(false)
    }

    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<(), ScraperError> {
        self.page()?
            .save_screenshot(ScreenshotParams::builder().full_page(full_page).build(), path)
            .await
            .map_err(driver_err)?;
        Ok(())
    }

    async fn set_headers(&self, headers: &HashMap<String, String>) -> Result<(), ScraperError> {
        let json = serde_json::to_value(headers)?;
        self.page()?
            .execute(SetExtraHttpHeadersParams::new(Headers::new(json)))
            .await
            .map_err(driver_err)?;
        Ok(())
    }

    async fn on_dialog(&self, policy: DialogPolicy) -> Result<(), ScraperError> {
        let page = self.page()?.clone();
        let mut dialogs = page
            .event_listener::<EventJavascriptDialogOpening>()
            .await
            .map_err(driver_err)?;
        let accept = policy == DialogPolicy::Accept;

        let task = tokio::spawn(async move {
            while let Some(dialog) = dialogs.next().await {
                debug!("Dialog opened ({}), accept={}", dialog.message, accept);
                if let Err(e) = page.execute(HandleJavaScriptDialogParams::new(accept)).await {
                    debug!("Failed to handle dialog: {}", e);
                }
            }
        });

        if let Some(previous) = self.dialog_task.lock().await.replace(task) {
            previous.abort();
        }
        Ok(())
    }

    async fn add_init_script(&self, script: &str) -> Result<(), ScraperError> {
        self.page()?
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(script))
            .await
            .map_err(driver_err)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), ScraperError> {
        if let Some(task) = self.dialog_task.lock().await.take() {
            task.abort();
        }

        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };

        if let Err(e) = browser.close().await {
            warn!("Browser close error: {}", e);
        }
        if let Err(e) = browser.wait().await {
            debug!("Browser wait error: {}", e);
        }
        self.handler_task.abort();

        remove_profile_dir(&self.user_data_dir);
        info!("Browser closed");
        Ok(())
    }
}
