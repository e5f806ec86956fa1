//! 結合テスト用のインメモリ DocumentDriver
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use listing_scraper::config::WaitRange;
use listing_scraper::identity::IdentityProfile;
use listing_scraper::reveal::scripts;
use listing_scraper::traits::{DialogPolicy, DocumentDriver, SessionFactory};
use listing_scraper::{Pacer, ScraperError};

pub type NodeId = usize;

pub const CARD: &str = ".item.rilrtl-products-list__item";

/// ページ上の1要素。子要素はセレクタ文字列ごとに列挙しておく
#[derive(Debug, Clone)]
pub struct Node {
    pub text: String,
    pub attributes: HashMap<String, String>,
    pub properties: HashMap<String, String>,
    pub visible: bool,
    pub children: HashMap<String, Vec<NodeId>>,
    pub click_fails: bool,
    /// クリックされたら非表示にするノード
    pub hides: Option<NodeId>,
    /// テキスト・属性・プロパティの読み取りが失敗する
    pub read_fails: bool,
    /// 読み取りが返ってこない
    pub hangs: bool,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            text: String::new(),
            attributes: HashMap::new(),
            properties: HashMap::new(),
            visible: true,
            children: HashMap::new(),
            click_fails: false,
            hides: None,
            read_fails: false,
            hangs: false,
        }
    }
}

impl Node {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_prop(mut self, name: &str, value: &str) -> Self {
        self.properties.insert(name.to_string(), value.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn failing_click(mut self) -> Self {
        self.click_fails = true;
        self
    }

    pub fn hides(mut self, target: NodeId) -> Self {
        self.hides = Some(target);
        self
    }

    pub fn failing_reads(mut self) -> Self {
        self.read_fails = true;
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hangs = true;
        self
    }
}

#[derive(Default)]
struct PageState {
    nodes: Vec<Node>,
    roots: HashMap<String, Vec<NodeId>>,
    cards: Vec<NodeId>,
    /// スクロールのたびに1つ進む、表示中カード数の予定表
    schedule: Vec<usize>,
    cursor: usize,
    scroll_height: Option<f64>,
    /// scrollHeight を読むたびに先頭から1つずつ反映する高さ
    height_schedule: VecDeque<f64>,
    failing_selectors: HashSet<String>,
    hang_on_navigate: bool,
    fail_navigation: bool,
    navigations: Vec<String>,
    scrolls: usize,
    scroll_scripts: Vec<String>,
    pointer_moves: Vec<(f64, f64)>,
    hovers: Vec<NodeId>,
    clicks: Vec<NodeId>,
    screenshots: Vec<PathBuf>,
    fail_screenshot: bool,
    headers: Vec<HashMap<String, String>>,
    dialog_policies: Vec<DialogPolicy>,
    closes: usize,
}

impl PageState {
    fn visible_cards(&self) -> Vec<NodeId> {
        let count = if self.schedule.is_empty() {
            self.cards.len()
        } else {
            let index = self.cursor.min(self.schedule.len() - 1);
            self.schedule[index].min(self.cards.len())
        };
        self.cards[..count].to_vec()
    }
}

/// クローンは同じページ状態を共有する
#[derive(Clone, Default)]
pub struct StubDriver {
    state: Arc<Mutex<PageState>>,
}

impl StubDriver {
    pub fn new() -> Self {
        let driver = Self::default();
        driver.state.lock().unwrap().scroll_height = Some(4000.0);
        driver
    }

    pub fn add_node(&self, node: Node) -> NodeId {
        let mut state = self.state.lock().unwrap();
        state.nodes.push(node);
        state.nodes.len() - 1
    }

    /// ページ全体のクエリで `selector` にマッチするノードとして登録
    pub fn add_root(&self, selector: &str, node: Node) -> NodeId {
        let id = self.add_node(node);
        self.state
            .lock()
            .unwrap()
            .roots
            .entry(selector.to_string())
            .or_default()
            .push(id);
        id
    }

    /// 既存ノードをページ全体のクエリでも `selector` にマッチさせる
    pub fn register_root(&self, selector: &str, id: NodeId) {
        self.state
            .lock()
            .unwrap()
            .roots
            .entry(selector.to_string())
            .or_default()
            .push(id);
    }

    pub fn add_child(&self, parent: NodeId, selector: &str, node: Node) -> NodeId {
        let id = self.add_node(node);
        self.state.lock().unwrap().nodes[parent]
            .children
            .entry(selector.to_string())
            .or_default()
            .push(id);
        id
    }

    pub fn add_card(&self, node: Node) -> NodeId {
        let id = self.add_node(node);
        self.state.lock().unwrap().cards.push(id);
        id
    }

    /// 一般的な商品カードを1枚追加
    pub fn add_product(&self, index: usize, original: &str, discounted: &str, discount: &str) -> NodeId {
        let card = self.add_card(Node::default());
        self.add_child(card, "div.brand", Node::text(&format!("Brand {}", index)));
        self.add_child(card, "div.nameCls", Node::text(&format!("Backpack {}", index)));
        self.add_child(card, "span.orginal-price", Node::text(original));
        self.add_child(card, "span.price strong", Node::text(discounted));
        self.add_child(card, "span.discount", Node::text(discount));
        self.add_child(
            card,
            "a.rilrtl-products-list__link",
            Node::default().with_prop("href", &format!("https://www.ajio.com/p/{}", index)),
        );
        let holder = self.add_child(card, "div.imgHolder", Node::default());
        self.add_child(
            holder,
            "img, source",
            Node::default().with_attr("src", &format!("https://assets.ajio.com/{}.jpg", index)),
        );
        card
    }

    pub fn set_schedule(&self, counts: Vec<usize>) {
        let mut state = self.state.lock().unwrap();
        state.schedule = counts;
        state.cursor = 0;
    }

    pub fn set_scroll_height(&self, height: Option<f64>) {
        self.state.lock().unwrap().scroll_height = height;
    }

    pub fn set_height_schedule(&self, heights: Vec<f64>) {
        self.state.lock().unwrap().height_schedule = heights.into();
    }

    pub fn fail_screenshot(&self) {
        self.state.lock().unwrap().fail_screenshot = true;
    }

    pub fn fail_selector(&self, selector: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_selectors
            .insert(selector.to_string());
    }

    pub fn hang_on_navigate(&self) {
        self.state.lock().unwrap().hang_on_navigate = true;
    }

    pub fn fail_navigation(&self) {
        self.state.lock().unwrap().fail_navigation = true;
    }

    pub fn is_node_visible(&self, id: NodeId) -> bool {
        self.state.lock().unwrap().nodes[id].visible
    }

    pub fn clicks(&self) -> Vec<NodeId> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    pub fn scrolls(&self) -> usize {
        self.state.lock().unwrap().scrolls
    }

    pub fn scroll_scripts(&self) -> Vec<String> {
        self.state.lock().unwrap().scroll_scripts.clone()
    }

    pub fn pointer_moves(&self) -> Vec<(f64, f64)> {
        self.state.lock().unwrap().pointer_moves.clone()
    }

    pub fn hovers(&self) -> Vec<NodeId> {
        self.state.lock().unwrap().hovers.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().screenshots.clone()
    }

    pub fn dialog_policies(&self) -> Vec<DialogPolicy> {
        self.state.lock().unwrap().dialog_policies.clone()
    }

    pub fn headers(&self) -> Vec<HashMap<String, String>> {
        self.state.lock().unwrap().headers.clone()
    }

    /// 注入された失敗・停止を反映してノードを読む
    async fn read_node(&self, id: NodeId) -> Result<Node, ScraperError> {
        let node = self.state.lock().unwrap().nodes[id].clone();
        if node.hangs {
            std::future::pending::<()>().await;
        }
        if node.read_fails {
            return Err(ScraperError::Driver(format!("node {} is detached", id)));
        }
        Ok(node)
    }
}

#[async_trait]
impl DocumentDriver for StubDriver {
    type Element = NodeId;

    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), ScraperError> {
        let (hang, fail) = {
            let mut state = self.state.lock().unwrap();
            state.navigations.push(url.to_string());
            (state.hang_on_navigate, state.fail_navigation)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(ScraperError::Navigation("net::ERR_CONNECTION_RESET".into()));
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, ScraperError> {
        let mut state = self.state.lock().unwrap();
        if script == scripts::SCROLL_TO_END || script.starts_with("window.scrollBy") {
            state.scrolls += 1;
            state.scroll_scripts.push(script.to_string());
            // 上方向のスクロールでは新しいカードは読み込まれない
            if !script.contains("* -") {
                state.cursor += 1;
            }
            return Ok(Value::Null);
        }
        if script == scripts::SCROLL_HEIGHT {
            if let Some(height) = state.height_schedule.pop_front() {
                state.scroll_height = Some(height);
            }
            return state
                .scroll_height
                .map(|h| json!(h))
                .ok_or_else(|| ScraperError::JavaScript("document.body is null".into()));
        }
        if script == scripts::VIEWPORT_SIZE {
            return Ok(json!({ "width": 1366, "height": 768 }));
        }
        Ok(Value::Null)
    }

    async fn query_all(&self, scope: Option<&NodeId>, selector: &str) -> Result<Vec<NodeId>, ScraperError> {
        let state = self.state.lock().unwrap();
        if state.failing_selectors.contains(selector) {
            return Err(ScraperError::Driver(format!("invalid selector {}", selector)));
        }
        Ok(match scope {
            Some(parent) => state.nodes[*parent]
                .children
                .get(selector)
                .cloned()
                .unwrap_or_default(),
            None if selector == CARD => state.visible_cards(),
            None => state.roots.get(selector).cloned().unwrap_or_default(),
        })
    }

    async fn read_text(&self, element: &NodeId) -> Result<String, ScraperError> {
        Ok(self.read_node(*element).await?.text)
    }

    async fn read_attribute(&self, element: &NodeId, name: &str) -> Result<Option<String>, ScraperError> {
        Ok(self.read_node(*element).await?.attributes.get(name).cloned())
    }

    async fn read_property(&self, element: &NodeId, name: &str) -> Result<Option<String>, ScraperError> {
        Ok(self.read_node(*element).await?.properties.get(name).cloned())
    }

    async fn is_visible(&self, element: &NodeId) -> Result<bool, ScraperError> {
        Ok(self.state.lock().unwrap().nodes[*element].visible)
    }

    async fn click(&self, element: &NodeId, _timeout: Duration) -> Result<(), ScraperError> {
        let mut state = self.state.lock().unwrap();
        state.clicks.push(*element);
        let node = state.nodes[*element].clone();
        if node.click_fails {
            return Err(ScraperError::Timeout("element is not clickable".into()));
        }
        if let Some(target) = node.hides {
            state.nodes[target].visible = false;
        }
        Ok(())
    }

    async fn hover(&self, element: &NodeId) -> Result<(), ScraperError> {
        self.state.lock().unwrap().hovers.push(*element);
        Ok(())
    }

    async fn scroll_into_view(&self, _element: &NodeId) -> Result<(), ScraperError> {
        Ok(())
    }

    async fn move_pointer(&self, x: f64, y: f64) -> Result<(), ScraperError> {
        self.state.lock().unwrap().pointer_moves.push((x, y));
        Ok(())
    }

    async fn wait_network_idle(&self, _timeout: Duration) -> Result<bool, ScraperError> {
        Ok(true)
    }

    async fn screenshot(&self, path: &Path, _full_page: bool) -> Result<(), ScraperError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_screenshot {
            return Err(ScraperError::Driver("Page.captureScreenshot timed out".into()));
        }
        state.screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn set_headers(&self, headers: &HashMap<String, String>) -> Result<(), ScraperError> {
        self.state.lock().unwrap().headers.push(headers.clone());
        Ok(())
    }

    async fn on_dialog(&self, policy: DialogPolicy) -> Result<(), ScraperError> {
        self.state.lock().unwrap().dialog_policies.push(policy);
        Ok(())
    }

    async fn add_init_script(&self, _script: &str) -> Result<(), ScraperError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ScraperError> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

/// 毎回同じ `StubDriver` を返すセッションファクトリ
#[derive(Clone)]
pub struct StubFactory {
    pub driver: StubDriver,
    pub opened: Arc<Mutex<Vec<IdentityProfile>>>,
    /// ブラウザ起動にかかる時間
    open_delay: Option<Duration>,
}

impl StubFactory {
    pub fn new(driver: StubDriver) -> Self {
        Self {
            driver,
            opened: Arc::new(Mutex::new(Vec::new())),
            open_delay: None,
        }
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }
}

#[async_trait]
impl SessionFactory for StubFactory {
    type Session = StubDriver;

    async fn open(&self, identity: &IdentityProfile) -> Result<StubDriver, ScraperError> {
        self.opened.lock().unwrap().push(identity.clone());
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.driver.clone())
    }
}

/// 待たずに、要求された待ち時間だけを記録する
#[derive(Default)]
pub struct RecordingPacer {
    pub sleeps: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    fn uniform(&self, lo: f64, _hi: f64) -> f64 {
        lo
    }

    fn chance(&self, _p: f64) -> bool {
        false
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}

/// 確率分岐をすべて通す。待ち時間は記録するだけ
#[derive(Default)]
pub struct EagerPacer {
    pub sleeps: Mutex<Vec<Duration>>,
}

impl EagerPacer {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Pacer for EagerPacer {
    fn uniform(&self, lo: f64, _hi: f64) -> f64 {
        lo
    }

    fn chance(&self, _p: f64) -> bool {
        true
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}

pub fn no_wait() -> WaitRange {
    WaitRange::zero()
}
