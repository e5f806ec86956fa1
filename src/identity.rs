//! 試行ごとのアイデンティティ（UA・ビューポート・ヘッダ・プロキシ）選択

use std::collections::HashMap;

use rand::seq::SliceRandom;
use tracing::debug;

use crate::config::{IdentityConfig, ViewportSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportClass {
    Desktop,
    Mobile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub class: ViewportClass,
}

impl Viewport {
    pub fn device_scale_factor(&self) -> f64 {
        match self.class {
            ViewportClass::Desktop => 1.0,
            ViewportClass::Mobile => 2.0,
        }
    }

    pub fn is_mobile(&self) -> bool {
        self.class == ViewportClass::Mobile
    }
}

/// 1回の試行で使うクライアント属性の組
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityProfile {
    pub user_agent: String,
    pub viewport: Viewport,
    pub headers: HashMap<String, String>,
    pub proxy: Option<String>,
}

pub trait IdentityProvider: Send + Sync {
    fn select(&self, attempt_number: u32) -> IdentityProfile;
}

/// UA文字列からモバイル端末かを判定
pub fn is_mobile_agent(user_agent: &str) -> bool {
    ["Mobile", "iPhone", "Android"]
        .iter()
        .any(|marker| user_agent.contains(marker))
}

/// 設定のプールから毎回ランダムに選ぶ
#[derive(Debug, Clone)]
pub struct RotatingIdentityPool {
    config: IdentityConfig,
}

impl RotatingIdentityPool {
    pub fn new(config: IdentityConfig) -> Self {
        Self { config }
    }
}

impl IdentityProvider for RotatingIdentityPool {
    fn select(&self, attempt_number: u32) -> IdentityProfile {
        let mut rng = rand::thread_rng();
        let config = &self.config;

        let user_agent = config
            .user_agents
            .choose(&mut rng)
            .cloned()
            .unwrap_or_default();

        let viewport = if is_mobile_agent(&user_agent) {
            viewport_of(config.mobile_viewport, ViewportClass::Mobile)
        } else {
            let size = config
                .viewports
                .choose(&mut rng)
                .copied()
                .unwrap_or(ViewportSize {
                    width: 1280,
                    height: 800,
                });
            viewport_of(size, ViewportClass::Desktop)
        };

        let mut headers = config
            .header_profiles
            .choose(&mut rng)
            .cloned()
            .unwrap_or_default();
        headers.extend(
            config
                .extra_headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        let proxy = config.proxies.choose(&mut rng).cloned();

        debug!(
            "Attempt {} identity: {}x{} {:?}, proxy={:?}",
            attempt_number, viewport.width, viewport.height, viewport.class, proxy
        );

        IdentityProfile {
            user_agent,
            viewport,
            headers,
            proxy,
        }
    }
}

fn viewport_of(size: ViewportSize, class: ViewportClass) -> Viewport {
    Viewport {
        width: size.width,
        height: size.height,
        class,
    }
}
