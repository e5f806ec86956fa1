use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::config::SelectorConfig;
use crate::selector::SelectorChain;
use crate::traits::DocumentDriver;

use super::types::RawRecord;

const IMAGE_ELEMENTS: &str = "img, source";

fn background_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)url\(\s*['"]?(.*?)['"]?\s*\)"#).expect("static regex")
    })
}

/// インラインスタイルの `background-image: url(...)` からURLを取り出す
pub fn background_image_url(style: &str) -> Option<String> {
    background_url_pattern()
        .captures(style)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|url| !url.is_empty())
}

/// `srcset` の先頭候補のURL部分
fn first_srcset_candidate(srcset: &str) -> &str {
    srcset
        .split(',')
        .next()
        .and_then(|candidate| candidate.split_whitespace().next())
        .unwrap_or("")
}

/// 商品カード1枚から各フィールドの生文字列を読む
///
/// フィールド単位で独立しており、1つの読み取り失敗で他のフィールドは止まらない。
pub struct FieldExtractor<'a, D: DocumentDriver> {
    driver: &'a D,
    selectors: &'a SelectorConfig,
}

impl<'a, D: DocumentDriver> FieldExtractor<'a, D> {
    pub fn new(driver: &'a D, selectors: &'a SelectorConfig) -> Self {
        Self { driver, selectors }
    }

    pub async fn extract(&self, container: &D::Element) -> RawRecord {
        let selectors = self.selectors;
        let mut misses = 0;

        let brand = self.text_of(container, &selectors.brand, &mut misses).await;
        let title = self.text_of(container, &selectors.title, &mut misses).await;
        let original_price = self
            .text_of(container, &selectors.original_price, &mut misses)
            .await;
        let discounted_price = self
            .text_of(container, &selectors.discounted_price, &mut misses)
            .await;
        let discount = self.text_of(container, &selectors.discount, &mut misses).await;
        let detail_link = self.link_of(container, &mut misses).await;
        let image_url = self.image_of(container).await;

        RawRecord {
            brand,
            title,
            original_price,
            discounted_price,
            discount,
            detail_link,
            image_url,
            field_misses: misses,
        }
    }

    async fn text_of(&self, container: &D::Element, chain: &SelectorChain, misses: &mut u32) -> String {
        let Some(element) = chain.resolve(self.driver, Some(container)).await else {
            return String::new();
        };
        match self.driver.read_text(&element).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                debug!("Text read failed: {}", e);
                *misses += 1;
                String::new()
            }
        }
    }

    /// 解決済みの `href` プロパティを優先し、なければ属性値
    async fn link_of(&self, container: &D::Element, misses: &mut u32) -> String {
        let Some(link) = self
            .selectors
            .detail_link
            .resolve(self.driver, Some(container))
            .await
        else {
            return String::new();
        };

        match self.driver.read_property(&link, "href").await {
            Ok(Some(href)) if !href.trim().is_empty() => return href.trim().to_string(),
            Ok(_) => {}
            Err(e) => debug!("href property read failed: {}", e),
        }

        match self.driver.read_attribute(&link, "href").await {
            Ok(href) => href.map(|h| h.trim().to_string()).unwrap_or_default(),
            Err(e) => {
                debug!("href attribute read failed: {}", e);
                *misses += 1;
                String::new()
            }
        }
    }

    /// 画像URL：子孫の img/source の属性 → インラインの background-image
    async fn image_of(&self, container: &D::Element) -> String {
        let mut holders = Vec::new();
        for locator in self.selectors.image_holders.iter() {
            if let Ok(found) = self.driver.query_all(Some(container), locator).await {
                holders.extend(found.into_iter().next());
            }
        }
        holders.push(container.clone());

        for holder in &holders {
            let images = match self.driver.query_all(Some(holder), IMAGE_ELEMENTS).await {
                Ok(images) => images,
                Err(e) => {
                    debug!("Image lookup failed: {}", e);
                    continue;
                }
            };
            for image in &images {
                if let Some(url) = self.image_source(image).await {
                    return url;
                }
            }
        }

        for holder in &holders {
            if let Ok(Some(style)) = self.driver.read_attribute(holder, "style").await {
                if let Some(url) = background_image_url(&style) {
                    return url;
                }
            }
        }

        String::new()
    }

    async fn image_source(&self, image: &D::Element) -> Option<String> {
        for name in &self.selectors.image_attributes {
            match self.driver.read_attribute(image, name).await {
                Ok(Some(value)) => {
                    let value = value.trim();
                    let value = if name == "srcset" {
                        first_srcset_candidate(value)
                    } else {
                        value
                    };
                    if !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
                Ok(None) => {}
                Err(e) => debug!("Image attribute '{}' read failed: {}", name, e),
            }
        }
        None
    }
}
