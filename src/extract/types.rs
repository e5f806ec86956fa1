//! 抽出レコードの型定義

use serde::{Deserialize, Serialize};

/// カード1枚から読み取った生の文字列（空の場合あり）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub brand: String,
    pub title: String,
    pub original_price: String,
    pub discounted_price: String,
    pub discount: String,
    pub detail_link: String,
    pub image_url: String,
    /// ドライバエラーで読めなかったフィールド数
    pub field_misses: u32,
}

/// 正規化済みの商品レコード
///
/// `title` は常に空でない。`Normalizer::normalize` 経由でのみ作られる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub brand: String,
    pub title: String,
    pub original_price: Option<u64>,
    pub discounted_price: Option<u64>,
    pub discount_percent: Option<u32>,
    pub detail_link: Option<String>,
    pub image_url: Option<String>,
    pub description: String,
}

/// CSV の列順
pub const RECORD_COLUMNS: [&str; 8] = [
    "brand",
    "title",
    "original_price",
    "discounted_price",
    "discount_percent",
    "detail_link",
    "image_url",
    "description",
];
