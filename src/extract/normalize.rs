//! 生文字列から型付きの値への変換（I/Oなし・失敗しない）

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use super::types::{NormalizedRecord, RawRecord};

fn discount_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([0-9]+)%").expect("static regex"))
}

fn disallowed_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^\w\s\-.,!?()&%]").expect("static regex"))
}

/// 数字以外をすべて取り除く
///
/// 小数点も取り除かれる（"12.50" → "1250"）。値は通貨の最小単位を区別しない
/// 整数として扱う。
pub fn sanitize_price(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

/// `sanitize_price` の結果を整数化。空・桁あふれは `None`
pub fn parse_price(text: &str) -> Option<u64> {
    let digits = sanitize_price(text);
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// `%` の直前にある最初の数字列を割引率として読む
pub fn parse_discount(text: &str) -> Option<u32> {
    discount_pattern()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// 相対リンクを `base_url` 基準で絶対URLにする
///
/// スキームを持つ入力はそのまま返す。空文字や解決できない場合は `None`。
pub fn resolve_link(raw: &str, base_url: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if Url::parse(raw).is_ok() {
        return Some(raw.to_string());
    }
    let base = Url::parse(base_url).ok()?;
    base.join(raw).ok().map(|url| url.to_string())
}

/// 空白の連続を1つにまとめ、許可外の文字を除去して前後を詰める
pub fn clean_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    disallowed_chars()
        .replace_all(&collapsed, "")
        .trim()
        .to_string()
}

/// `RawRecord` → `NormalizedRecord`
#[derive(Debug, Clone)]
pub struct Normalizer {
    base_url: String,
}

impl Normalizer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// タイトルが空になるレコードは `None`
    pub fn normalize(&self, raw: &RawRecord) -> Option<NormalizedRecord> {
        let title = clean_text(&raw.title);
        if title.is_empty() {
            return None;
        }
        let brand = clean_text(&raw.brand);
        let description = clean_text(&format!("{} {}", brand, title));
        let image_url = raw.image_url.trim();

        Some(NormalizedRecord {
            brand,
            title,
            original_price: parse_price(&raw.original_price),
            discounted_price: parse_price(&raw.discounted_price),
            discount_percent: parse_discount(&raw.discount),
            detail_link: resolve_link(&raw.detail_link, &self.base_url),
            image_url: (!image_url.is_empty()).then(|| image_url.to_string()),
            description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_price_strips_currency_and_separators() {
        assert_eq!(sanitize_price("₹1,299"), "1299");
        assert_eq!(sanitize_price("Rs. 2,499 only"), "2499");
        assert_eq!(sanitize_price(""), "");
        assert_eq!(sanitize_price("MRP"), "");
        // 小数点も落ちる
        assert_eq!(sanitize_price("$12.50"), "1250");
    }

    #[test]
    fn test_sanitize_price_is_idempotent() {
        for input in ["₹1,299", "(60% OFF)", "", "abc", "१२३ 45", "9,99,999.00"] {
            let once = sanitize_price(input);
            assert_eq!(sanitize_price(&once), once, "input: {:?}", input);
            assert!(once.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("₹1,299"), Some(1299));
        assert_eq!(parse_price("N/A"), None);
        assert_eq!(parse_price("99999999999999999999999"), None);
    }

    #[test]
    fn test_parse_discount() {
        assert_eq!(parse_discount("(60% OFF)"), Some(60));
        assert_eq!(parse_discount("no discount"), None);
        assert_eq!(parse_discount("Save 20 now, 35% off"), Some(35));
        assert_eq!(parse_discount("% OFF"), None);
    }

    #[test]
    fn test_resolve_link() {
        assert_eq!(
            resolve_link("/p/123", "https://example.com/s/cat").as_deref(),
            Some("https://example.com/p/123")
        );
        assert_eq!(
            resolve_link("https://x.com/a", "https://example.com").as_deref(),
            Some("https://x.com/a")
        );
        assert_eq!(
            resolve_link("item/9", "https://example.com/s/cat").as_deref(),
            Some("https://example.com/s/item/9")
        );
        assert_eq!(resolve_link("", "https://example.com"), None);
        assert_eq!(resolve_link("/p/1", "not a url"), None);
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Slim   Fit\n Jeans  "), "Slim Fit Jeans");
        assert_eq!(clean_text("Tee ★ (Pack of 2) & more!"), "Tee  (Pack of 2) & more!");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_normalize_drops_untitled_records() {
        let normalizer = Normalizer::new("https://example.com/s/cat");
        let raw = RawRecord {
            brand: "LEVIS".into(),
            title: "   ".into(),
            original_price: "₹1,299".into(),
            ..Default::default()
        };
        assert!(normalizer.normalize(&raw).is_none());
    }

    #[test]
    fn test_normalize_full_record() {
        let normalizer = Normalizer::new("https://example.com/s/cat");
        let raw = RawRecord {
            brand: " LEVIS ".into(),
            title: "Slim  Fit Jeans".into(),
            original_price: "₹1,299".into(),
            discounted_price: "₹1,169".into(),
            discount: "(10% OFF)".into(),
            detail_link: "/p/460".into(),
            image_url: "https://cdn.example.com/460.jpg".into(),
            field_misses: 0,
        };
        let record = normalizer.normalize(&raw).unwrap();

        assert_eq!(record.brand, "LEVIS");
        assert_eq!(record.title, "Slim Fit Jeans");
        assert_eq!(record.original_price, Some(1299));
        assert_eq!(record.discounted_price, Some(1169));
        assert_eq!(record.discount_percent, Some(10));
        assert_eq!(record.detail_link.as_deref(), Some("https://example.com/p/460"));
        assert_eq!(record.image_url.as_deref(), Some("https://cdn.example.com/460.jpg"));
        assert_eq!(record.description, "LEVIS Slim Fit Jeans");
    }

    #[test]
    fn test_normalize_missing_optionals_become_absent() {
        let normalizer = Normalizer::new("https://example.com");
        let raw = RawRecord {
            title: "Plain Tee".into(),
            ..Default::default()
        };
        let record = normalizer.normalize(&raw).unwrap();

        assert_eq!(record.brand, "");
        assert_eq!(record.original_price, None);
        assert_eq!(record.discount_percent, None);
        assert_eq!(record.detail_link, None);
        assert_eq!(record.image_url, None);
        assert_eq!(record.description, "Plain Tee");
    }
}
