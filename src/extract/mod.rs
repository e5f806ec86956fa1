//! 抽出・正規化パイプライン
//!
//! カード列挙 → `FieldExtractor`（セレクタのフォールバックチェーン）→
//! `Normalizer`（価格・割引率・リンクの型付け）の順に処理する。

mod fields;
pub mod normalize;
mod pipeline;
mod types;

pub use fields::{background_image_url, FieldExtractor};
pub use normalize::{clean_text, parse_discount, parse_price, resolve_link, sanitize_price, Normalizer};
pub use pipeline::{ExtractionPipeline, ExtractionStats};
pub use types::{NormalizedRecord, RawRecord, RECORD_COLUMNS};
