use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::traits::DocumentDriver;

/// 1つの論理フィールドに対する候補セレクタの優先順リスト
///
/// セレクタ文字列の構文はドライバだけが解釈する。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectorChain(Vec<String>);

impl SelectorChain {
    pub fn new(locators: Vec<String>) -> Self {
        Self(locators)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// 先頭から順に試し、最初にマッチした要素を返す
    ///
    /// どれもマッチしなければ `None`。個々のセレクタでのドライバエラーは
    /// 「マッチなし」として扱い、次の候補へ進む。
    pub async fn resolve<D: DocumentDriver>(
        &self,
        driver: &D,
        scope: Option<&D::Element>,
    ) -> Option<D::Element> {
        for locator in self.iter() {
            match driver.query_all(scope, locator).await {
                Ok(found) => {
                    if let Some(first) = found.into_iter().next() {
                        return Some(first);
                    }
                }
                Err(e) => {
                    debug!("Locator '{}' failed, trying next: {}", locator, e);
                }
            }
        }
        None
    }
}

impl From<Vec<&str>> for SelectorChain {
    fn from(locators: Vec<&str>) -> Self {
        Self(locators.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for SelectorChain {
    fn from(locators: Vec<String>) -> Self {
        Self(locators)
    }
}
