//! 押下中キーのバッファ
//!
//! キーバインド照合に使う、押された順のキー列を管理する。

use super::keys::is_modifier;

/// バッファ内のキー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldKey {
    pub code: String,
    pub name: String,
}

/// 押下中キーのバッファ
///
/// - 修飾キーを押すと非修飾キーは捨てられ、修飾キーは押された順に残る
/// - 修飾キーを離すとバッファ全体が空になる
/// - 非修飾キーを離すとそのキーだけが取り除かれる
/// - 最後の修飾キーが `Meta` の間、非修飾キーは照合後にバッファへ残らない
///   （`Meta` 押下中はホストが解放イベントを送らないことがある）
#[derive(Debug, Clone, Default)]
pub struct HeldKeys {
    keys: Vec<HeldKey>,
    last_modifier: Option<String>,
}

impl HeldKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, name: &str, code: &str) {
        if is_modifier(name) {
            self.keys
                .retain(|held| is_modifier(&held.name) && held.name != name);
            self.last_modifier = Some(name.to_string());
        } else if self.keys.iter().any(|held| held.code == code) {
            return;
        }

        self.keys.push(HeldKey {
            code: code.to_string(),
            name: name.to_string(),
        });
    }

    pub fn release(&mut self, name: &str, code: &str) {
        if is_modifier(name) {
            self.clear();
        } else {
            self.keys.retain(|held| held.code != code);
        }
    }

    /// 照合が終わった後に呼ぶ。`Meta` 押下中の非修飾キーを取り除く
    pub fn settle(&mut self, name: &str, code: &str) {
        if self.last_modifier.as_deref() == Some("Meta") && !is_modifier(name) {
            self.keys.retain(|held| held.code != code);
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.keys.iter().map(|held| held.name.as_str()).collect()
    }

    pub fn codes(&self) -> Vec<String> {
        self.keys.iter().map(|held| held.code.clone()).collect()
    }

    pub fn last_modifier(&self) -> Option<&str> {
        self.last_modifier.as_deref()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.last_modifier = None;
    }
}
