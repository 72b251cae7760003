//! 入力設定
//!
//! コンボ・キーバインド・フレームクロックの設定を JSON から読み込む。
//! 成立時の処理は名前で指定し、[`Actions`] に登録された関数へ解決する。

use crate::error::{InputError, Result};
use crate::input::binding::{BindingMode, PlatformChords};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::rc::Rc;

/// 入力設定全体
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub frame: FrameConfig,
    pub combos: Vec<ComboSpec>,
    pub bindings: Vec<BindingSpec>,
}

impl InputConfig {
    pub fn from_json_str(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|err| InputError::Config {
            message: format!("{}: {}", path.display(), err),
        })?;
        Self::from_json_str(&source)
    }

    /// 設定内で参照されているアクション名（重複なし、出現順）
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        let referenced = self
            .combos
            .iter()
            .filter_map(|combo| combo.action.as_deref())
            .chain(
                self.bindings
                    .iter()
                    .filter_map(|binding| binding.action.as_deref()),
            );
        for name in referenced {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// フレームクロック設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub limit_fps: bool,
    pub frame_rate: f64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            limit_fps: false,
            frame_rate: 60.0,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_binding_duration() -> Option<f64> {
    Some(0.0)
}

/// コンボ定義。`time_limit`・`duration` の `null` / 省略は無制限
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboSpec {
    pub keys: String,
    #[serde(default)]
    pub time_limit: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default = "default_true")]
    pub ordered: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub action: Option<String>,
}

/// 依存先バインドの指定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequireSpec {
    pub chord: String,
    #[serde(default)]
    pub strict: bool,
}

/// キーバインド定義。`duration` は省略時 0（一瞬だけ）、`null` で無制限
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingSpec {
    pub chord: String,
    #[serde(default)]
    pub platforms: Option<PlatformChords>,
    #[serde(default)]
    pub require: Option<RequireSpec>,
    #[serde(default)]
    pub mode: BindingMode,
    #[serde(default = "default_binding_duration")]
    pub duration: Option<f64>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub action: Option<String>,
}

/// アクション関数。引数は成立したコンボの ID またはバインドのコード文字列
pub type Action = Rc<dyn Fn(&str)>;

/// 名前付きアクションの登録表
#[derive(Default, Clone)]
pub struct Actions {
    handlers: HashMap<String, Action>,
}

impl Actions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&str) + 'static,
    {
        self.handlers.insert(name.into(), Rc::new(handler));
    }

    pub fn get(&self, name: &str) -> Result<Action> {
        self.handlers
            .get(name)
            .cloned()
            .ok_or_else(|| InputError::InvalidHandler {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for Actions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("Actions").field("names", &names).finish()
    }
}
