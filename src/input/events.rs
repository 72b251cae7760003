//! 入力イベント定義
//!
//! ホストから受け取る生イベントと、リスナーへ再送出するイベントの型

use super::binding::BindingHandle;
use super::combo::ComboHandle;
use crate::error::{InputError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 押下・解放の別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyEventKind {
    #[serde(alias = "down", alias = "keydown")]
    Pressed,
    #[serde(alias = "up", alias = "keyup")]
    Released,
}

/// ホストのキーボードイベント
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawKeyEvent {
    pub kind: KeyEventKind,
    /// 表示上のキー（`"a"`, `"Control"`, `"ArrowUp"` など）
    pub key: String,
    /// 物理キーコード（`"KeyA"`, `"ControlLeft"` など）
    pub code: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub meta: bool,
    /// OS のオートリピートによる押下
    #[serde(default)]
    pub repeat: bool,
    #[serde(default)]
    pub caps_lock: bool,
    #[serde(default)]
    pub num_lock: bool,
    #[serde(default)]
    pub scroll_lock: bool,
    /// イベント発生時刻（ミリ秒、フレームクロックと同じ時間軸）
    #[serde(default)]
    pub time: f64,
}

impl RawKeyEvent {
    pub fn new(kind: KeyEventKind, key: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
            code: code.into(),
            ctrl: false,
            alt: false,
            shift: false,
            meta: false,
            repeat: false,
            caps_lock: false,
            num_lock: false,
            scroll_lock: false,
            time: 0.0,
        }
    }

    pub fn pressed(key: impl Into<String>, code: impl Into<String>) -> Self {
        Self::new(KeyEventKind::Pressed, key, code)
    }

    pub fn released(key: impl Into<String>, code: impl Into<String>) -> Self {
        Self::new(KeyEventKind::Released, key, code)
    }

    pub fn at(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }
}

/// 修飾キー・ロックキーの状態スナップショット
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Modifiers {
    pub is_ctrl: bool,
    pub is_alt: bool,
    pub is_shift: bool,
    pub is_meta: bool,
    pub is_repeating: bool,
    pub is_caps_lock: bool,
    pub is_num_lock: bool,
    pub is_scroll_lock: bool,
}

impl From<&RawKeyEvent> for Modifiers {
    fn from(event: &RawKeyEvent) -> Self {
        Self {
            is_ctrl: event.ctrl,
            is_alt: event.alt,
            is_shift: event.shift,
            is_meta: event.meta,
            is_repeating: event.repeat,
            is_caps_lock: event.caps_lock,
            is_num_lock: event.num_lock,
            is_scroll_lock: event.scroll_lock,
        }
    }
}

/// 正規化済みキーイベント（`PRESSED` / `RELEASED` のペイロード）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyEvent {
    pub key: String,
    pub code: String,
    #[serde(flatten)]
    pub modifiers: Modifiers,
    #[serde(skip)]
    pub raw: RawKeyEvent,
}

impl KeyEvent {
    pub fn from_raw(raw: &RawKeyEvent) -> Self {
        Self {
            key: raw.key.clone(),
            code: raw.code.clone(),
            modifiers: Modifiers::from(raw),
            raw: raw.clone(),
        }
    }

    pub fn is_repeating(&self) -> bool {
        self.modifiers.is_repeating
    }
}

/// リスナー登録可能なイベント種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Pressed,
    Released,
    ComboMatched,
    ComboFailed,
    BindingMatched,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Pressed,
        EventKind::Released,
        EventKind::ComboMatched,
        EventKind::ComboFailed,
        EventKind::BindingMatched,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Pressed => "pressed",
            EventKind::Released => "released",
            EventKind::ComboMatched => "keycombomatched",
            EventKind::ComboFailed => "keycombofailed",
            EventKind::BindingMatched => "keybindingmatched",
        }
    }
}

impl From<KeyEventKind> for EventKind {
    fn from(kind: KeyEventKind) -> Self {
        match kind {
            KeyEventKind::Pressed => EventKind::Pressed,
            KeyEventKind::Released => EventKind::Released,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| InputError::InvalidEventType {
                name: s.to_string(),
            })
    }
}

/// コンボ判定の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComboTestReason {
    TimeLimitExceeded,
    InvalidKey,
    OrderMismatch,
    Matched,
    Pending,
}

impl ComboTestReason {
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            ComboTestReason::TimeLimitExceeded
                | ComboTestReason::InvalidKey
                | ComboTestReason::OrderMismatch
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComboTestReason::TimeLimitExceeded => "TIME_LIMIT_EXCEEDED",
            ComboTestReason::InvalidKey => "INVALID_KEY",
            ComboTestReason::OrderMismatch => "ORDER_MISMATCH",
            ComboTestReason::Matched => "MATCHED",
            ComboTestReason::Pending => "PENDING",
        }
    }
}

impl fmt::Display for ComboTestReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// コンボイベントのペイロード
#[derive(Debug, Clone)]
pub struct ComboEvent {
    pub combo: ComboHandle,
    pub reason: ComboTestReason,
}

/// キーバインドイベントのペイロード
#[derive(Debug, Clone)]
pub struct BindingEvent {
    pub binding: BindingHandle,
    /// 成立時に押下中だった物理キーコード
    pub key_codes: Vec<String>,
}

/// リスナーへ送出されるイベント
#[derive(Debug, Clone)]
pub enum InputEvent {
    Pressed(KeyEvent),
    Released(KeyEvent),
    ComboMatched(ComboEvent),
    ComboFailed(ComboEvent),
    BindingMatched(BindingEvent),
}

impl InputEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InputEvent::Pressed(_) => EventKind::Pressed,
            InputEvent::Released(_) => EventKind::Released,
            InputEvent::ComboMatched(_) => EventKind::ComboMatched,
            InputEvent::ComboFailed(_) => EventKind::ComboFailed,
            InputEvent::BindingMatched(_) => EventKind::BindingMatched,
        }
    }
}
