//! 物理キー状態
//!
//! 物理キーコードごとに押下状態とコールバックを保持するキーテーブル

use super::events::{KeyEvent, KeyEventKind, Modifiers, RawKeyEvent};
use crate::error::{InputError, Result};
use std::collections::HashMap;
use std::fmt;

/// 修飾キーとして扱うキー名
pub const MODIFIER_KEYS: [&str; 5] = ["Control", "Shift", "Alt", "Meta", "AltGraph"];

/// 修飾キー名かどうかを判定
pub fn is_modifier(key: &str) -> bool {
    MODIFIER_KEYS.contains(&key)
}

/// 既知の物理キー（コード, 表示名）
pub const KEY_TABLE: &[(&str, &str)] = &[
    ("Backspace", "Backspace"),
    ("Tab", "Tab"),
    ("Enter", "Enter"),
    ("ShiftLeft", "Shift"),
    ("ShiftRight", "Shift"),
    ("ControlLeft", "Control"),
    ("ControlRight", "Control"),
    ("AltLeft", "Alt"),
    ("AltRight", "Alt"),
    ("Pause", "Pause"),
    ("CapsLock", "CapsLock"),
    ("Escape", "Escape"),
    ("Space", " "),
    ("PageUp", "PageUp"),
    ("PageDown", "PageDown"),
    ("End", "End"),
    ("Home", "Home"),
    ("ArrowLeft", "ArrowLeft"),
    ("ArrowUp", "ArrowUp"),
    ("ArrowRight", "ArrowRight"),
    ("ArrowDown", "ArrowDown"),
    ("PrintScreen", "PrintScreen"),
    ("Insert", "Insert"),
    ("Delete", "Delete"),
    ("NumLock", "NumLock"),
    ("ScrollLock", "ScrollLock"),
    ("AudioVolumeMute", "AudioVolumeMute"),
    ("AudioVolumeDown", "AudioVolumeDown"),
    ("AudioVolumeUp", "AudioVolumeUp"),
    ("LaunchMediaPlayer", "LaunchMediaPlayer"),
    ("LaunchApplication1", "LaunchApplication1"),
    ("LaunchApplication2", "LaunchApplication2"),
    ("MetaLeft", "Meta"),
    ("MetaRight", "Meta"),
    ("ContextMenu", "ContextMenu"),
    ("Numpad0", "0"),
    ("Numpad1", "1"),
    ("Numpad2", "2"),
    ("Numpad3", "3"),
    ("Numpad4", "4"),
    ("Numpad5", "5"),
    ("Numpad6", "6"),
    ("Numpad7", "7"),
    ("Numpad8", "8"),
    ("Numpad9", "9"),
    ("NumpadMultiply", "*"),
    ("NumpadAdd", "+"),
    ("NumpadSubtract", "-"),
    ("NumpadDecimal", "."),
    ("NumpadDivide", "/"),
    ("Semicolon", ";"),
    ("Equal", "="),
    ("Comma", ","),
    ("Minus", "-"),
    ("Period", "."),
    ("Slash", "/"),
    ("Backquote", "`"),
    ("BracketLeft", "["),
    ("Backslash", "\\"),
    ("BracketRight", "]"),
    ("Quote", "'"),
    ("Digit0", "0"),
    ("Digit1", "1"),
    ("Digit2", "2"),
    ("Digit3", "3"),
    ("Digit4", "4"),
    ("Digit5", "5"),
    ("Digit6", "6"),
    ("Digit7", "7"),
    ("Digit8", "8"),
    ("Digit9", "9"),
    ("KeyA", "a"),
    ("KeyB", "b"),
    ("KeyC", "c"),
    ("KeyD", "d"),
    ("KeyE", "e"),
    ("KeyF", "f"),
    ("KeyG", "g"),
    ("KeyH", "h"),
    ("KeyI", "i"),
    ("KeyJ", "j"),
    ("KeyK", "k"),
    ("KeyL", "l"),
    ("KeyM", "m"),
    ("KeyN", "n"),
    ("KeyO", "o"),
    ("KeyP", "p"),
    ("KeyQ", "q"),
    ("KeyR", "r"),
    ("KeyS", "s"),
    ("KeyT", "t"),
    ("KeyU", "u"),
    ("KeyV", "v"),
    ("KeyW", "w"),
    ("KeyX", "x"),
    ("KeyY", "y"),
    ("KeyZ", "z"),
    ("F1", "F1"),
    ("F2", "F2"),
    ("F3", "F3"),
    ("F4", "F4"),
    ("F5", "F5"),
    ("F6", "F6"),
    ("F7", "F7"),
    ("F8", "F8"),
    ("F9", "F9"),
    ("F10", "F10"),
    ("F11", "F11"),
    ("F12", "F12"),
];

/// キーごとのコールバック
pub type KeyHandler = Box<dyn FnMut(&KeyEvent)>;

/// 物理キー1つ分の状態
pub struct Key {
    name: String,
    code: String,
    pressed: bool,
    pressed_handlers: Vec<KeyHandler>,
    released_handlers: Vec<KeyHandler>,
}

impl Key {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            pressed: false,
            pressed_handlers: Vec::new(),
            released_handlers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn is_released(&self) -> bool {
        !self.pressed
    }

    pub fn on_pressed<F>(&mut self, handler: F)
    where
        F: FnMut(&KeyEvent) + 'static,
    {
        self.pressed_handlers.push(Box::new(handler));
    }

    pub fn on_released<F>(&mut self, handler: F)
    where
        F: FnMut(&KeyEvent) + 'static,
    {
        self.released_handlers.push(Box::new(handler));
    }

    /// 状態遷移があった場合のみ状態を更新しコールバックを呼ぶ
    ///
    /// オートリピートによる押下→押下は遷移ではないため何もしない。
    pub fn dispatch(&mut self, kind: KeyEventKind, event: &KeyEvent) -> bool {
        let pressed = kind == KeyEventKind::Pressed;
        if self.pressed == pressed {
            return false;
        }

        self.pressed = pressed;

        let handlers = if pressed {
            &mut self.pressed_handlers
        } else {
            &mut self.released_handlers
        };
        for handler in handlers.iter_mut() {
            handler(event);
        }
        true
    }
}

impl Key {
    /// コールバックを呼ばずに解放状態へ戻す
    fn reset(&mut self) {
        self.pressed = false;
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("name", &self.name)
            .field("code", &self.code)
            .field("pressed", &self.pressed)
            .field("pressed_handlers", &self.pressed_handlers.len())
            .field("released_handlers", &self.released_handlers.len())
            .finish()
    }
}

/// 物理キーコード → [`Key`] のテーブル
///
/// 最新の修飾キー状態と生イベントも保持する。
#[derive(Debug)]
pub struct KeyTable {
    keys: HashMap<String, Key>,
    modifiers: Modifiers,
    current_event: Option<RawKeyEvent>,
}

impl KeyTable {
    /// 既知キーのテーブルを作成
    pub fn new() -> Self {
        let keys = KEY_TABLE
            .iter()
            .map(|(code, name)| (code.to_string(), Key::new(*name, *code)))
            .collect();

        Self {
            keys,
            modifiers: Modifiers::default(),
            current_event: None,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, code: &str) -> Option<&Key> {
        self.keys.get(code)
    }

    /// コードからキーを取得。未知のコードはエラー
    pub fn key_by_code(&self, code: &str) -> Result<&Key> {
        self.keys.get(code).ok_or_else(|| InputError::UnknownKeyCode {
            code: code.to_string(),
        })
    }

    fn key_by_code_mut(&mut self, code: &str) -> Result<&mut Key> {
        self.keys.get_mut(code).ok_or_else(|| InputError::UnknownKeyCode {
            code: code.to_string(),
        })
    }

    pub fn on_pressed<F>(&mut self, code: &str, handler: F) -> Result<()>
    where
        F: FnMut(&KeyEvent) + 'static,
    {
        self.key_by_code_mut(code)?.on_pressed(handler);
        Ok(())
    }

    pub fn on_released<F>(&mut self, code: &str, handler: F) -> Result<()>
    where
        F: FnMut(&KeyEvent) + 'static,
    {
        self.key_by_code_mut(code)?.on_released(handler);
        Ok(())
    }

    /// 生イベントから修飾キー状態を更新
    pub fn handle_event(&mut self, event: &RawKeyEvent) {
        self.modifiers = Modifiers::from(event);
        self.current_event = Some(event.clone());
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn current_event(&self) -> Option<&RawKeyEvent> {
        self.current_event.as_ref()
    }

    /// 対応するキーへイベントを配送する。未知のコードはログのみで無視
    pub fn dispatch(&mut self, kind: KeyEventKind, event: &KeyEvent) -> bool {
        match self.key_by_code_mut(&event.code) {
            Ok(key) => key.dispatch(kind, event),
            Err(err) => {
                log::warn!("{}", err);
                false
            }
        }
    }

    pub fn is_pressed(&self, code: &str) -> bool {
        self.keys.get(code).map(Key::is_pressed).unwrap_or(false)
    }

    /// 押下中のキーコード（ソート済み）
    pub fn pressed_codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self
            .keys
            .values()
            .filter(|key| key.is_pressed())
            .map(Key::code)
            .collect();
        codes.sort_unstable();
        codes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Key> {
        self.keys.values()
    }

    /// 全キーを解放状態に戻し、修飾キー状態と直近イベントを破棄する
    ///
    /// 解放イベントを受け取れない間（キーボード無効化中など）の押下状態を捨てる。
    /// コールバックは呼ばれない。
    pub fn release_all(&mut self) {
        for key in self.keys.values_mut() {
            key.reset();
        }
        self.modifiers = Modifiers::default();
        self.current_event = None;
    }
}

impl Default for KeyTable {
    fn default() -> Self {
        Self::new()
    }
}
