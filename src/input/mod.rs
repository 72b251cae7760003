//! 入力処理モジュール
//!
//! 物理キー状態、コンボ・キーバインド認識、ディスパッチャを提供

pub mod binding;
pub mod combo;
pub mod dispatcher;
pub mod events;
pub mod held_keys;
pub mod keys;

// 公開API
pub use binding::{
    BindingConfig, BindingHandle, BindingMode, BindingRecognizer, PlatformChords, Requirement,
};
pub use combo::{ComboConfig, ComboHandle, ComboRecognizer};
pub use dispatcher::{EventHandler, InputDispatcher, ListenerId};
pub use events::{
    BindingEvent, ComboEvent, ComboTestReason, EventKind, InputEvent, KeyEvent, KeyEventKind,
    Modifiers, RawKeyEvent,
};
pub use held_keys::HeldKeys;
pub use keys::{is_modifier, Key, KeyTable};
