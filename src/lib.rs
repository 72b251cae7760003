//! game-input - フレーム同期型のキーボード入力認識エンジン
//!
//! 物理キー状態の追跡、キーコンボ・キーバインドの認識、
//! フレームクロックに同期したタイマーを提供する。

// コアモジュール
pub mod config;
pub mod error;
pub mod logging;
pub mod platform;

// 時間管理
pub mod timing;

// 入力認識
pub mod input;

// ヘッドレスホスト
pub mod replay;

// 公開API
pub use config::{Actions, InputConfig};
pub use error::{InputError, Result};
pub use input::{
    BindingConfig, BindingHandle, BindingMode, ComboConfig, ComboHandle, EventKind,
    InputDispatcher, InputEvent, RawKeyEvent,
};
pub use platform::Platform;
pub use replay::{Replay, ReplayScript, ReplayStep};
pub use timing::{FrameClock, FrameScheduler, TimeoutId};
