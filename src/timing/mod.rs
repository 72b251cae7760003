//! 時間管理モジュール
//!
//! フレームクロックとフレーム同期タイムアウトを提供

pub mod frame_clock;
pub mod scheduler;

// 公開API
pub use frame_clock::{FrameClock, FrameStep};
pub use scheduler::{FrameScheduler, TimeoutCallback, TimeoutId};
