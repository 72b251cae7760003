//! ホストプラットフォーム判定

use serde::{Deserialize, Serialize};

/// キーバインドの解決に使うプラットフォーム
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Windows,
    Mac,
    Linux,
    Unknown,
}

impl Platform {
    /// ビルド対象 OS から判定
    pub fn detect() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::Mac
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Unknown
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::detect()
    }
}
