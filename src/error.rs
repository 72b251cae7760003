//! エラーハンドリングシステム
//!
//! 入力認識エンジン全体で使用される統一されたエラー型を定義
//! 構築時の検証エラーは即座に呼び出し元へ返し、実行時の照合ミスは無視する

use thiserror::Error;

/// 入力エンジン全体のエラー型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    /// キーバインド文字列が文法に合わない
    #[error("Invalid key binding: {chord}")]
    InvalidBinding { chord: String },

    /// コンボのキー列が不正（空文字列など）
    #[error("Invalid key combo: {keys:?}")]
    InvalidCombo { keys: String },

    /// 未知のイベント種別
    #[error("Invalid event type: {name}")]
    InvalidEventType { name: String },

    /// 呼び出し可能なハンドラーが見つからない
    #[error("Handler must be a function: {name}")]
    InvalidHandler { name: String },

    /// キーテーブルに存在しない物理キーコード（通常はログのみ）
    #[error("Key with code {code} is not defined")]
    UnknownKeyCode { code: String },

    #[error("Key combo already registered: {keys}")]
    DuplicateCombo { keys: String },

    #[error("Key binding already registered: {chord}")]
    DuplicateBinding { chord: String },

    /// `require` が未登録のバインドを参照している
    #[error("Required key binding is not registered: {chord}")]
    UnknownRequirement { chord: String },

    /// 設定ファイル・リプレイスクリプトの読み込みエラー
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl From<serde_json::Error> for InputError {
    fn from(error: serde_json::Error) -> Self {
        InputError::Config {
            message: error.to_string(),
        }
    }
}

impl From<std::io::Error> for InputError {
    fn from(error: std::io::Error) -> Self {
        InputError::Config {
            message: error.to_string(),
        }
    }
}

/// プロジェクト標準のResult型
pub type Result<T> = std::result::Result<T, InputError>;
