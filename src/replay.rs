//! 入力リプレイ
//!
//! キーイベントとフレームティックを並べた JSON スクリプトをディスパッチャへ流し、
//! 送出されたイベントを記録する。ヘッドレスなホストとして動作確認に使う。

use crate::error::{InputError, Result};
use crate::input::{InputDispatcher, InputEvent, RawKeyEvent};
use crate::timing::FrameClock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// スクリプトの1ステップ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayStep {
    /// ホストのキーボードイベント
    Key(RawKeyEvent),
    /// フレームクロックを進める
    Tick { time: f64 },
    /// フレームループを再開
    Start { time: f64 },
    /// フレームループを停止（タイマーの期限判定も止まる）
    Stop,
}

/// リプレイスクリプト
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplayScript {
    pub steps: Vec<ReplayStep>,
}

impl ReplayScript {
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
}

/// 出力用のイベント記録
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub time: f64,
    pub event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chord: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub key_codes: Vec<String>,
}

impl EventRecord {
    pub fn new(time: f64, event: &InputEvent) -> Self {
        let mut record = Self {
            time,
            event: event.kind().as_str(),
            key: None,
            code: None,
            combo: None,
            reason: None,
            chord: None,
            key_codes: Vec::new(),
        };

        match event {
            InputEvent::Pressed(key) | InputEvent::Released(key) => {
                record.key = Some(key.key.clone());
                record.code = Some(key.code.clone());
            }
            InputEvent::ComboMatched(combo) | InputEvent::ComboFailed(combo) => {
                record.combo = Some(combo.combo.id());
                record.reason = Some(combo.reason.as_str());
            }
            InputEvent::BindingMatched(binding) => {
                record.chord = Some(binding.binding.chord());
                record.key_codes = binding.key_codes.clone();
            }
        }
        record
    }
}

/// スクリプトを再生するドライバ
#[derive(Debug)]
pub struct Replay {
    dispatcher: InputDispatcher,
    clock: FrameClock,
}

impl Replay {
    /// クロックは時刻 0 で開始済みの状態になる
    pub fn new(dispatcher: InputDispatcher, mut clock: FrameClock) -> Self {
        clock.start(0.0);
        Self { dispatcher, clock }
    }

    pub fn dispatcher(&self) -> &InputDispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut InputDispatcher {
        &mut self.dispatcher
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// 1ステップ実行し、送出されたイベントを返す
    pub fn step(&mut self, step: &ReplayStep) -> Vec<EventRecord> {
        match step {
            ReplayStep::Key(raw) => self
                .dispatcher
                .handle_event(raw)
                .iter()
                .map(|event| EventRecord::new(raw.time, event))
                .collect(),
            ReplayStep::Tick { time } => {
                // 期限判定は停止中を除いた稼働時間で行う
                if let Some(frame) = self.clock.step(*time) {
                    let fired = self.dispatcher.tick(frame.elapsed);
                    if fired > 0 {
                        log::debug!(
                            "{} timeouts fired at {} (elapsed {})",
                            fired,
                            frame.time,
                            frame.elapsed
                        );
                    }
                }
                Vec::new()
            }
            ReplayStep::Start { time } => {
                self.clock.start(*time);
                Vec::new()
            }
            ReplayStep::Stop => {
                self.clock.stop();
                Vec::new()
            }
        }
    }

    /// スクリプト全体を再生する
    pub fn run(&mut self, script: &ReplayScript) -> Vec<EventRecord> {
        script
            .steps
            .iter()
            .flat_map(|step| self.step(step))
            .collect()
    }
}
