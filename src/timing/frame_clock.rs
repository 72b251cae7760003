//! フレームクロック
//!
//! ホストの描画ループから渡される単調増加タイムスタンプを
//! フレームステップに変換する。FPS 制限時はフレーム間隔に満たない呼び出しを捨てる。
//! 停止中の時間は数えない稼働時間 (`elapsed`) も併せて進め、
//! スケジューラの期限判定はこちらで行う。

use crate::config::FrameConfig;

/// 1フレーム分のステップ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStep {
    /// フレーム時刻（ミリ秒）
    pub time: f64,
    /// 前フレームからの経過（ミリ秒）
    pub delta: f64,
    /// ループ稼働中に積算した時間（ミリ秒）
    pub elapsed: f64,
}

#[derive(Debug, Clone)]
pub struct FrameClock {
    limit_fps: bool,
    frame_rate: f64,
    frame_duration: f64,
    last_frame: f64,
    last_seen: f64,
    running_time: f64,
    running: bool,
}

impl FrameClock {
    pub fn new(limit_fps: bool, frame_rate: f64) -> Self {
        let frame_rate = if frame_rate > 0.0 { frame_rate } else { 60.0 };
        Self {
            limit_fps,
            frame_rate,
            frame_duration: 1000.0 / frame_rate,
            last_frame: 0.0,
            last_seen: 0.0,
            running_time: 0.0,
            running: false,
        }
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn frame_duration(&self) -> f64 {
        self.frame_duration
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// 停止中を除いた稼働時間
    pub fn elapsed(&self) -> f64 {
        self.running_time
    }

    /// ループ開始。既に動作中なら何もしない
    pub fn start(&mut self, now: f64) {
        if self.running {
            return;
        }
        self.running = true;
        self.last_frame = now;
        self.last_seen = now;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// ホストの tick を処理し、描画すべきフレームならステップを返す
    pub fn step(&mut self, now: f64) -> Option<FrameStep> {
        if !self.running {
            return None;
        }

        // 巻き戻ったタイムスタンプでは稼働時間を減らさない
        self.running_time += (now - self.last_seen).max(0.0);
        self.last_seen = now;

        let delta = now - self.last_frame;

        if self.limit_fps {
            if delta < self.frame_duration {
                return None;
            }
            // 余りを持ち越してドリフトを防ぐ
            self.last_frame = now - (delta % self.frame_duration);
        } else {
            self.last_frame = now;
        }

        Some(FrameStep {
            time: now,
            delta,
            elapsed: self.running_time,
        })
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(false, 60.0)
    }
}

impl From<&FrameConfig> for FrameClock {
    fn from(config: &FrameConfig) -> Self {
        Self::new(config.limit_fps, config.frame_rate)
    }
}
