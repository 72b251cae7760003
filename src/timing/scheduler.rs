//! フレーム同期タイムアウト
//!
//! 壁時計タイマーではなく、描画ループの tick ごとに経過フレーム時間で
//! 期限切れを判定する遅延コールバックのレジストリ。
//! tick に渡す時刻はループ稼働中だけ進む時間 (`FrameStep::elapsed`) とし、
//! 停止していた時間は有効期間に数えない。

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

/// 登録済みタイムアウトの識別子
///
/// 登録順に採番され、解放（発火または明示的なクリア）されるまで再利用されない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeoutId(u32);

impl TimeoutId {
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TimeoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// タイムアウトコールバック
pub type TimeoutCallback = Box<dyn FnOnce()>;

struct FrameTimeout {
    callback: TimeoutCallback,
    duration: f64,
    created_at: f64,
}

impl FrameTimeout {
    fn is_expired(&self, now: f64) -> bool {
        now - self.created_at >= self.duration
    }
}

#[derive(Default)]
struct SchedulerState {
    timeouts: BTreeMap<TimeoutId, FrameTimeout>,
    released: BTreeSet<u32>,
    next_id: u32,
    now: f64,
}

impl SchedulerState {
    fn allocate_id(&mut self) -> TimeoutId {
        if let Some(id) = self.released.pop_first() {
            return TimeoutId(id);
        }
        let id = self.next_id;
        self.next_id += 1;
        TimeoutId(id)
    }

    fn release(&mut self, id: TimeoutId) -> Option<FrameTimeout> {
        let timeout = self.timeouts.remove(&id)?;
        self.released.insert(id.0);
        Some(timeout)
    }
}

/// フレーム時間駆動のタイムアウトスケジューラ
///
/// ディスパッチャーが生成して所有し、コンボ・キーバインドへ `Rc` で共有する。
/// 全処理はシングルスレッドで、ロックは不要。
#[derive(Default)]
pub struct FrameScheduler {
    state: RefCell<SchedulerState>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 共有用に `Rc` で包んだスケジューラを作成
    pub fn shared() -> Rc<Self> {
        Rc::new(Self::new())
    }

    /// 現在のフレーム時刻（最後の tick の時刻）からの遅延コールバックを登録
    pub fn create_timeout<F>(&self, duration: f64, callback: F) -> TimeoutId
    where
        F: FnOnce() + 'static,
    {
        let mut state = self.state.borrow_mut();
        let id = state.allocate_id();
        let created_at = state.now;
        state.timeouts.insert(
            id,
            FrameTimeout {
                callback: Box::new(callback),
                duration: duration.max(0.0),
                created_at,
            },
        );
        log::trace!("timeout {} registered ({} ms at {})", id, duration, created_at);
        id
    }

    /// 登録済みタイムアウトを取り消す。コールバックは呼ばれない
    pub fn clear_timeout(&self, id: TimeoutId) -> bool {
        self.state.borrow_mut().release(id).is_some()
    }

    /// タイムアウトが未発火で登録されているか
    pub fn contains(&self, id: TimeoutId) -> bool {
        self.state.borrow().timeouts.contains_key(&id)
    }

    /// 未発火のタイムアウト数
    pub fn pending(&self) -> usize {
        self.state.borrow().timeouts.len()
    }

    /// 最後に観測したフレーム時刻
    pub fn now(&self) -> f64 {
        self.state.borrow().now
    }

    /// フレーム tick。期限切れのタイムアウトを登録解除してから ID 順に発火する
    ///
    /// 発火したコールバック数を返す。コールバック内で登録された新しい
    /// タイムアウトは次の tick から判定される。
    pub fn tick(&self, now: f64) -> usize {
        let expired: Vec<(TimeoutId, TimeoutCallback)> = {
            let mut state = self.state.borrow_mut();
            state.now = now;
            let ids: Vec<TimeoutId> = state
                .timeouts
                .iter()
                .filter(|(_, timeout)| timeout.is_expired(now))
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| state.release(id).map(|timeout| (id, timeout.callback)))
                .collect()
        };

        let fired = expired.len();
        for (id, callback) in expired {
            log::debug!("timeout {} fired at {}", id, now);
            callback();
        }
        fired
    }

    /// 全タイムアウトを破棄する（ディスパッチャー破棄時）
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.timeouts.clear();
        state.released.clear();
        state.next_id = 0;
    }
}

impl fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("FrameScheduler")
            .field("pending", &state.timeouts.len())
            .field("now", &state.now)
            .finish()
    }
}
