//! キーコンボ認識
//!
//! 順序付き（または順不同）のキー列を制限時間内に入力したかを判定する状態機械。
//! 各コンボは `idle → pending → {matched | failed} → idle` を遷移し、
//! 失敗したコンボは保留中のコンボがなくなった時点でまとめてリセットされる。

use super::events::{ComboEvent, ComboTestReason};
use crate::error::{InputError, Result};
use crate::timing::{FrameScheduler, TimeoutId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// コンボ成立時のコールバック
pub type ComboCallback = Box<dyn FnMut()>;

/// コンボ生成設定
pub struct ComboConfig {
    /// キー間の最大遅延（ミリ秒）。`None` は無制限
    pub time_limit: Option<f64>,
    /// 成立後に有効状態を保つ時間（ミリ秒）。`None` は明示的に解除するまで
    pub duration: Option<f64>,
    /// 定義順どおりの入力を要求するか
    pub ordered: bool,
    pub enabled: bool,
    pub on_matched: Option<ComboCallback>,
}

impl ComboConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time_limit(mut self, millis: f64) -> Self {
        self.time_limit = Some(millis);
        self
    }

    pub fn duration(mut self, millis: f64) -> Self {
        self.duration = Some(millis);
        self
    }

    pub fn unordered(mut self) -> Self {
        self.ordered = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn on_matched<F>(mut self, callback: F) -> Self
    where
        F: FnMut() + 'static,
    {
        self.on_matched = Some(Box::new(callback));
        self
    }
}

impl Default for ComboConfig {
    fn default() -> Self {
        Self {
            time_limit: None,
            duration: None,
            ordered: true,
            enabled: true,
            on_matched: None,
        }
    }
}

struct KeyCombo {
    keys: Vec<String>,
    time_limit: Option<f64>,
    duration: Option<f64>,
    ordered: bool,
    enabled: bool,
    active: bool,
    failed: bool,
    was_active_before_disable: bool,
    buffer: Vec<String>,
    timeout: Option<TimeoutId>,
    on_matched: Option<ComboCallback>,
    scheduler: Rc<FrameScheduler>,
}

impl KeyCombo {
    fn test(&mut self, key: &str, elapsed: f64) -> ComboTestReason {
        let valid_time = self.time_limit.map_or(true, |limit| elapsed < limit);
        let valid_key = self.keys.iter().any(|k| k == key);

        self.buffer.push(key.to_string());

        let valid_order = if self.ordered {
            let last = self.buffer.len() - 1;
            self.keys.get(last).is_some_and(|expected| expected == key)
        } else {
            let seen = self.buffer.iter().filter(|k| *k == key).count();
            let defined = self.keys.iter().filter(|k| *k == key).count();
            seen <= defined
        };

        if !valid_time {
            ComboTestReason::TimeLimitExceeded
        } else if !valid_key {
            ComboTestReason::InvalidKey
        } else if !valid_order {
            ComboTestReason::OrderMismatch
        } else if self.buffer.len() == self.keys.len() {
            ComboTestReason::Matched
        } else {
            ComboTestReason::Pending
        }
    }

    fn cancel_timeout(&mut self) {
        if let Some(id) = self.timeout.take() {
            self.scheduler.clear_timeout(id);
        }
    }
}

/// 登録済みコンボへの共有ハンドル
#[derive(Clone)]
pub struct ComboHandle {
    inner: Rc<RefCell<KeyCombo>>,
}

impl ComboHandle {
    /// コンボを作成する。キー文字列は1文字ずつ大文字化される
    pub fn new(keys: &str, config: ComboConfig, scheduler: Rc<FrameScheduler>) -> Result<Self> {
        let parsed: Vec<String> = keys.chars().map(|c| c.to_uppercase().collect()).collect();
        if parsed.is_empty() {
            return Err(InputError::InvalidCombo {
                keys: keys.to_string(),
            });
        }

        let combo = KeyCombo {
            keys: parsed,
            time_limit: config.time_limit,
            duration: config.duration,
            ordered: config.ordered,
            enabled: config.enabled,
            active: false,
            failed: false,
            was_active_before_disable: false,
            buffer: Vec::new(),
            timeout: None,
            on_matched: config.on_matched,
            scheduler,
        };
        Ok(Self {
            inner: Rc::new(RefCell::new(combo)),
        })
    }

    /// レジストリ上の識別子（大文字化したキーを連結した文字列）
    pub fn id(&self) -> String {
        self.inner.borrow().keys.concat()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().keys.clone()
    }

    pub fn time_limit(&self) -> Option<f64> {
        self.inner.borrow().time_limit
    }

    pub fn duration(&self) -> Option<f64> {
        self.inner.borrow().duration
    }

    pub fn is_ordered(&self) -> bool {
        self.inner.borrow().ordered
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.borrow().enabled
    }

    pub fn is_active(&self) -> bool {
        self.inner.borrow().active
    }

    pub fn is_failed(&self) -> bool {
        self.inner.borrow().failed
    }

    /// これまでに受け取ったキー
    pub fn buffer(&self) -> Vec<String> {
        self.inner.borrow().buffer.clone()
    }

    /// 自動解除タイムアウトの ID（スケジュール中のみ）
    pub fn timeout_id(&self) -> Option<TimeoutId> {
        self.inner.borrow().timeout
    }

    pub fn ptr_eq(&self, other: &ComboHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn enable(&self) {
        let mut combo = self.inner.borrow_mut();
        if combo.enabled {
            return;
        }
        combo.enabled = true;
        combo.active = combo.was_active_before_disable;
    }

    pub fn disable(&self) {
        let mut combo = self.inner.borrow_mut();
        if !combo.enabled {
            return;
        }
        combo.enabled = false;
        combo.was_active_before_disable = combo.active;
        combo.active = false;
        combo.buffer.clear();
    }

    /// 成立状態にする。`duration` が有限なら自動解除を予約する
    pub fn activate(&self) {
        let callback = {
            let mut combo = self.inner.borrow_mut();
            if !combo.enabled {
                return;
            }
            combo.active = true;
            combo.buffer.clear();
            combo.cancel_timeout();

            if let Some(duration) = combo.duration {
                let weak = Rc::downgrade(&self.inner);
                let id = combo
                    .scheduler
                    .create_timeout(duration, move || Self::expire(&weak));
                combo.timeout = Some(id);
            }
            combo.on_matched.take()
        };

        // 借用を解放してから呼ぶ
        if let Some(mut callback) = callback {
            callback();
            let mut combo = self.inner.borrow_mut();
            if combo.on_matched.is_none() {
                combo.on_matched = Some(callback);
            }
        }
    }

    pub fn deactivate(&self) {
        let mut combo = self.inner.borrow_mut();
        if !combo.enabled {
            return;
        }
        combo.active = false;
        combo.cancel_timeout();
    }

    fn expire(weak: &Weak<RefCell<KeyCombo>>) {
        let Some(inner) = weak.upgrade() else { return };
        let mut combo = inner.borrow_mut();
        combo.timeout = None;
        if combo.enabled {
            combo.active = false;
        }
        combo.was_active_before_disable = false;
        log::debug!("combo {} expired", combo.keys.concat());
    }

    pub fn fail(&self) {
        let mut combo = self.inner.borrow_mut();
        if !combo.enabled {
            return;
        }
        combo.failed = true;
    }

    /// 入力バッファと失敗状態を初期化する
    pub fn reset(&self) {
        let mut combo = self.inner.borrow_mut();
        combo.buffer.clear();
        combo.failed = false;
    }

    pub(crate) fn test(&self, key: &str, elapsed: f64) -> ComboTestReason {
        self.inner.borrow_mut().test(key, elapsed)
    }
}

impl fmt::Debug for ComboHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let combo = self.inner.borrow();
        f.debug_struct("ComboHandle")
            .field("keys", &combo.keys)
            .field("enabled", &combo.enabled)
            .field("active", &combo.active)
            .field("failed", &combo.failed)
            .field("buffer", &combo.buffer)
            .finish()
    }
}

/// コンボ認識器
///
/// 登録済みコンボ集合と、キー → 参照コンボ数の逆引きインデックスを保持する。
pub struct ComboRecognizer {
    scheduler: Rc<FrameScheduler>,
    combos: Vec<ComboHandle>,
    key_counts: HashMap<String, usize>,
    in_combo: bool,
    last_key_time: Option<f64>,
    pending: Vec<ComboHandle>,
    failed: Vec<ComboHandle>,
}

impl ComboRecognizer {
    pub fn new(scheduler: Rc<FrameScheduler>) -> Self {
        Self {
            scheduler,
            combos: Vec::new(),
            key_counts: HashMap::new(),
            in_combo: false,
            last_key_time: None,
            pending: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// コンボを作成して監視対象に加える
    pub fn create(&mut self, keys: &str, config: ComboConfig) -> Result<ComboHandle> {
        let combo = ComboHandle::new(keys, config, Rc::clone(&self.scheduler))?;
        self.watch(combo.clone())?;
        Ok(combo)
    }

    /// 同じキー列のコンボが登録済みならエラー
    pub fn watch(&mut self, combo: ComboHandle) -> Result<()> {
        let id = combo.id();
        if self.combos.iter().any(|c| c.ptr_eq(&combo) || c.id() == id) {
            return Err(InputError::DuplicateCombo { keys: id });
        }

        for key in combo.keys() {
            *self.key_counts.entry(key).or_insert(0) += 1;
        }
        self.combos.push(combo);
        Ok(())
    }

    pub fn unwatch(&mut self, combo: &ComboHandle) -> bool {
        let Some(index) = self.combos.iter().position(|c| c.ptr_eq(combo)) else {
            return false;
        };
        let removed = self.combos.remove(index);

        for key in removed.keys() {
            if let Some(count) = self.key_counts.get_mut(&key) {
                *count -= 1;
                if *count == 0 {
                    self.key_counts.remove(&key);
                }
            }
        }
        self.pending.retain(|c| !c.ptr_eq(&removed));
        self.failed.retain(|c| !c.ptr_eq(&removed));
        removed.reset();
        true
    }

    pub fn is_watching(&self) -> bool {
        !self.combos.is_empty()
    }

    /// いずれかのコンボがこのキーを含むか
    pub fn is_tracked(&self, key: &str) -> bool {
        self.key_counts.contains_key(&key.to_uppercase())
    }

    pub fn in_combo(&self) -> bool {
        self.in_combo
    }

    pub fn combos(&self) -> &[ComboHandle] {
        &self.combos
    }

    pub fn pending(&self) -> &[ComboHandle] {
        &self.pending
    }

    /// キーを1つ処理し、成立・失敗したコンボのイベントを返す
    pub fn track_key(&mut self, key: &str, now: f64) -> Vec<ComboEvent> {
        let key = key.to_uppercase();

        self.in_combo = self.in_combo || self.key_counts.contains_key(&key);
        if !self.in_combo {
            self.last_key_time = None;
            return Vec::new();
        }

        let elapsed = self.last_key_time.map_or(0.0, |last| now - last);
        self.last_key_time = Some(now);

        let mut events = Vec::new();
        let mut pending = Vec::new();

        // 走査中のコールバックで登録内容が変わっても影響しないようスナップショットを使う
        let snapshot = self.combos.clone();
        for combo in snapshot {
            if !combo.is_enabled() || combo.is_active() || combo.is_failed() {
                continue;
            }

            let reason = combo.test(&key, elapsed);
            match reason {
                ComboTestReason::Pending => pending.push(combo),
                ComboTestReason::Matched => {
                    log::debug!("combo {} matched", combo.id());
                    combo.activate();
                    events.push(ComboEvent { combo, reason });
                }
                _ => {
                    log::debug!("combo {} failed: {}", combo.id(), reason);
                    combo.fail();
                    self.failed.push(combo.clone());
                    events.push(ComboEvent { combo, reason });
                }
            }
        }

        self.pending = pending;
        self.in_combo = !self.pending.is_empty();

        if self.pending.is_empty() {
            self.reset_failed();
            self.last_key_time = None;
        }

        events
    }

    fn reset_failed(&mut self) {
        for combo in self.failed.drain(..) {
            combo.reset();
        }
    }

    /// 全コンボの進行状態を破棄する
    pub fn reset(&mut self) {
        for combo in &self.combos {
            combo.reset();
        }
        self.pending.clear();
        self.failed.clear();
        self.in_combo = false;
        self.last_key_time = None;
    }
}

impl fmt::Debug for ComboRecognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComboRecognizer")
            .field("combos", &self.combos.len())
            .field("in_combo", &self.in_combo)
            .field("pending", &self.pending.len())
            .field("failed", &self.failed.len())
            .finish()
    }
}
