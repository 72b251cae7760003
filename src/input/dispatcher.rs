//! 入力ディスパッチャ
//!
//! ホストのキーボードイベントを受け取り、キーテーブル・コンボ認識器・
//! キーバインド認識器へ配送し、結果を名前付きイベントとしてリスナーへ送出する。

use super::binding::{BindingConfig, BindingHandle, BindingRecognizer};
use super::combo::{ComboConfig, ComboHandle, ComboRecognizer};
use super::events::{
    BindingEvent, ComboEvent, EventKind, InputEvent, KeyEvent, KeyEventKind, RawKeyEvent,
};
use super::held_keys::HeldKeys;
use super::keys::KeyTable;
use crate::config::{Actions, InputConfig};
use crate::error::{InputError, Result};
use crate::platform::Platform;
use crate::timing::FrameScheduler;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// リスナー関数
pub type EventHandler = Box<dyn FnMut(&InputEvent)>;

/// リスナー登録の識別子（[`InputDispatcher::off`] に渡す）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// キーボード入力のファサード
pub struct InputDispatcher {
    /// フレーム同期タイマー（コンボ・バインドと共有）
    scheduler: Rc<FrameScheduler>,
    platform: Platform,
    keys: KeyTable,
    combos: ComboRecognizer,
    bindings: BindingRecognizer,
    held: HeldKeys,
    listeners: HashMap<EventKind, Vec<(ListenerId, EventHandler)>>,
    next_listener: u64,
    enabled: bool,
}

impl InputDispatcher {
    /// 実行中の OS を対象に作成
    pub fn new() -> Self {
        Self::with_platform(Platform::detect())
    }

    /// プラットフォームを指定して作成
    pub fn with_platform(platform: Platform) -> Self {
        let scheduler = FrameScheduler::shared();
        Self {
            combos: ComboRecognizer::new(Rc::clone(&scheduler)),
            bindings: BindingRecognizer::new(Rc::clone(&scheduler), platform),
            scheduler,
            platform,
            keys: KeyTable::new(),
            held: HeldKeys::new(),
            listeners: HashMap::new(),
            next_listener: 0,
            enabled: true,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn scheduler(&self) -> Rc<FrameScheduler> {
        Rc::clone(&self.scheduler)
    }

    /// イベント種別にリスナーを登録
    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> ListenerId
    where
        F: FnMut(&InputEvent) + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// イベント名（`"pressed"`, `"keycombomatched"` など）でリスナーを登録
    pub fn on_named<F>(&mut self, name: &str, handler: F) -> Result<ListenerId>
    where
        F: FnMut(&InputEvent) + 'static,
    {
        let kind = name.parse::<EventKind>()?;
        Ok(self.on(kind, handler))
    }

    /// リスナー登録を解除
    pub fn off(&mut self, id: ListenerId) -> bool {
        for handlers in self.listeners.values_mut() {
            if let Some(index) = handlers.iter().position(|(listener, _)| *listener == id) {
                handlers.remove(index);
                return true;
            }
        }
        false
    }

    pub fn create_combo(&mut self, keys: &str, config: ComboConfig) -> Result<ComboHandle> {
        self.combos.create(keys, config)
    }

    pub fn create_binding(&mut self, chord: &str, config: BindingConfig) -> Result<BindingHandle> {
        self.bindings.create(chord, config)
    }

    pub fn remove_combo(&mut self, combo: &ComboHandle) -> bool {
        self.combos.unwatch(combo)
    }

    pub fn remove_binding(&mut self, binding: &BindingHandle) -> bool {
        self.bindings.unwatch(binding)
    }

    /// 登録済みバインドをコード文字列で取得
    pub fn binding(&self, chord: &str) -> Option<BindingHandle> {
        self.bindings.get(chord)
    }

    pub fn combos(&self) -> &ComboRecognizer {
        &self.combos
    }

    pub fn bindings(&self) -> &BindingRecognizer {
        &self.bindings
    }

    /// 物理キーテーブル
    pub fn keys(&self) -> &KeyTable {
        &self.keys
    }

    /// 物理キーテーブル（キー単位のコールバック登録用）
    pub fn keys_mut(&mut self) -> &mut KeyTable {
        &mut self.keys
    }

    pub fn is_pressed(&self, code: &str) -> bool {
        self.keys.is_pressed(code)
    }

    /// キーバインド照合用バッファにある物理キーコード
    pub fn active_keys(&self) -> Vec<String> {
        self.held.codes()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// キーボード全体を有効化
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// キーボード全体を無効化
    ///
    /// 無効中の生イベントは無視される。キーの押下状態と押下中バッファは破棄され、
    /// 再有効化後の最初の押下は新しい押下として扱われる。
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        self.keys.release_all();
        self.held.clear();
        self.combos.reset();
    }

    /// ホストのキーボードイベントを処理し、送出したイベントを返す
    pub fn handle_event(&mut self, raw: &RawKeyEvent) -> Vec<InputEvent> {
        if !self.enabled {
            return Vec::new();
        }

        self.keys.handle_event(raw);
        let event = KeyEvent::from_raw(raw);
        log::trace!("{:?} {} ({})", raw.kind, event.key, event.code);
        self.keys.dispatch(raw.kind, &event);

        let emitted = match raw.kind {
            KeyEventKind::Pressed => self.handle_pressed(event),
            KeyEventKind::Released => self.handle_released(event),
        };

        for event in &emitted {
            self.emit(event);
        }
        emitted
    }

    fn handle_pressed(&mut self, event: KeyEvent) -> Vec<InputEvent> {
        let mut emitted = Vec::new();

        // オートリピートはどのバッファも進めない
        if !event.is_repeating() {
            self.held.press(&event.key, &event.code);

            if self.combos.is_watching() {
                let combo_events = self.combos.track_key(&event.key, event.raw.time);
                emitted.extend(combo_events.into_iter().map(Self::combo_event));
            }

            if self.bindings.is_watching() {
                if let Some(binding) = self.bindings.track(&self.held.names()) {
                    emitted.push(InputEvent::BindingMatched(BindingEvent {
                        binding,
                        key_codes: self.held.codes(),
                    }));
                }
            }

            self.held.settle(&event.key, &event.code);
        }

        emitted.insert(0, InputEvent::Pressed(event));
        emitted
    }

    fn handle_released(&mut self, event: KeyEvent) -> Vec<InputEvent> {
        self.held.release(&event.key, &event.code);
        if self.bindings.is_watching() {
            self.bindings.release_key(&event.key);
        }
        vec![InputEvent::Released(event)]
    }

    fn combo_event(event: ComboEvent) -> InputEvent {
        if event.reason.is_failure() {
            InputEvent::ComboFailed(event)
        } else {
            InputEvent::ComboMatched(event)
        }
    }

    fn emit(&mut self, event: &InputEvent) {
        if let Some(handlers) = self.listeners.get_mut(&event.kind()) {
            for (_, handler) in handlers.iter_mut() {
                handler(event);
            }
        }
    }

    /// フレームごとに呼ぶ。期限切れのタイマーを発火し、その数を返す
    ///
    /// `now` はループ稼働中だけ進む時間 (`FrameStep::elapsed`) を渡す。
    pub fn tick(&self, now: f64) -> usize {
        self.scheduler.tick(now)
    }

    /// 設定ファイルの内容を登録する
    ///
    /// 途中でエラーになった場合、この呼び出しで登録したものはすべて取り消される。
    pub fn apply_config(&mut self, config: &InputConfig, actions: &Actions) -> Result<()> {
        let mut combos = Vec::new();
        let mut bindings = Vec::new();

        let result = self.register_config(config, actions, &mut combos, &mut bindings);
        if let Err(err) = &result {
            log::warn!("config rejected: {}", err);
            for combo in &combos {
                self.combos.unwatch(combo);
            }
            for binding in &bindings {
                self.bindings.unwatch(binding);
            }
        }
        result
    }

    fn register_config(
        &mut self,
        config: &InputConfig,
        actions: &Actions,
        combos: &mut Vec<ComboHandle>,
        bindings: &mut Vec<BindingHandle>,
    ) -> Result<()> {
        for spec in &config.combos {
            let mut combo = ComboConfig::new();
            combo.time_limit = spec.time_limit;
            combo.duration = spec.duration;
            combo.ordered = spec.ordered;
            combo.enabled = spec.enabled;
            if let Some(name) = &spec.action {
                let action = actions.get(name)?;
                let source = spec.keys.to_uppercase();
                combo = combo.on_matched(move || action(&source));
            }
            combos.push(self.combos.create(&spec.keys, combo)?);
        }

        for spec in &config.bindings {
            let mut binding = BindingConfig::new().mode(spec.mode);
            binding.duration = spec.duration;
            binding.enabled = spec.enabled;
            if let Some(platforms) = &spec.platforms {
                binding = binding.platforms(platforms.clone());
            }
            if let Some(require) = &spec.require {
                let dependency = self.bindings.get(&require.chord).ok_or_else(|| {
                    InputError::UnknownRequirement {
                        chord: require.chord.clone(),
                    }
                })?;
                binding = binding.require(&dependency, require.strict);
            }
            if let Some(name) = &spec.action {
                let action = actions.get(name)?;
                let source = spec.chord.clone();
                binding = binding.on_matched(move |_| action(&source));
            }
            bindings.push(self.bindings.create(&spec.chord, binding)?);
        }

        log::debug!(
            "config applied: {} combos, {} bindings",
            combos.len(),
            bindings.len()
        );
        Ok(())
    }
}

impl Default for InputDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InputDispatcher {
    fn drop(&mut self) {
        self.scheduler.clear();
    }
}

impl fmt::Debug for InputDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners: usize = self.listeners.values().map(Vec::len).sum();
        f.debug_struct("InputDispatcher")
            .field("platform", &self.platform)
            .field("enabled", &self.enabled)
            .field("combos", &self.combos)
            .field("bindings", &self.bindings)
            .field("held", &self.held)
            .field("listeners", &listeners)
            .finish()
    }
}
