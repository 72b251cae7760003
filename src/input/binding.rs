//! キーバインド（同時押しコード）認識
//!
//! `"Control+Shift+p"` のような `+` 区切りのコード文字列を検証・正規化し、
//! 押下中のキー列と O(1) で照合する。プラットフォーム別の上書き、
//! 他のバインドへの依存（`require`）、フレーム時間での自動解除を扱う。

use crate::error::{InputError, Result};
use crate::platform::Platform;
use crate::timing::{FrameScheduler, TimeoutId};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::OnceLock;

const TOKEN_PATTERN: &str = r"AltGraph|Control|Ctrl|Shift|Alt|Meta|[\p{L}\p{N}\p{P}\p{S}]";

fn chord_regex() -> &'static Regex {
    static CHORD: OnceLock<Regex> = OnceLock::new();
    CHORD.get_or_init(|| {
        Regex::new(&format!(r"^(?:{TOKEN_PATTERN})(?:\+(?:{TOKEN_PATTERN}))*$"))
            .expect("コード文法の正規表現が不正です")
    })
}

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(&format!(r"({TOKEN_PATTERN})(?:\+|$)")).expect("トークンの正規表現が不正です")
    })
}

/// トークンを正規形にする（`Ctrl` → `Control`、1文字は小文字）
pub fn canonical_token(token: &str) -> String {
    if token == "Ctrl" {
        return "Control".to_string();
    }
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.to_lowercase().collect(),
        _ => token.to_string(),
    }
}

/// コード文字列を検証し、正規化したトークン列に分解する
pub fn parse_chord(chord: &str) -> Result<Vec<String>> {
    if !chord_regex().is_match(chord) {
        return Err(InputError::InvalidBinding {
            chord: chord.to_string(),
        });
    }

    Ok(token_regex()
        .captures_iter(chord)
        .map(|caps| canonical_token(&caps[1]))
        .collect())
}

/// 押下中のキー名列を照合用のコード文字列にする
pub fn chord_from_keys<S: AsRef<str>>(keys: &[S]) -> String {
    keys.iter()
        .map(|key| canonical_token(key.as_ref()))
        .collect::<Vec<_>>()
        .join("+")
}

/// バインド成立時のコールバック。引数は依存先バインドが有効だったか
pub type BindingCallback = Box<dyn FnMut(bool)>;

/// 発火モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingMode {
    /// 押した瞬間に一度だけ
    #[default]
    PressedOnce,
    /// 押している間（キーを離すと解除）
    Hold,
}

/// プラットフォーム別のコード上書き
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformChords {
    #[serde(default)]
    pub win: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub linux: Option<String>,
}

impl PlatformChords {
    /// 未指定のプラットフォームを基本コードで埋める
    fn normalized(mut self, base: &str) -> Self {
        self.win.get_or_insert_with(|| base.to_string());
        self.mac.get_or_insert_with(|| base.to_string());
        self.linux.get_or_insert_with(|| base.to_string());
        self
    }

    fn resolve<'a>(&'a self, platform: Platform, base: &'a str) -> &'a str {
        let chord = match platform {
            Platform::Windows => self.win.as_deref(),
            Platform::Mac => self.mac.as_deref(),
            Platform::Linux => self.linux.as_deref(),
            Platform::Unknown => None,
        };
        chord.unwrap_or(base)
    }
}

/// 他のバインドへの依存
#[derive(Debug, Clone)]
pub struct Requirement {
    pub binding: BindingHandle,
    /// true の場合、依存先が有効なときだけ成立する
    pub strict: bool,
}

/// キーバインド生成設定
pub struct BindingConfig {
    pub platforms: Option<PlatformChords>,
    pub require: Option<Requirement>,
    pub mode: BindingMode,
    /// 有効状態を保つ時間（ミリ秒）。`Some(0.0)` は一瞬だけ、`None` は解除されるまで
    pub duration: Option<f64>,
    pub enabled: bool,
    pub on_matched: Option<BindingCallback>,
}

impl BindingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn platforms(mut self, platforms: PlatformChords) -> Self {
        self.platforms = Some(platforms);
        self
    }

    pub fn require(mut self, binding: &BindingHandle, strict: bool) -> Self {
        self.require = Some(Requirement {
            binding: binding.clone(),
            strict,
        });
        self
    }

    pub fn mode(mut self, mode: BindingMode) -> Self {
        self.mode = mode;
        self
    }

    /// 押している間だけ有効なバインド
    pub fn hold(mut self) -> Self {
        self.mode = BindingMode::Hold;
        self.duration = None;
        self
    }

    pub fn duration(mut self, millis: f64) -> Self {
        self.duration = Some(millis);
        self
    }

    /// 明示的に解除するまで有効
    pub fn unlimited(mut self) -> Self {
        self.duration = None;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn on_matched<F>(mut self, callback: F) -> Self
    where
        F: FnMut(bool) + 'static,
    {
        self.on_matched = Some(Box::new(callback));
        self
    }
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            platforms: None,
            require: None,
            mode: BindingMode::PressedOnce,
            duration: Some(0.0),
            enabled: true,
            on_matched: None,
        }
    }
}

struct KeyBinding {
    base: String,
    base_canonical: String,
    chord: String,
    keys: Vec<String>,
    platforms: Option<PlatformChords>,
    platform: Platform,
    require: Option<Requirement>,
    mode: BindingMode,
    duration: Option<f64>,
    enabled: bool,
    active: bool,
    was_active_before_disable: bool,
    timeout: Option<TimeoutId>,
    on_matched: Option<BindingCallback>,
    scheduler: Rc<FrameScheduler>,
}

impl KeyBinding {
    fn cancel_timeout(&mut self) {
        if let Some(id) = self.timeout.take() {
            self.scheduler.clear_timeout(id);
        }
    }
}

/// 登録済みキーバインドへの共有ハンドル
#[derive(Clone)]
pub struct BindingHandle {
    inner: Rc<RefCell<KeyBinding>>,
}

impl BindingHandle {
    /// バインドを作成する。コード文字列とプラットフォーム上書きはここで検証される
    pub fn new(
        chord: &str,
        config: BindingConfig,
        platform: Platform,
        scheduler: Rc<FrameScheduler>,
    ) -> Result<Self> {
        let base_canonical = parse_chord(chord)?.join("+");

        let platforms = config.platforms.map(|p| p.normalized(chord));
        if let Some(platforms) = &platforms {
            for value in [&platforms.win, &platforms.mac, &platforms.linux]
                .into_iter()
                .flatten()
            {
                parse_chord(value)?;
            }
        }

        let resolved = platforms
            .as_ref()
            .map_or(chord, |p| p.resolve(platform, chord));
        let keys = parse_chord(resolved)?;

        let binding = KeyBinding {
            base: chord.to_string(),
            base_canonical,
            chord: keys.join("+"),
            keys,
            platforms,
            platform,
            require: config.require,
            mode: config.mode,
            duration: config.duration,
            enabled: config.enabled,
            active: false,
            was_active_before_disable: false,
            timeout: None,
            on_matched: config.on_matched,
            scheduler,
        };
        Ok(Self {
            inner: Rc::new(RefCell::new(binding)),
        })
    }

    /// プラットフォーム解決・正規化済みのコード文字列
    pub fn chord(&self) -> String {
        self.inner.borrow().chord.clone()
    }

    /// 生成時に渡された基本コード文字列
    pub fn base_chord(&self) -> String {
        self.inner.borrow().base.clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().keys.clone()
    }

    pub fn platforms(&self) -> Option<PlatformChords> {
        self.inner.borrow().platforms.clone()
    }

    pub fn platform(&self) -> Platform {
        self.inner.borrow().platform
    }

    pub fn mode(&self) -> BindingMode {
        self.inner.borrow().mode
    }

    pub fn duration(&self) -> Option<f64> {
        self.inner.borrow().duration
    }

    pub fn requirement(&self) -> Option<Requirement> {
        self.inner.borrow().require.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.borrow().enabled
    }

    pub fn is_active(&self) -> bool {
        self.inner.borrow().active
    }

    pub fn timeout_id(&self) -> Option<TimeoutId> {
        self.inner.borrow().timeout
    }

    pub fn ptr_eq(&self, other: &BindingHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// このバインドのキーに含まれるか（キー名で比較）
    pub fn contains_key(&self, key: &str) -> bool {
        let key = canonical_token(key);
        self.inner.borrow().keys.iter().any(|k| *k == key)
    }

    pub fn enable(&self) {
        let mut binding = self.inner.borrow_mut();
        if binding.enabled {
            return;
        }
        binding.enabled = true;
        binding.active = binding.was_active_before_disable;
    }

    pub fn disable(&self) {
        let mut binding = self.inner.borrow_mut();
        if !binding.enabled {
            return;
        }
        binding.enabled = false;
        binding.was_active_before_disable = binding.active;
        binding.active = false;
    }

    /// バインドを有効化する。無効化中、または厳格な依存が満たされない場合は何もしない
    ///
    /// 有効化した場合は true を返す。
    pub fn activate(&self) -> bool {
        let requirement = {
            let binding = self.inner.borrow();
            if !binding.enabled {
                return false;
            }
            binding.require.clone()
        };

        let dependency_active = requirement
            .as_ref()
            .is_some_and(|req| req.binding.is_active());
        if requirement.as_ref().is_some_and(|req| req.strict) && !dependency_active {
            log::debug!("binding {} blocked by inactive requirement", self.chord());
            return false;
        }

        let callback = {
            let mut binding = self.inner.borrow_mut();
            binding.active = true;
            binding.cancel_timeout();
            binding.on_matched.take()
        };
        log::debug!("binding {} activated", self.chord());

        if let Some(mut callback) = callback {
            callback(dependency_active);
            let mut binding = self.inner.borrow_mut();
            if binding.on_matched.is_none() {
                binding.on_matched = Some(callback);
            }
        }

        let duration = {
            let binding = self.inner.borrow();
            if !binding.active {
                return true;
            }
            binding.duration
        };

        match duration {
            None => {}
            Some(millis) if millis <= 0.0 => self.deactivate(),
            Some(millis) => {
                let weak = Rc::downgrade(&self.inner);
                let mut binding = self.inner.borrow_mut();
                let id = binding
                    .scheduler
                    .create_timeout(millis, move || Self::expire(&weak));
                binding.timeout = Some(id);
            }
        }
        true
    }

    pub fn deactivate(&self) {
        let mut binding = self.inner.borrow_mut();
        if !binding.enabled {
            return;
        }
        binding.active = false;
        binding.cancel_timeout();
    }

    fn expire(weak: &Weak<RefCell<KeyBinding>>) {
        let Some(inner) = weak.upgrade() else { return };
        let mut binding = inner.borrow_mut();
        binding.timeout = None;
        if binding.enabled {
            binding.active = false;
        }
        binding.was_active_before_disable = false;
        log::debug!("binding {} expired", binding.chord);
    }
}

impl fmt::Debug for BindingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let binding = self.inner.borrow();
        f.debug_struct("BindingHandle")
            .field("chord", &binding.chord)
            .field("mode", &binding.mode)
            .field("enabled", &binding.enabled)
            .field("active", &binding.active)
            .finish()
    }
}

/// キーバインド認識器
///
/// 正規化済みコード文字列 → バインドのマップと、キー → 参照数の逆引きを保持する。
pub struct BindingRecognizer {
    scheduler: Rc<FrameScheduler>,
    platform: Platform,
    keymaps: HashMap<String, BindingHandle>,
    key_counts: HashMap<String, usize>,
}

impl BindingRecognizer {
    pub fn new(scheduler: Rc<FrameScheduler>, platform: Platform) -> Self {
        Self {
            scheduler,
            platform,
            keymaps: HashMap::new(),
            key_counts: HashMap::new(),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// バインドを作成して監視対象に加える
    pub fn create(&mut self, chord: &str, config: BindingConfig) -> Result<BindingHandle> {
        let binding =
            BindingHandle::new(chord, config, self.platform, Rc::clone(&self.scheduler))?;
        self.watch(binding.clone())?;
        Ok(binding)
    }

    pub fn watch(&mut self, binding: BindingHandle) -> Result<()> {
        let chord = binding.chord();
        if self.keymaps.contains_key(&chord) {
            return Err(InputError::DuplicateBinding { chord });
        }

        for key in binding.keys() {
            *self.key_counts.entry(key).or_insert(0) += 1;
        }
        self.keymaps.insert(chord, binding);
        Ok(())
    }

    pub fn unwatch(&mut self, binding: &BindingHandle) -> bool {
        let chord = binding.chord();
        match self.keymaps.get(&chord) {
            Some(registered) if registered.ptr_eq(binding) => {}
            _ => return false,
        }
        self.keymaps.remove(&chord);

        for key in binding.keys() {
            if let Some(count) = self.key_counts.get_mut(&key) {
                *count -= 1;
                if *count == 0 {
                    self.key_counts.remove(&key);
                }
            }
        }
        true
    }

    pub fn is_watching(&self) -> bool {
        !self.keymaps.is_empty()
    }

    pub fn is_tracked(&self, key: &str) -> bool {
        self.key_counts.contains_key(&canonical_token(key))
    }

    /// コード文字列で登録済みバインドを取得
    ///
    /// 表記ゆれは正規化して比較する。プラットフォーム解決後のコードに加え、
    /// 生成時の基本コードでも引ける。
    pub fn get(&self, chord: &str) -> Option<BindingHandle> {
        let chord = parse_chord(chord).ok()?.join("+");
        self.keymaps
            .get(&chord)
            .or_else(|| {
                self.keymaps
                    .values()
                    .find(|binding| binding.inner.borrow().base_canonical == chord)
            })
            .cloned()
    }

    pub fn bindings(&self) -> impl Iterator<Item = &BindingHandle> {
        self.keymaps.values()
    }

    pub fn len(&self) -> usize {
        self.keymaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keymaps.is_empty()
    }

    /// 押下中のキー列と一致するバインドを探す
    pub fn lookup<S: AsRef<str>>(&self, held: &[S]) -> Option<BindingHandle> {
        if held.is_empty() {
            return None;
        }
        self.keymaps.get(&chord_from_keys(held)).cloned()
    }

    /// 押下中のキー列を照合し、一致したバインドを有効化する
    ///
    /// 有効化に成功したバインドだけを返す。
    pub fn track<S: AsRef<str>>(&self, held: &[S]) -> Option<BindingHandle> {
        let binding = self.lookup(held)?;
        binding.activate().then_some(binding)
    }

    /// キー解放の通知。`Hold` モードのバインドを解除する
    pub fn release_key(&self, key: &str) {
        for binding in self.keymaps.values() {
            if binding.mode() == BindingMode::Hold && binding.is_active() && binding.contains_key(key)
            {
                binding.deactivate();
            }
        }
    }
}

impl fmt::Debug for BindingRecognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingRecognizer")
            .field("platform", &self.platform)
            .field("bindings", &self.keymaps.len())
            .finish()
    }
}
