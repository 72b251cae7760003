// dispatcher_integration_tests.rs - ディスパッチャ統合テスト

use game_input::input::{InputEvent, KeyEvent, RawKeyEvent};
use game_input::{ComboConfig, EventKind, InputDispatcher, InputError, Platform};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[test]
fn test_event_order_for_matching_press() {
    let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
    dispatcher.create_combo("A", ComboConfig::new()).unwrap();

    let order = Rc::new(RefCell::new(Vec::new()));
    for kind in EventKind::ALL {
        let sink = Rc::clone(&order);
        dispatcher.on(kind, move |event| sink.borrow_mut().push(event.kind()));
    }

    dispatcher.handle_event(&RawKeyEvent::pressed("a", "KeyA"));
    dispatcher.handle_event(&RawKeyEvent::released("a", "KeyA"));

    assert_eq!(
        *order.borrow(),
        vec![
            EventKind::Pressed,
            EventKind::ComboMatched,
            EventKind::Released
        ]
    );
}

#[test]
fn test_per_key_callbacks_fire_on_transitions_only() {
    let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
    let pressed = Rc::new(Cell::new(0));
    let released = Rc::new(Cell::new(0));

    let hits = Rc::clone(&pressed);
    dispatcher
        .keys_mut()
        .on_pressed("KeyW", move |_: &KeyEvent| hits.set(hits.get() + 1))
        .unwrap();
    let hits = Rc::clone(&released);
    dispatcher
        .keys_mut()
        .on_released("KeyW", move |_: &KeyEvent| hits.set(hits.get() + 1))
        .unwrap();

    dispatcher.handle_event(&RawKeyEvent::pressed("w", "KeyW"));
    dispatcher.handle_event(&RawKeyEvent::pressed("w", "KeyW").repeating());
    dispatcher.handle_event(&RawKeyEvent::pressed("w", "KeyW").repeating());
    assert!(dispatcher.is_pressed("KeyW"));
    dispatcher.handle_event(&RawKeyEvent::released("w", "KeyW"));
    dispatcher.handle_event(&RawKeyEvent::released("w", "KeyW"));

    assert_eq!(pressed.get(), 1);
    assert_eq!(released.get(), 1);
    assert!(!dispatcher.is_pressed("KeyW"));
}

#[test]
fn test_per_key_callback_receives_modifiers() {
    let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
    let seen = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&seen);
    dispatcher
        .keys_mut()
        .on_pressed("KeyS", move |event: &KeyEvent| {
            *slot.borrow_mut() = Some(event.modifiers);
        })
        .unwrap();

    let mut raw = RawKeyEvent::pressed("s", "KeyS").with_ctrl().with_shift();
    raw.caps_lock = true;
    dispatcher.handle_event(&raw);

    let modifiers = seen.borrow().unwrap();
    assert!(modifiers.is_ctrl);
    assert!(modifiers.is_shift);
    assert!(modifiers.is_caps_lock);
    assert!(!modifiers.is_alt);
    assert_eq!(dispatcher.keys().modifiers(), modifiers);
}

#[test]
fn test_unknown_code_is_soft() {
    let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
    let events = dispatcher.handle_event(&RawKeyEvent::pressed("?", "IntlRo"));
    assert_eq!(events.len(), 1);
    assert!(!dispatcher.is_pressed("IntlRo"));

    let err = dispatcher
        .keys_mut()
        .on_pressed("IntlRo", |_: &KeyEvent| {})
        .unwrap_err();
    assert_eq!(
        err,
        InputError::UnknownKeyCode {
            code: "IntlRo".into()
        }
    );
}

#[test]
fn test_invalid_event_name() {
    let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
    for name in EventKind::ALL.map(EventKind::as_str) {
        assert!(dispatcher.on_named(name, |_| {}).is_ok());
    }
    assert!(matches!(
        dispatcher.on_named("KEY_COMBO_MATCHED", |_| {}),
        Err(InputError::InvalidEventType { .. })
    ));
}

#[test]
fn test_recognizers_idle_without_registrations() {
    let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
    let events = dispatcher.handle_event(&RawKeyEvent::pressed("a", "KeyA"));
    assert!(matches!(events.as_slice(), [InputEvent::Pressed(_)]));
    assert!(!dispatcher.combos().in_combo());
}

#[test]
fn test_disable_drops_attempt_in_progress() {
    let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
    let combo = dispatcher.create_combo("AB", ComboConfig::new()).unwrap();

    dispatcher.handle_event(&RawKeyEvent::pressed("a", "KeyA"));
    assert_eq!(combo.buffer(), vec!["A"]);

    dispatcher.disable();
    dispatcher.disable();
    assert!(!dispatcher.is_enabled());
    assert!(combo.buffer().is_empty());
    assert!(dispatcher.handle_event(&RawKeyEvent::pressed("b", "KeyB")).is_empty());

    dispatcher.enable();
    assert!(dispatcher.is_enabled());
}

#[test]
fn test_key_held_through_disable_presses_again_after_enable() {
    let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
    let pressed = Rc::new(Cell::new(0));
    let hits = Rc::clone(&pressed);
    dispatcher
        .keys_mut()
        .on_pressed("KeyW", move |_: &KeyEvent| hits.set(hits.get() + 1))
        .unwrap();

    dispatcher.handle_event(&RawKeyEvent::pressed("w", "KeyW"));
    dispatcher.disable();
    assert!(!dispatcher.is_pressed("KeyW"));

    // 無効中の解放は届かない
    dispatcher.handle_event(&RawKeyEvent::released("w", "KeyW"));
    dispatcher.enable();
    dispatcher.handle_event(&RawKeyEvent::pressed("w", "KeyW"));

    assert_eq!(pressed.get(), 2);
    assert!(dispatcher.is_pressed("KeyW"));
}

#[test]
fn test_listener_registered_in_callback_order() {
    let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
    let log = Rc::new(RefCell::new(Vec::new()));
    for label in ["first", "second"] {
        let sink = Rc::clone(&log);
        dispatcher.on(EventKind::Released, move |_| sink.borrow_mut().push(label));
    }

    dispatcher.handle_event(&RawKeyEvent::released("a", "KeyA"));
    assert_eq!(*log.borrow(), vec!["first", "second"]);
}
