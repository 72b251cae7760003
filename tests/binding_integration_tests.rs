// binding_integration_tests.rs - キーバインド統合テスト

use game_input::input::{BindingMode, InputEvent, PlatformChords, RawKeyEvent};
use game_input::{BindingConfig, EventKind, InputDispatcher, InputError, Platform};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn matched_chords(events: &[InputEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            InputEvent::BindingMatched(binding) => Some(binding.binding.chord()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_duration_bounded_binding() {
    let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
    let binding = dispatcher
        .create_binding("Control+b", BindingConfig::new().duration(500.0))
        .unwrap();
    let scheduler = dispatcher.scheduler();

    dispatcher.tick(1000.0);
    dispatcher.handle_event(&RawKeyEvent::pressed("Control", "ControlLeft").at(1000.0));
    let events =
        dispatcher.handle_event(&RawKeyEvent::pressed("b", "KeyB").with_ctrl().at(1000.0));
    assert_eq!(matched_chords(&events), vec!["Control+b"]);

    let id = binding.timeout_id().unwrap();
    dispatcher.tick(1400.0);
    assert!(binding.is_active());

    dispatcher.tick(1600.0);
    assert!(!binding.is_active());
    assert!(!scheduler.contains(id));
    assert_eq!(binding.timeout_id(), None);
}

#[test]
fn test_zero_duration_binding_is_pulse() {
    let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
    let binding = dispatcher
        .create_binding("Alt+f", BindingConfig::new())
        .unwrap();

    dispatcher.handle_event(&RawKeyEvent::pressed("Alt", "AltLeft"));
    let events = dispatcher.handle_event(&RawKeyEvent::pressed("f", "KeyF").with_alt());
    assert_eq!(matched_chords(&events), vec!["Alt+f"]);
    assert!(!binding.is_active());
}

#[test]
fn test_strict_requirement_chain() {
    let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
    let first = dispatcher
        .create_binding("Control+k", BindingConfig::new().unlimited())
        .unwrap();
    let dependency_seen = Rc::new(Cell::new(None));
    let slot = Rc::clone(&dependency_seen);
    let second = dispatcher
        .create_binding(
            "Control+c",
            BindingConfig::new()
                .require(&first, true)
                .on_matched(move |active| slot.set(Some(active))),
        )
        .unwrap();

    dispatcher.handle_event(&RawKeyEvent::pressed("Control", "ControlLeft"));
    let events = dispatcher.handle_event(&RawKeyEvent::pressed("c", "KeyC").with_ctrl());
    assert!(matched_chords(&events).is_empty());
    assert_eq!(dependency_seen.get(), None);
    dispatcher.handle_event(&RawKeyEvent::released("c", "KeyC").with_ctrl());

    let events = dispatcher.handle_event(&RawKeyEvent::pressed("k", "KeyK").with_ctrl());
    assert_eq!(matched_chords(&events), vec!["Control+k"]);
    dispatcher.handle_event(&RawKeyEvent::released("k", "KeyK").with_ctrl());

    let events = dispatcher.handle_event(&RawKeyEvent::pressed("c", "KeyC").with_ctrl());
    assert_eq!(matched_chords(&events), vec!["Control+c"]);
    assert_eq!(dependency_seen.get(), Some(true));
    assert!(!second.is_active());
}

#[test]
fn test_three_key_chord_with_shifted_letter() {
    let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
    dispatcher
        .create_binding("Control+Shift+p", BindingConfig::new())
        .unwrap();

    dispatcher.handle_event(&RawKeyEvent::pressed("Control", "ControlLeft"));
    dispatcher.handle_event(&RawKeyEvent::pressed("Shift", "ShiftLeft").with_ctrl());
    let events = dispatcher
        .handle_event(&RawKeyEvent::pressed("P", "KeyP").with_ctrl().with_shift());
    assert_eq!(matched_chords(&events), vec!["Control+Shift+p"]);
    assert_eq!(
        dispatcher.active_keys(),
        vec!["ControlLeft", "ShiftLeft", "KeyP"]
    );
}

#[test]
fn test_modifier_release_clears_buffer() {
    let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
    dispatcher
        .create_binding("Control+b", BindingConfig::new())
        .unwrap();

    dispatcher.handle_event(&RawKeyEvent::pressed("Control", "ControlLeft"));
    dispatcher.handle_event(&RawKeyEvent::released("Control", "ControlLeft"));
    assert!(dispatcher.active_keys().is_empty());

    let events = dispatcher.handle_event(&RawKeyEvent::pressed("b", "KeyB"));
    assert!(matched_chords(&events).is_empty());
}

#[test]
fn test_meta_chords_repeat_without_release() {
    let mut dispatcher = InputDispatcher::with_platform(Platform::Mac);
    let count = Rc::new(Cell::new(0));
    let hits = Rc::clone(&count);
    dispatcher
        .create_binding(
            "Control+c",
            BindingConfig::new()
                .platforms(PlatformChords {
                    mac: Some("Meta+c".into()),
                    ..PlatformChords::default()
                })
                .on_matched(move |_| hits.set(hits.get() + 1)),
        )
        .unwrap();

    dispatcher.handle_event(&RawKeyEvent::pressed("Meta", "MetaLeft"));
    dispatcher.handle_event(&RawKeyEvent::pressed("c", "KeyC").with_meta());
    // Meta 押下中は c の解放が届かない
    dispatcher.handle_event(&RawKeyEvent::pressed("c", "KeyC").with_meta().at(50.0));

    assert_eq!(count.get(), 2);
    assert_eq!(dispatcher.active_keys(), vec!["MetaLeft"]);
}

#[test]
fn test_hold_binding_follows_key() {
    let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
    let binding = dispatcher
        .create_binding("Shift+d", BindingConfig::new().hold())
        .unwrap();
    assert_eq!(binding.mode(), BindingMode::Hold);

    dispatcher.handle_event(&RawKeyEvent::pressed("Shift", "ShiftLeft"));
    dispatcher.handle_event(&RawKeyEvent::pressed("D", "KeyD").with_shift());
    assert!(binding.is_active());

    dispatcher.tick(10_000.0);
    assert!(binding.is_active());

    dispatcher.handle_event(&RawKeyEvent::released("D", "KeyD").with_shift());
    assert!(!binding.is_active());
}

#[test]
fn test_invalid_chord_is_rejected_without_registration() {
    let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
    let err = dispatcher
        .create_binding("Control+", BindingConfig::new())
        .unwrap_err();
    assert_eq!(
        err,
        InputError::InvalidBinding {
            chord: "Control+".into()
        }
    );
    assert!(!dispatcher.bindings().is_watching());
}

#[test]
fn test_binding_listener_and_removal() {
    let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    dispatcher.on(EventKind::BindingMatched, move |event| {
        if let InputEvent::BindingMatched(binding) = event {
            sink.borrow_mut().push(binding.key_codes.clone());
        }
    });

    let binding = dispatcher
        .create_binding("Alt+1", BindingConfig::new())
        .unwrap();
    dispatcher.handle_event(&RawKeyEvent::pressed("Alt", "AltRight"));
    dispatcher.handle_event(&RawKeyEvent::pressed("1", "Digit1").with_alt());
    dispatcher.handle_event(&RawKeyEvent::released("1", "Digit1").with_alt());

    assert!(dispatcher.remove_binding(&binding));
    dispatcher.handle_event(&RawKeyEvent::pressed("1", "Digit1").with_alt());

    assert_eq!(*seen.borrow(), vec![vec!["AltRight", "Digit1"]]);
}

#[test]
fn test_key_repeat_does_not_retrigger_binding() {
    let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
    let count = Rc::new(Cell::new(0));
    let hits = Rc::clone(&count);
    dispatcher
        .create_binding(
            "Control+b",
            BindingConfig::new().on_matched(move |_| hits.set(hits.get() + 1)),
        )
        .unwrap();

    dispatcher.handle_event(&RawKeyEvent::pressed("Control", "ControlLeft"));
    let events = dispatcher.handle_event(&RawKeyEvent::pressed("b", "KeyB").with_ctrl());
    assert_eq!(matched_chords(&events), vec!["Control+b"]);
    let held = dispatcher.active_keys();

    for time in [30.0, 60.0, 90.0] {
        let events = dispatcher
            .handle_event(&RawKeyEvent::pressed("b", "KeyB").with_ctrl().repeating().at(time));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), EventKind::Pressed);
    }

    // Control のリピートでもバッファは変わらない
    dispatcher.handle_event(&RawKeyEvent::pressed("Control", "ControlLeft").repeating());

    assert_eq!(dispatcher.active_keys(), held);
    assert_eq!(held, vec!["ControlLeft", "KeyB"]);
    assert_eq!(count.get(), 1);
}
