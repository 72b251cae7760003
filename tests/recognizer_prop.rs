//! Recognizer property tests
//!
//! Exercise the public dispatcher and scheduler APIs with generated key
//! sequences and timings.

use game_input::input::binding::parse_chord;
use game_input::input::{ComboTestReason, InputEvent, RawKeyEvent};
use game_input::{BindingConfig, ComboConfig, FrameScheduler, InputDispatcher, Platform};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use std::cell::RefCell;
use std::rc::Rc;

fn combo_keys() -> impl Strategy<Value = String> {
    proptest::collection::vec(proptest::char::range('A', 'Z'), 1..7)
        .prop_map(|chars| chars.into_iter().collect())
}

fn press(dispatcher: &mut InputDispatcher, key: char, time: f64) -> Vec<InputEvent> {
    let name = key.to_ascii_lowercase().to_string();
    let code = format!("Key{}", key);
    let events = dispatcher.handle_event(&RawKeyEvent::pressed(&name, &code).at(time));
    dispatcher.handle_event(&RawKeyEvent::released(&name, &code).at(time + 1.0));
    events
}

fn combo_reasons(events: &[InputEvent]) -> Vec<ComboTestReason> {
    events
        .iter()
        .filter_map(|event| match event {
            InputEvent::ComboMatched(combo) | InputEvent::ComboFailed(combo) => {
                Some(combo.reason)
            }
            _ => None,
        })
        .collect()
}

fn chord_token() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Control".to_string()),
        Just("Ctrl".to_string()),
        Just("Shift".to_string()),
        Just("Alt".to_string()),
        Just("Meta".to_string()),
        Just("AltGraph".to_string()),
        proptest::char::range('a', 'z').prop_map(|c| c.to_string()),
        proptest::char::range('0', '9').prop_map(|c| c.to_string()),
        Just("+".to_string()),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    #[test]
    fn ordered_combo_matches_exactly_once(
        keys in combo_keys(),
        interval in 1u32..500,
    ) {
        let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
        let combo = dispatcher
            .create_combo(&keys, ComboConfig::new().time_limit(500.0))
            .unwrap();

        let mut reasons = Vec::new();
        for (i, key) in keys.chars().enumerate() {
            let time = f64::from(interval) * i as f64;
            reasons.extend(combo_reasons(&press(&mut dispatcher, key, time)));
        }

        prop_assert_eq!(reasons, vec![ComboTestReason::Matched]);
        prop_assert!(combo.is_active());
        prop_assert!(combo.buffer().is_empty());
    }

    #[test]
    fn slow_second_key_never_matches(
        keys in combo_keys().prop_filter("needs two keys", |keys| keys.len() >= 2),
        time_limit in 50u32..1000,
        extra in 0u32..1000,
    ) {
        let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
        dispatcher
            .create_combo(&keys, ComboConfig::new().time_limit(f64::from(time_limit)))
            .unwrap();

        let mut chars = keys.chars();
        let first = chars.next().unwrap();
        let second = chars.next().unwrap();

        prop_assert!(combo_reasons(&press(&mut dispatcher, first, 0.0)).is_empty());
        let delay = f64::from(time_limit + extra);
        let reasons = combo_reasons(&press(&mut dispatcher, second, delay));
        prop_assert_eq!(reasons, vec![ComboTestReason::TimeLimitExceeded]);
    }

    #[test]
    fn timeouts_fire_at_most_once(
        durations in proptest::collection::vec(0u32..2000, 1..16),
        steps in proptest::collection::vec(1u32..400, 1..24),
    ) {
        let scheduler = FrameScheduler::shared();
        let fired = Rc::new(RefCell::new(vec![0u32; durations.len()]));
        for (index, duration) in durations.iter().enumerate() {
            let fired = Rc::clone(&fired);
            scheduler.create_timeout(f64::from(*duration), move || {
                fired.borrow_mut()[index] += 1;
            });
        }

        let mut now = 0.0;
        for step in steps {
            now += f64::from(step);
            scheduler.tick(now);
        }
        scheduler.tick(now + 2000.0);

        prop_assert!(fired.borrow().iter().all(|count| *count == 1));
        prop_assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn disable_is_idempotent(active in any::<bool>(), twice in any::<bool>()) {
        let mut dispatcher = InputDispatcher::with_platform(Platform::Linux);
        let binding = dispatcher
            .create_binding("Control+b", BindingConfig::new().unlimited())
            .unwrap();
        if active {
            binding.activate();
        }

        binding.disable();
        if twice {
            binding.disable();
        }
        prop_assert!(!binding.is_active());

        binding.enable();
        prop_assert_eq!(binding.is_active(), active);
    }

    #[test]
    fn generated_chords_parse(tokens in proptest::collection::vec(chord_token(), 1..5)) {
        let chord = tokens.join("+");
        let parsed = parse_chord(&chord).unwrap();
        prop_assert_eq!(parsed.len(), tokens.len());
        prop_assert!(parsed.iter().all(|token| token != "Ctrl"));
    }
}
