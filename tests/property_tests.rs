//! Property-based tests for the input manager.
//!
//! Covers sorted-table invariants of the manager and configs, config
//! persistence, D-pad decomposition and repeated raw events.

use inmgr::input::button::decode_dpad;
use inmgr::input::{
    persist, Button, Capability, Config, DeviceIdentity, InputDriver, InputManager, Signal,
    StaticDriver, Target,
};
use inmgr::util::sorted;
use proptest::prelude::*;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

const PAD: i64 = 7;

fn all_targets() -> Vec<Target> {
    [Target::None, Target::Horz, Target::Vert, Target::Dpad]
        .into_iter()
        .chain(Button::ALL.into_iter().map(Target::Button))
        .chain(Signal::ALL.into_iter().map(Target::Signal))
        .collect()
}

/// D-pad on raw 1, plain buttons on raw 2..=6
fn pad_manager() -> (InputManager, Rc<dyn InputDriver>) {
    let mut caps = vec![Capability::new(1, 0x0001_0039, 0, 7)];
    caps.extend((2..=6).map(|raw_id| Capability::new(raw_id, 0x0009_0000 | raw_id as u32, 0, 1)));
    let driver: Rc<dyn InputDriver> = Rc::new(StaticDriver::new().with_device(
        PAD,
        DeviceIdentity::new(0x0f0d, 0x00c1, "Property Pad"),
        caps,
    ));
    let mut manager = InputManager::new(None, 1);
    manager.connect(PAD, Some(&driver)).unwrap();
    (manager, driver)
}

/// Host calls interleaved by the table-ordering properties
#[derive(Debug, Clone)]
enum Op {
    Connect(i64),
    Disconnect(i64),
    Enable(i64, bool),
    Map(i64, i32, usize),
    Raw(i64, i32, i32),
}

/// Devid 0 is the system keyboard, 1..=5 are pads
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0i64..7).prop_map(Op::Connect),
        (0i64..7).prop_map(Op::Disconnect),
        (0i64..7, any::<bool>()).prop_map(|(devid, enable)| Op::Enable(devid, enable)),
        (0i64..7, 0i32..10, 0usize..32)
            .prop_map(|(devid, raw_id, target)| Op::Map(devid, raw_id, target)),
        (0i64..7, 1i32..7, -2i32..10)
            .prop_map(|(devid, raw_id, value)| Op::Raw(devid, raw_id, value)),
    ]
}

fn pads_driver() -> Rc<dyn InputDriver> {
    let mut driver = StaticDriver::new();
    for devid in 1..=5 {
        let mut caps = vec![Capability::new(1, 0x0001_0039, 0, 7)];
        caps.extend((2..=6).map(|raw_id| Capability::new(raw_id, 0x0009_0000 | raw_id as u32, 0, 1)));
        driver.add_device(devid, DeviceIdentity::new(0x0f0d, 0x00c1, "Property Pad"), caps);
    }
    Rc::new(driver)
}

fn dpad_mask(value: i32) -> u16 {
    let logical = if (0..=7).contains(&value) { value } else { -1 };
    let (x, y) = decode_dpad(logical);
    let mut mask = 0;
    if x < 0 {
        mask |= Button::Left.mask();
    }
    if x > 0 {
        mask |= Button::Right.mask();
    }
    if y < 0 {
        mask |= Button::Up.mask();
    }
    if y > 0 {
        mask |= Button::Down.mask();
    }
    mask
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(256))]

    /// insert_unique must leave the table strictly sorted with every distinct key present.
    #[test]
    fn prop_insert_unique_keeps_table_sorted(
        values in proptest::collection::vec(any::<i32>(), 0..64),
    ) {
        let mut table = Vec::new();
        for value in &values {
            sorted::insert_unique(&mut table, *value, |v| *v);
        }
        prop_assert!(sorted::is_strictly_sorted(&table, |v| *v));
        for value in &values {
            prop_assert!(sorted::search(&table, value, |v| *v).is_ok());
        }
    }

    /// Devices, the suspend set and every config's rules must stay strictly sorted
    /// through any sequence of host calls, and configs must never be duplicated.
    #[test]
    fn prop_manager_tables_stay_sorted(
        ops in proptest::collection::vec(op_strategy(), 1..60),
    ) {
        let targets = all_targets();
        let driver = pads_driver();
        let mut manager = InputManager::new(None, 4);

        for op in ops {
            match op {
                Op::Connect(0) => {
                    manager.connect(0, None).unwrap();
                }
                Op::Connect(devid) => {
                    // Devid 6 has no driver entry; connecting it must fail cleanly.
                    let result = manager.connect(devid, Some(&driver));
                    prop_assert!(devid == 6 || result.is_ok());
                }
                Op::Disconnect(devid) => {
                    manager.disconnect(devid).unwrap();
                }
                Op::Enable(devid, enable) => {
                    manager.enable_device(devid, enable).unwrap();
                }
                Op::Map(devid, raw_id, target) => {
                    let result = manager.set_mapping(devid, raw_id, targets[target]);
                    prop_assert_eq!(result.is_ok(), manager.device(devid).is_some());
                }
                Op::Raw(devid, raw_id, value) => {
                    manager.on_raw_event(devid, raw_id, value).unwrap();
                }
            }

            let devices = manager.device_ids();
            prop_assert!(sorted::is_strictly_sorted(&devices, |d| *d));
            prop_assert!(sorted::is_strictly_sorted(manager.suspended_devices(), |d| *d));
            for devid in manager.suspended_devices() {
                prop_assert!(devices.contains(devid), "suspended {} is not connected", devid);
            }
            for (_, config) in manager.configs() {
                prop_assert!(sorted::is_strictly_sorted(config.rules(), |r| r.raw_id));
            }
            // One keyboard config and one shared pad config at most
            prop_assert!(manager.configs().count() <= 2);
        }
    }

    /// Rule edits must keep a config sorted and agree with a plain map of the same edits.
    #[test]
    fn prop_rule_edits_match_model(
        edits in proptest::collection::vec((any::<bool>(), -8i32..8, 0usize..32), 0..80),
    ) {
        let targets = all_targets();
        let mut config = Config::new(0, 0, "Model");
        let mut model = BTreeMap::new();

        for (insert, raw_id, target) in edits {
            if insert {
                config.set_rule(raw_id, targets[target]);
                model.insert(raw_id, targets[target]);
            } else {
                let removed = config.remove_rule(raw_id).map(|rule| rule.target);
                prop_assert_eq!(removed, model.remove(&raw_id));
            }
            prop_assert!(sorted::is_strictly_sorted(config.rules(), |r| r.raw_id));
        }

        let rules: Vec<(i32, Target)> =
            config.rules().iter().map(|r| (r.raw_id, r.target)).collect();
        let expected: Vec<(i32, Target)> = model.into_iter().collect();
        prop_assert_eq!(rules, expected);
    }

    /// Encoding then decoding must reproduce every config exactly.
    #[test]
    fn prop_config_text_roundtrip(
        blocks in proptest::collection::vec(
            (
                any::<u16>(),
                any::<u16>(),
                "[A-Za-z0-9*][A-Za-z0-9 *]{0,15}",
                proptest::collection::btree_map(any::<i32>(), 0..44usize, 0..16),
            ),
            0..4,
        ),
    ) {
        let targets = all_targets();
        let configs: Vec<Config> = blocks
            .iter()
            .map(|(vendor, product, name, rules)| {
                let mut config = Config::new(*vendor, *product, name);
                for (raw_id, index) in rules {
                    config.add_rule(*raw_id, targets[*index % targets.len()]).unwrap();
                }
                config
            })
            .collect();

        let text = persist::encode(&configs);
        let decoded = persist::decode(&text).unwrap();
        prop_assert_eq!(decoded, configs);
    }

    /// Player state must always equal the D-pad's last direction, never holding opposites.
    #[test]
    fn prop_dpad_state_tracks_last_value(
        values in proptest::collection::vec(-3i32..12, 1..40),
    ) {
        let (mut manager, _driver) = pad_manager();
        for value in values {
            manager.on_raw_event(PAD, 1, value).unwrap();
            let state = manager.player_state(1);
            prop_assert_eq!(state, dpad_mask(value), "after raw value {}", value);

            let vertical = Button::Up.mask() | Button::Down.mask();
            let horizontal = Button::Left.mask() | Button::Right.mask();
            prop_assert_ne!(state & vertical, vertical);
            prop_assert_ne!(state & horizontal, horizontal);
        }
    }

    /// Delivering any raw event a second time must change nothing and emit no output.
    #[test]
    fn prop_repeated_event_is_idempotent(
        events in proptest::collection::vec((1i32..=6, -2i32..10), 1..40),
    ) {
        let (mut manager, _driver) = pad_manager();
        let outputs = Rc::new(Cell::new(0usize));
        let counter = Rc::clone(&outputs);
        manager
            .spy(move |_, event| {
                if event.output.is_some() {
                    counter.set(counter.get() + 1);
                }
                Ok(())
            })
            .unwrap();

        for (raw_id, value) in events {
            manager.on_raw_event(PAD, raw_id, value).unwrap();
            let state = manager.player_state(1);
            let before = outputs.get();

            manager.on_raw_event(PAD, raw_id, value).unwrap();
            prop_assert_eq!(manager.player_state(1), state);
            prop_assert_eq!(outputs.get(), before);
        }
    }

    /// Disabling a device must leave its player with nothing held.
    #[test]
    fn prop_disable_releases_everything(
        events in proptest::collection::vec((1i32..=6, -2i32..10), 0..30),
    ) {
        let (mut manager, _driver) = pad_manager();
        for (raw_id, value) in events {
            manager.on_raw_event(PAD, raw_id, value).unwrap();
        }
        manager.enable_device(PAD, false).unwrap();
        prop_assert_eq!(manager.player_state(0), 0);
    }
}
