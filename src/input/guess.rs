// Config guessing for devices with no matching config

use super::button::{Button, Signal, Target};
use super::config::Config;
use super::driver::{
    Capability, DeviceIdentity, USAGE_PAGE_BUTTON, USAGE_PAGE_KEYBOARD,
};
use crate::util::sorted;
use log::{debug, info};

/// Guessed configs with fewer rules than this are never usable
pub const MIN_GUESSED_RULES: usize = 5;

/// Where a guessed rule is headed before resolution
///
/// The wide classes only exist while guessing; every rule is an `Exact`
/// target by the time a config leaves this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    Exact(Target),
    /// HORZ or VERT
    Axes,
    /// One of the four face buttons
    Thumbs,
    /// L1 or R1
    Triggers,
    /// Any two-state button from LEFT through R2
    Any,
}

impl Pending {
    /// Whether a raw range `lo..=hi` can drive this class
    pub fn fits_range(self, lo: i32, hi: i32) -> bool {
        let span = i64::from(hi) - i64::from(lo);
        match self {
            Pending::Axes | Pending::Exact(Target::Horz) | Pending::Exact(Target::Vert) => {
                span >= 2
            }
            Pending::Exact(Target::Dpad) => span == 7,
            _ => span >= 1,
        }
    }
}

/// Decide what a capability probably is, from its HID usage or failing that its range
pub fn classify(cap: &Capability) -> Option<Pending> {
    match cap.usage_page() {
        USAGE_PAGE_KEYBOARD => return None,
        USAGE_PAGE_BUTTON => return Some(Pending::Any),
        _ => {}
    }

    let exact = match cap.usage {
        0x0001_0030 | 0x0001_0033 => Some(Target::Horz),
        0x0001_0031 | 0x0001_0034 => Some(Target::Vert),
        0x0001_0039 => Some(Target::Dpad),
        0x0001_003d => Some(Button::Aux1.into()),
        0x0001_003e => Some(Button::Aux2.into()),
        0x0001_0090 => Some(Button::Up.into()),
        0x0001_0091 => Some(Button::Down.into()),
        0x0001_0092 => Some(Button::Right.into()),
        0x0001_0093 => Some(Button::Left.into()),
        0x0005_0037 => return Some(Pending::Thumbs),
        0x0005_0039 => return Some(Pending::Triggers),
        _ => None,
    };
    if let Some(target) = exact {
        return Some(Pending::Exact(target));
    }

    let (lo, hi) = (i64::from(cap.lo), i64::from(cap.hi));
    if lo == -hi {
        Some(Pending::Axes)
    } else if hi - lo == 7 {
        Some(Pending::Exact(Target::Dpad))
    } else if hi - lo == 1 || (lo == 0 && hi == 2) {
        Some(Pending::Any)
    } else if lo == 0 && hi > 2 {
        Some(Pending::Axes)
    } else {
        None
    }
}

/// Per-button rule counts used to spread pending rules around
#[derive(Debug, Default)]
struct Counts([usize; 16]);

impl Counts {
    fn get(&self, button: Button) -> usize {
        self.0[button as usize]
    }

    fn bump(&mut self, button: Button) {
        self.0[button as usize] += 1;
    }

    fn add(&mut self, target: Target) {
        match target {
            Target::Button(button) => self.bump(button),
            Target::Horz => {
                self.bump(Button::Left);
                self.bump(Button::Right);
            }
            Target::Vert => {
                self.bump(Button::Up);
                self.bump(Button::Down);
            }
            Target::Dpad => {
                self.add(Target::Horz);
                self.add(Target::Vert);
            }
            Target::None | Target::Signal(_) => {}
        }
    }

    /// First of `candidates` holding the smallest count
    fn least(&self, candidates: &[Button]) -> Button {
        let mut best = candidates[0];
        for &button in &candidates[1..] {
            if self.get(button) < self.get(best) {
                best = button;
            }
        }
        best
    }
}

fn choose_axis(counts: &Counts) -> Target {
    let horz = counts.get(Button::Left).min(counts.get(Button::Right));
    let vert = counts.get(Button::Up).min(counts.get(Button::Down));
    if horz <= vert {
        Target::Horz
    } else {
        Target::Vert
    }
}

fn choose_trigger(counts: &Counts) -> Target {
    counts.least(&[Button::L1, Button::R1]).into()
}

fn choose_thumb(counts: &Counts) -> Target {
    counts
        .least(&[Button::South, Button::West, Button::East, Button::North])
        .into()
}

fn choose_any(counts: &Counts) -> Target {
    counts.least(&Button::ALL[..12]).into()
}

/// Turn every pending rule into a concrete target
///
/// Returns `None` if the result would not be a usable config.
pub fn resolve(pending: &[(i32, Pending)]) -> Option<Vec<(i32, Target)>> {
    if pending.len() < MIN_GUESSED_RULES {
        return None;
    }

    let mut counts = Counts::default();
    for (_, p) in pending {
        if let Pending::Exact(target) = p {
            counts.add(*target);
        }
    }

    let mut resolved: Vec<(i32, Option<Target>)> = pending
        .iter()
        .map(|(raw_id, p)| match p {
            Pending::Exact(target) => (*raw_id, Some(*target)),
            _ => (*raw_id, None),
        })
        .collect();

    // Each pass goes in raw id order. Ties favor HORZ, L1, then face buttons in order.
    let passes: [(Pending, fn(&Counts) -> Target); 4] = [
        (Pending::Axes, choose_axis),
        (Pending::Triggers, choose_trigger),
        (Pending::Thumbs, choose_thumb),
        (Pending::Any, choose_any),
    ];

    for (class, choose) in passes {
        for (index, (_, p)) in pending.iter().enumerate() {
            if *p != class {
                continue;
            }
            let target = choose(&counts);
            counts.add(target);
            resolved[index].1 = Some(target);
        }
    }

    let required = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::South,
    ];
    if required.iter().any(|button| counts.get(*button) == 0) {
        return None;
    }

    Some(
        resolved
            .into_iter()
            .filter_map(|(raw_id, target)| target.map(|t| (raw_id, t)))
            .collect(),
    )
}

/// Make up a config for a device from what its driver reports
pub fn guess_config(identity: &DeviceIdentity, capabilities: &[Capability]) -> Option<Config> {
    let mut pending: Vec<(i32, Pending)> = Vec::new();
    for cap in capabilities {
        let Some(class) = classify(cap) else {
            continue;
        };
        if !class.fits_range(cap.lo, cap.hi) {
            continue;
        }
        // Drivers sometimes report a control twice; the first report wins.
        if sorted::insert_unique(&mut pending, (cap.raw_id, class), |(raw_id, _)| *raw_id).is_none()
        {
            debug!("Ignoring duplicate raw button 0x{:08x}", cap.raw_id);
        }
    }

    let Some(rules) = resolve(&pending) else {
        info!(
            "Could not guess a config for '{}' ({} candidate controls)",
            identity.name,
            pending.len()
        );
        return None;
    };

    let mut config = Config::for_identity(identity);
    for (raw_id, target) in rules {
        config.set_rule(raw_id, target);
    }
    info!(
        "Guessed config for '{}' {:04x}:{:04x} with {} rules",
        identity.name,
        identity.vendor,
        identity.product,
        config.rules().len()
    );
    Some(config)
}

/// Fixed map for the system keyboard, keyed by HID page 7 codes
const KEYBOARD_MAP: [(u32, Target); 17] = [
    (0x0007_0050, Target::Button(Button::Left)),
    (0x0007_004f, Target::Button(Button::Right)),
    (0x0007_0052, Target::Button(Button::Up)),
    (0x0007_0051, Target::Button(Button::Down)),
    (0x0007_001d, Target::Button(Button::South)),
    (0x0007_001b, Target::Button(Button::West)),
    (0x0007_0004, Target::Button(Button::East)),
    (0x0007_0016, Target::Button(Button::North)),
    (0x0007_0035, Target::Button(Button::L1)),
    (0x0007_002a, Target::Button(Button::R1)),
    (0x0007_002b, Target::Button(Button::L2)),
    (0x0007_0031, Target::Button(Button::R2)),
    (0x0007_0028, Target::Button(Button::Aux1)),
    (0x0007_002c, Target::Button(Button::Aux2)),
    (0x0007_0038, Target::Button(Button::Aux3)),
    (0x0007_0029, Target::Signal(Signal::Quit)),
    (0x0007_0044, Target::Signal(Signal::Fullscreen)),
];

/// Default config for the driverless system keyboard
///
/// Arrows for the D-pad, Z X A S for the face buttons, Enter/Space/Slash for
/// AUX, Escape to quit and F11 for fullscreen.
pub fn keyboard_config() -> Config {
    let mut config = Config::for_identity(&DeviceIdentity::system_keyboard());
    for (code, target) in KEYBOARD_MAP {
        config.set_rule(code as i32, target);
    }
    config
}
