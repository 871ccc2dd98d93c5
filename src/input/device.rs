// Connected devices and their compiled button tables

use super::button::{Target, TargetClass};
use super::config::{Config, ConfigHandle, Rule};
use super::driver::{keyboard_capabilities, Capability, DeviceIdentity, InputDriver};
use super::{DeviceId, InputError, PlayerId};
use crate::util::sorted;
use log::{debug, trace};
use std::rc::{Rc, Weak};

/// Logical value of a D-pad at rest
pub const DPAD_NEUTRAL: i32 = -1;

/// One raw control of a device, compiled against its rule
///
/// `logical` is the interpreted value: 0 or 1 for two-state and signal
/// buttons, -1..=1 for axes, 0..=7 clockwise from north for a D-pad
/// ([`DPAD_NEUTRAL`] when centered).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceButton {
    pub raw_id: i32,
    pub target: Target,

    /// Last raw value seen; `None` until the first event
    pub raw_value: Option<i32>,
    pub logical: i32,

    /// Interpretation range. For axes these are the low and high thresholds.
    pub lo: i32,
    pub hi: i32,
}

impl DeviceButton {
    fn new(raw_id: i32, target: Target, lo: i32, hi: i32) -> Self {
        Self {
            raw_id,
            target,
            raw_value: None,
            logical: neutral_value(target),
            lo,
            hi,
        }
    }

    /// Interpret a raw value without touching any state
    pub fn evaluate(&self, raw: i32) -> i32 {
        match self.target.class() {
            TargetClass::Dpad => {
                let value = if self.lo < self.hi {
                    i64::from(raw) - i64::from(self.lo)
                } else {
                    i64::from(raw) - i64::from(self.hi)
                };
                if (0..=7).contains(&value) {
                    value as i32
                } else {
                    DPAD_NEUTRAL
                }
            }
            TargetClass::Axis => {
                if self.lo < self.hi {
                    if raw <= self.lo {
                        -1
                    } else if raw >= self.hi {
                        1
                    } else {
                        0
                    }
                } else if raw <= self.hi {
                    1
                } else if raw >= self.lo {
                    -1
                } else {
                    0
                }
            }
            TargetClass::TwoState | TargetClass::Signal => {
                i32::from(raw >= self.lo && raw <= self.hi)
            }
            TargetClass::None => 0,
        }
    }

    /// Feed a raw value. Returns the previous logical value if it changed.
    pub fn update(&mut self, raw: i32) -> Option<i32> {
        if self.raw_value == Some(raw) {
            return None;
        }
        self.raw_value = Some(raw);
        let logical = self.evaluate(raw);
        if logical == self.logical {
            return None;
        }
        Some(std::mem::replace(&mut self.logical, logical))
    }

    pub fn is_neutral(&self) -> bool {
        self.logical == neutral_value(self.target)
    }

    /// Raw value that reads as neutral for this button
    pub fn resting_value(&self) -> i32 {
        match self.target.class() {
            TargetClass::Axis => self.lo.saturating_add(1),
            _ => self.lo.saturating_sub(1),
        }
    }

    /// Force the button back to neutral, as if its resting value had arrived.
    /// Returns the previous logical value.
    pub fn rest(&mut self) -> i32 {
        self.raw_value = Some(self.resting_value());
        std::mem::replace(&mut self.logical, neutral_value(self.target))
    }
}

/// Logical value a freshly compiled button starts at
pub fn neutral_value(target: Target) -> i32 {
    match target.class() {
        TargetClass::Dpad => DPAD_NEUTRAL,
        _ => 0,
    }
}

/// Thresholds splitting a raw axis range into low, center and high
///
/// Quarter points of the range, each pushed at least one unit off the
/// midpoint and clamped to the range.
pub fn axis_thresholds(lo: i32, hi: i32) -> (i32, i32) {
    let (lo, hi) = (i64::from(lo), i64::from(hi));
    let mid = (lo + hi) >> 1;
    let mut low = (lo + mid) >> 1;
    let mut high = (hi + mid) >> 1;
    if low >= mid {
        low -= 1;
    }
    if high <= mid {
        high += 1;
    }
    (low.max(lo) as i32, high.min(hi) as i32)
}

/// Compile one rule against what the driver says about the control
pub fn compile_button(rule: &Rule, cap: &Capability) -> Option<DeviceButton> {
    let span = i64::from(cap.hi) - i64::from(cap.lo);
    let (lo, hi) = match rule.target.class() {
        TargetClass::None => return None,
        TargetClass::Dpad => {
            if span != 7 {
                return None;
            }
            (cap.lo, cap.hi)
        }
        TargetClass::Axis => {
            if span < 2 {
                return None;
            }
            axis_thresholds(cap.lo, cap.hi)
        }
        TargetClass::TwoState | TargetClass::Signal => {
            if span < 1 {
                return None;
            }
            (cap.lo + 1, i32::MAX)
        }
    };
    Some(DeviceButton::new(rule.raw_id, rule.target, lo, hi))
}

/// Compile a rule with no driver to ask, assuming typical ranges
pub fn compile_optimistic(rule: &Rule) -> Option<DeviceButton> {
    let (lo, hi) = match rule.target.class() {
        TargetClass::None => return None,
        TargetClass::Dpad => (0, 7),
        TargetClass::Axis => (-1, 1),
        TargetClass::TwoState | TargetClass::Signal => (1, i32::MAX),
    };
    Some(DeviceButton::new(rule.raw_id, rule.target, lo, hi))
}

/// A connected device
///
/// A device with no driver is the system keyboard.
pub struct Device {
    devid: DeviceId,
    driver: Option<Weak<dyn InputDriver>>,
    config: Option<ConfigHandle>,

    /// 0 until the device produces its first mapped event
    pub(crate) player_id: PlayerId,

    /// Sorted by raw id
    buttons: Vec<DeviceButton>,
}

impl Device {
    pub fn new(devid: DeviceId, driver: Option<&Rc<dyn InputDriver>>) -> Self {
        Self {
            devid,
            driver: driver.map(Rc::downgrade),
            config: None,
            player_id: 0,
            buttons: Vec::new(),
        }
    }

    pub fn devid(&self) -> DeviceId {
        self.devid
    }

    pub fn is_keyboard(&self) -> bool {
        self.driver.is_none()
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn config(&self) -> Option<ConfigHandle> {
        self.config
    }

    pub(crate) fn set_config(&mut self, config: Option<ConfigHandle>) {
        self.config = config;
    }

    fn driver(&self) -> Result<Option<Rc<dyn InputDriver>>, InputError> {
        match &self.driver {
            None => Ok(None),
            Some(weak) => weak.upgrade().map(Some).ok_or_else(|| {
                InputError::Driver(format!("Driver for device {} is gone", self.devid))
            }),
        }
    }

    pub fn identity(&self) -> DeviceIdentity {
        match self.driver() {
            Ok(None) => DeviceIdentity::system_keyboard(),
            Ok(Some(driver)) => driver.identity(self.devid).unwrap_or_default(),
            Err(_) => DeviceIdentity::default(),
        }
    }

    /// Everything the device can report, straight from its driver
    pub fn capabilities(&self) -> Result<Vec<Capability>, InputError> {
        match self.driver()? {
            None => Ok(keyboard_capabilities()),
            Some(driver) => driver.list_buttons(self.devid),
        }
    }

    pub fn buttons(&self) -> &[DeviceButton] {
        &self.buttons
    }

    pub fn button(&self, raw_id: i32) -> Option<&DeviceButton> {
        sorted::search(&self.buttons, &raw_id, |b| b.raw_id)
            .ok()
            .map(|index| &self.buttons[index])
    }

    pub fn button_mut(&mut self, raw_id: i32) -> Option<&mut DeviceButton> {
        sorted::search(&self.buttons, &raw_id, |b| b.raw_id)
            .ok()
            .map(move |index| &mut self.buttons[index])
    }

    pub(crate) fn buttons_mut(&mut self) -> &mut [DeviceButton] {
        &mut self.buttons
    }

    /// Rebuild the button table from a config
    ///
    /// Controls the driver doesn't report, or whose range can't drive the
    /// rule's target, are left out.
    pub fn compile(&mut self, config: &Config) -> Result<(), InputError> {
        let mut buttons = Vec::with_capacity(config.rules().len());
        match self.driver()? {
            Some(driver) => {
                for cap in driver.list_buttons(self.devid)? {
                    let Some(rule) = config.rule(cap.raw_id) else {
                        continue;
                    };
                    match compile_button(rule, &cap) {
                        Some(button) => {
                            sorted::insert_unique(&mut buttons, button, |b| b.raw_id);
                        }
                        None if rule.target != Target::None => debug!(
                            "Device {}: range {}..{} can't drive {} for 0x{:08x}",
                            self.devid, cap.lo, cap.hi, rule.target, cap.raw_id
                        ),
                        None => {}
                    }
                }
            }
            None => {
                buttons.extend(config.rules().iter().filter_map(compile_optimistic));
            }
        }
        trace!("Device {}: compiled {} buttons", self.devid, buttons.len());
        self.buttons = buttons;
        Ok(())
    }
}
