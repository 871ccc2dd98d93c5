// Boundary with the platform input drivers

use super::{DeviceId, InputError};
use std::collections::BTreeMap;

/// Name reported for the driverless system keyboard
pub const SYSTEM_KEYBOARD_NAME: &str = "System Keyboard";

/// HID usage pages we care about (upper 16 bits of a usage code)
pub const USAGE_PAGE_MASK: u32 = 0xffff_0000;
pub const USAGE_PAGE_KEYBOARD: u32 = 0x0007_0000;
pub const USAGE_PAGE_BUTTON: u32 = 0x0009_0000;

/// One control a device can report, as enumerated by its driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub raw_id: i32,
    /// HID-style usage (page << 16 | usage), 0 if unknown
    pub usage: u32,
    pub lo: i32,
    pub hi: i32,
    /// Value at enumeration time
    pub value: i32,
}

impl Capability {
    pub fn new(raw_id: i32, usage: u32, lo: i32, hi: i32) -> Self {
        Self {
            raw_id,
            usage,
            lo,
            hi,
            value: lo,
        }
    }

    pub fn with_value(mut self, value: i32) -> Self {
        self.value = value;
        self
    }

    pub fn usage_page(&self) -> u32 {
        self.usage & USAGE_PAGE_MASK
    }
}

/// What a device says about itself; configs are matched against this
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub vendor: u16,
    pub product: u16,
    pub name: String,
}

impl DeviceIdentity {
    pub fn new(vendor: u16, product: u16, name: impl Into<String>) -> Self {
        Self {
            vendor,
            product,
            name: name.into(),
        }
    }

    /// Identity used for devices connected without a driver
    pub fn system_keyboard() -> Self {
        Self::new(0, 0, SYSTEM_KEYBOARD_NAME)
    }
}

/// Queries the input manager makes of a platform driver
///
/// Only called while connecting a device or compiling its button table.
pub trait InputDriver {
    /// Enumerate every control the device can report
    fn list_buttons(&self, devid: DeviceId) -> Result<Vec<Capability>, InputError>;

    fn has_device(&self, devid: DeviceId) -> bool;

    fn identity(&self, devid: DeviceId) -> Option<DeviceIdentity>;
}

/// Capabilities assumed for the system keyboard: most of HID page 7 plus modifiers
pub fn keyboard_capabilities() -> Vec<Capability> {
    (0x04..=0x63)
        .chain(0xe0..=0xe7)
        .map(|usage| {
            let code = USAGE_PAGE_KEYBOARD | usage;
            Capability::new(code as i32, code, 0, 2)
        })
        .collect()
}

#[derive(Debug, Clone)]
struct StaticDevice {
    identity: DeviceIdentity,
    capabilities: Vec<Capability>,
}

/// Driver backed by a fixed table of devices
///
/// Useful for virtual devices, replaying captures, and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticDriver {
    devices: BTreeMap<DeviceId, StaticDevice>,
}

impl StaticDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device to the table, replacing any previous entry for `devid`
    pub fn with_device(
        mut self,
        devid: DeviceId,
        identity: DeviceIdentity,
        capabilities: Vec<Capability>,
    ) -> Self {
        self.add_device(devid, identity, capabilities);
        self
    }

    pub fn add_device(
        &mut self,
        devid: DeviceId,
        identity: DeviceIdentity,
        capabilities: Vec<Capability>,
    ) {
        self.devices.insert(
            devid,
            StaticDevice {
                identity,
                capabilities,
            },
        );
    }

    pub fn remove_device(&mut self, devid: DeviceId) -> bool {
        self.devices.remove(&devid).is_some()
    }
}

impl InputDriver for StaticDriver {
    fn list_buttons(&self, devid: DeviceId) -> Result<Vec<Capability>, InputError> {
        self.devices
            .get(&devid)
            .map(|device| device.capabilities.clone())
            .ok_or(InputError::UnknownDevice(devid))
    }

    fn has_device(&self, devid: DeviceId) -> bool {
        self.devices.contains_key(&devid)
    }

    fn identity(&self, devid: DeviceId) -> Option<DeviceIdentity> {
        self.devices.get(&devid).map(|device| device.identity.clone())
    }
}
