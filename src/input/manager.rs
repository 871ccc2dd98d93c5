// Main input manager coordinating devices, configs, players and listeners

use super::button::{decode_dpad, Button, Signal, Target};
use super::config::{Config, ConfigHandle, ConfigRegistry};
use super::device::{neutral_value, Device};
use super::driver::{Capability, DeviceIdentity, InputDriver};
use super::guess;
use super::listener::{
    InputDelegate, InputEvent, ListenerFn, ListenerId, ListenerRegistry, ListenerScope,
    OutputEvent, Source,
};
use super::persist;
use super::player::{clamp_player_count, pick_player, Player};
use super::{DeviceId, InputError, PlayerId};
use crate::util::sorted;
use log::{debug, info, trace};
use std::cell::RefCell;
use std::rc::Rc;

/// Main input manager
///
/// Feed it connects, disconnects and raw events from the platform drivers;
/// read back per-player button states or listen for changes.
pub struct InputManager {
    delegate: Option<Box<dyn InputDelegate>>,

    /// Player N lives at index N-1
    players: Vec<Player>,

    /// Sorted by device id
    devices: Vec<Device>,

    configs: ConfigRegistry,
    listeners: ListenerRegistry,

    /// Disabled device ids, sorted
    suspended: Vec<DeviceId>,
}

impl InputManager {
    /// Create a new input manager with a fixed number of players (1 to 31)
    pub fn new(delegate: Option<Box<dyn InputDelegate>>, player_count: usize) -> Self {
        let player_count = clamp_player_count(player_count);
        info!("Input manager created with {} players", player_count);

        Self {
            delegate,
            players: (1..=player_count).map(Player::new).collect(),
            devices: Vec::new(),
            configs: ConfigRegistry::new(),
            listeners: ListenerRegistry::new(),
            suspended: Vec::new(),
        }
    }

    pub fn set_delegate(&mut self, delegate: Option<Box<dyn InputDelegate>>) {
        self.delegate = delegate;
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        player_id
            .checked_sub(1)
            .and_then(|index| self.players.get(index))
    }

    fn player_mut(&mut self, player_id: PlayerId) -> Option<&mut Player> {
        player_id
            .checked_sub(1)
            .and_then(move |index| self.players.get_mut(index))
    }

    /// Button state for one player, or every player OR'd together for id 0
    pub fn player_state(&self, player_id: PlayerId) -> u16 {
        if player_id == 0 {
            return self.players.iter().fold(0, |state, p| state | p.state());
        }
        self.player(player_id).map_or(0, Player::state)
    }

    // ---- Devices ----

    fn device_index(&self, devid: DeviceId) -> Result<usize, usize> {
        sorted::search(&self.devices, &devid, |d| d.devid())
    }

    pub fn device(&self, devid: DeviceId) -> Option<&Device> {
        self.device_index(devid).ok().map(|index| &self.devices[index])
    }

    /// Connected device ids, ascending
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.iter().map(Device::devid).collect()
    }

    pub fn device_identity(&self, devid: DeviceId) -> Option<DeviceIdentity> {
        self.device(devid).map(Device::identity)
    }

    /// Every control a connected device can report
    pub fn device_capabilities(&self, devid: DeviceId) -> Result<Vec<Capability>, InputError> {
        self.device(devid)
            .ok_or(InputError::UnknownDevice(devid))?
            .capabilities()
    }

    /// Config a device is using, if that config still exists
    pub fn device_config(&self, devid: DeviceId) -> Option<ConfigHandle> {
        self.device(devid)
            .and_then(Device::config)
            .filter(|handle| self.configs.contains(*handle))
    }

    /// Attach a device
    ///
    /// A device with no driver is taken to be the system keyboard. Devices
    /// without a matching config get a guessed one; if guessing fails the
    /// device is ignored and this returns `Ok(false)`. Connecting a device
    /// twice is also `Ok(false)`.
    pub fn connect(
        &mut self,
        devid: DeviceId,
        driver: Option<&Rc<dyn InputDriver>>,
    ) -> Result<bool, InputError> {
        let index = match self.device_index(devid) {
            Ok(_) => {
                debug!("Device {} is already connected", devid);
                return Ok(false);
            }
            Err(index) => index,
        };

        let mut device = Device::new(devid, driver);
        let identity = device.identity();

        let handle = match self.configs.find_by_identity(&identity) {
            Some(handle) => handle,
            None => {
                let guessed = if device.is_keyboard() {
                    Some(guess::keyboard_config())
                } else {
                    guess::guess_config(&identity, &device.capabilities()?)
                };
                let Some(config) = guessed else {
                    info!(
                        "Dropping unconfigurable device {} '{}'",
                        devid, identity.name
                    );
                    return Ok(false);
                };
                let handle = self.configs.add(config);
                self.config_dirty();
                handle
            }
        };

        let config = self
            .configs
            .get(handle)
            .ok_or(InputError::NoConfig(devid))?;
        device.compile(config)?;
        device.set_config(Some(handle));
        info!(
            "Connected device {} '{}' {:04x}:{:04x} ({} buttons)",
            devid,
            identity.name,
            identity.vendor,
            identity.product,
            device.buttons().len()
        );

        self.devices.insert(index, device);
        self.broadcast(&InputEvent::source(Source::Connect(devid)))?;
        Ok(true)
    }

    /// Detach a device, releasing anything it was holding
    ///
    /// Fails with [`InputError::DeviceListChanged`] if a listener changed the
    /// device list while hearing about the disconnect.
    pub fn disconnect(&mut self, devid: DeviceId) -> Result<bool, InputError> {
        let Ok(index) = self.device_index(devid) else {
            return Ok(false);
        };

        self.zero_outputs(devid)?;

        if let Ok(current) = self.device_index(devid) {
            let device = &mut self.devices[current];
            let player_id = std::mem::take(&mut device.player_id);
            let counted = !device.is_keyboard();
            if counted {
                if let Some(player) = self.player_mut(player_id) {
                    player.detach_device();
                }
            }
        }

        self.broadcast(&InputEvent::source(Source::Disconnect(devid)))?;

        match self.devices.get(index) {
            Some(device) if device.devid() == devid => {
                self.devices.remove(index);
            }
            _ => return Err(InputError::DeviceListChanged),
        }
        if let Ok(index) = sorted::search(&self.suspended, &devid, |d| *d) {
            self.suspended.remove(index);
        }
        info!("Disconnected device {}", devid);
        Ok(true)
    }

    /// Player this device feeds, assigning one on first use
    fn require_player(&mut self, devid: DeviceId) -> Option<PlayerId> {
        let index = self.device_index(devid).ok()?;
        let device = &self.devices[index];
        if device.player_id != 0 {
            return Some(device.player_id);
        }

        // The system keyboard always drives player 1 without counting as one of its devices.
        let player_id = if device.is_keyboard() {
            1
        } else {
            let player_id = pick_player(&self.players)?;
            self.player_mut(player_id)?.attach_device();
            player_id
        };
        self.devices[index].player_id = player_id;
        debug!("Device {} assigned to player {}", devid, player_id);
        Some(player_id)
    }

    // ---- Events ----

    /// Process one raw event from a driver
    pub fn on_raw_event(
        &mut self,
        devid: DeviceId,
        raw_id: i32,
        raw_value: i32,
    ) -> Result<(), InputError> {
        let source = Source::Raw {
            devid,
            raw_id,
            raw_value,
        };
        self.broadcast(&InputEvent::source(source))?;

        if !self.is_device_enabled(devid) {
            return Ok(());
        }
        let Ok(index) = self.device_index(devid) else {
            return Ok(());
        };
        let Some(button) = self.devices[index].button_mut(raw_id) else {
            return Ok(());
        };
        let Some(previous) = button.update(raw_value) else {
            return Ok(());
        };
        let (target, current) = (button.target, button.logical);
        trace!(
            "Device {} 0x{:08x}={} -> {} {} (was {})",
            devid,
            raw_id,
            raw_value,
            target,
            current,
            previous
        );

        self.broadcast(&InputEvent::source(Source::Changed {
            devid,
            raw_id,
            raw_value,
            logical: current,
        }))?;

        if target == Target::None {
            return Ok(());
        }
        // Listeners may have disabled, remapped or disconnected the device in the meantime.
        if !self.is_device_enabled(devid) {
            return Ok(());
        }
        let unchanged = self
            .device(devid)
            .and_then(|device| device.button(raw_id))
            .map_or(false, |button| {
                button.target == target && button.logical == current
            });
        if !unchanged {
            debug!(
                "Device {} 0x{:08x} changed under its own event, dropping it",
                devid, raw_id
            );
            return Ok(());
        }
        let Some(player_id) = self.require_player(devid) else {
            return Ok(());
        };
        self.apply_transition(player_id, target, previous, current, source)
    }

    /// Emit the player changes for one logical value moving from `previous` to `current`
    fn apply_transition(
        &mut self,
        player_id: PlayerId,
        target: Target,
        previous: i32,
        current: i32,
        source: Source,
    ) -> Result<(), InputError> {
        match target {
            Target::None => Ok(()),
            Target::Signal(signal) => {
                if current != 0 {
                    self.fire_signal(player_id, signal, source)?;
                }
                Ok(())
            }
            Target::Button(button) => self.set_player_button(player_id, button, current != 0, source),
            Target::Horz => {
                self.move_axis(player_id, (Button::Left, Button::Right), previous, current, source)
            }
            Target::Vert => {
                self.move_axis(player_id, (Button::Up, Button::Down), previous, current, source)
            }
            Target::Dpad => {
                let (px, py) = decode_dpad(previous);
                let (nx, ny) = decode_dpad(current);
                if py != ny {
                    self.move_axis(player_id, (Button::Up, Button::Down), py, ny, source)?;
                }
                if px != nx {
                    self.move_axis(player_id, (Button::Left, Button::Right), px, nx, source)?;
                }
                Ok(())
            }
        }
    }

    /// Release the side an axis was on, then press the side it is on now
    fn move_axis(
        &mut self,
        player_id: PlayerId,
        (low, high): (Button, Button),
        previous: i32,
        current: i32,
        source: Source,
    ) -> Result<(), InputError> {
        if previous < 0 {
            self.set_player_button(player_id, low, false, source)?;
        } else if previous > 0 {
            self.set_player_button(player_id, high, false, source)?;
        }
        if current < 0 {
            self.set_player_button(player_id, low, true, source)?;
        } else if current > 0 {
            self.set_player_button(player_id, high, true, source)?;
        }
        Ok(())
    }

    fn set_player_button(
        &mut self,
        player_id: PlayerId,
        button: Button,
        on: bool,
        source: Source,
    ) -> Result<(), InputError> {
        let Some(player) = self.player_mut(player_id) else {
            return Ok(());
        };
        if !player.set_button(button, on) {
            return Ok(());
        }
        let output = OutputEvent {
            player_id,
            target: button.into(),
            value: on,
            state: player.state(),
        };
        self.broadcast(&InputEvent::output(source, output))
    }

    fn fire_signal(
        &mut self,
        player_id: PlayerId,
        signal: Signal,
        source: Source,
    ) -> Result<(), InputError> {
        debug!("Signal {} from player {}", signal.name(), player_id);
        let output = OutputEvent {
            player_id,
            target: signal.into(),
            value: true,
            state: self.player_state(player_id),
        };
        self.broadcast(&InputEvent::output(source, output))
    }

    /// Push an output event directly, bypassing devices and configs
    ///
    /// Compound targets set or clear each button they cover.
    pub fn artificial_event(
        &mut self,
        player_id: PlayerId,
        target: Target,
        on: bool,
    ) -> Result<(), InputError> {
        match target {
            Target::None => Ok(()),
            Target::Signal(signal) => {
                if on {
                    self.fire_signal(player_id, signal, Source::None)?;
                }
                Ok(())
            }
            Target::Button(button) => self.set_player_button(player_id, button, on, Source::None),
            Target::Horz | Target::Vert | Target::Dpad => {
                let mask = target.code() as u16;
                for button in Button::ALL {
                    if mask & button.mask() != 0 {
                        self.set_player_button(player_id, button, on, Source::None)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Return every non-neutral button on a device to neutral, emitting the releases
    fn zero_outputs(&mut self, devid: DeviceId) -> Result<(), InputError> {
        let Ok(index) = self.device_index(devid) else {
            return Ok(());
        };
        let device = &mut self.devices[index];
        let player_id = device.player_id();
        let released: Vec<(i32, i32, Target, i32)> = device
            .buttons_mut()
            .iter_mut()
            .filter(|button| !button.is_neutral())
            .map(|button| {
                let previous = button.rest();
                (button.raw_id, button.resting_value(), button.target, previous)
            })
            .collect();

        for (raw_id, raw_value, target, previous) in released {
            let source = Source::Raw {
                devid,
                raw_id,
                raw_value,
            };
            self.apply_transition(player_id, target, previous, neutral_value(target), source)?;
        }
        Ok(())
    }

    // ---- Suspension ----

    /// Enable or disable a device. Returns true if anything changed.
    ///
    /// Disabled devices still produce source notifications but never touch
    /// player state; disabling releases whatever the device was holding.
    /// Devices that aren't connected can't be disabled.
    pub fn enable_device(&mut self, devid: DeviceId, enable: bool) -> Result<bool, InputError> {
        if !enable && self.device(devid).is_none() {
            return Ok(false);
        }
        match sorted::search(&self.suspended, &devid, |d| *d) {
            Ok(index) => {
                if !enable {
                    return Ok(false);
                }
                self.suspended.remove(index);
                debug!("Device {} enabled", devid);
                Ok(true)
            }
            Err(index) => {
                if enable {
                    return Ok(false);
                }
                self.suspended.insert(index, devid);
                debug!("Device {} disabled", devid);
                self.zero_outputs(devid)?;
                Ok(true)
            }
        }
    }

    pub fn is_device_enabled(&self, devid: DeviceId) -> bool {
        sorted::search(&self.suspended, &devid, |d| *d).is_err()
    }

    /// Disabled device ids, ascending
    pub fn suspended_devices(&self) -> &[DeviceId] {
        &self.suspended
    }

    // ---- Mapping ----

    /// Target a device's raw control is currently compiled to
    pub fn mapping(&self, devid: DeviceId, raw_id: i32) -> Option<Target> {
        self.device(devid)?.button(raw_id).map(|button| button.target)
    }

    /// Change one rule in a device's config
    ///
    /// Every device sharing the config is released and recompiled. Returns
    /// false if the rule already said that.
    pub fn set_mapping(
        &mut self,
        devid: DeviceId,
        raw_id: i32,
        target: Target,
    ) -> Result<bool, InputError> {
        if self.device(devid).is_none() {
            return Err(InputError::UnknownDevice(devid));
        }
        let handle = self
            .device_config(devid)
            .ok_or(InputError::NoConfig(devid))?;
        let config = self
            .configs
            .get_mut(handle)
            .ok_or(InputError::NoConfig(devid))?;

        match config.rule(raw_id) {
            None if target == Target::None => return Ok(false),
            Some(rule) if rule.target == target => return Ok(false),
            _ => {}
        }
        config.set_rule(raw_id, target);
        debug!("Device {}: 0x{:08x} now maps to {}", devid, raw_id, target);

        let sharing: Vec<DeviceId> = self
            .devices
            .iter()
            .filter(|d| d.config() == Some(handle))
            .map(Device::devid)
            .collect();
        for devid in sharing {
            self.zero_outputs(devid)?;
        }
        self.recompile(handle)?;
        self.config_dirty();
        Ok(true)
    }

    fn recompile(&mut self, handle: ConfigHandle) -> Result<(), InputError> {
        let Some(config) = self.configs.get(handle) else {
            return Ok(());
        };
        for device in self.devices.iter_mut().filter(|d| d.config() == Some(handle)) {
            device.compile(config)?;
        }
        Ok(())
    }

    // ---- Configs ----

    pub fn configs(&self) -> impl Iterator<Item = (ConfigHandle, &Config)> + '_ {
        self.configs.iter()
    }

    pub fn config(&self, handle: ConfigHandle) -> Option<&Config> {
        self.configs.get(handle)
    }

    /// Append a config; it only applies to devices connected from now on
    pub fn add_config(&mut self, config: Config) -> ConfigHandle {
        let handle = self.configs.add(config);
        self.config_dirty();
        handle
    }

    /// Drop a config. Devices using it keep their compiled buttons.
    pub fn remove_config(&mut self, handle: ConfigHandle) -> Option<Config> {
        let config = self.configs.remove(handle)?;
        self.config_dirty();
        Some(config)
    }

    /// Decode a config file and append its configs. Returns how many were added.
    ///
    /// Nothing is added unless the whole file decodes.
    pub fn load_config(&mut self, bytes: &[u8]) -> Result<usize, InputError> {
        let text = String::from_utf8_lossy(bytes);
        let configs = persist::decode(&text)?;
        let count = configs.len();
        for config in configs {
            self.configs.add(config);
        }
        info!("Loaded {} input configs", count);
        Ok(count)
    }

    /// Encode every config in registry order
    pub fn save_config(&self) -> Vec<u8> {
        persist::encode(self.configs.iter().map(|(_, config)| config)).into_bytes()
    }

    fn config_dirty(&mut self) {
        if let Some(delegate) = self.delegate.as_mut() {
            delegate.on_config_dirty();
        }
    }

    // ---- Listeners ----

    /// Register a listener
    ///
    /// `All` and `Device` listeners immediately hear a connect event for
    /// every matching device already attached. If the callback fails during
    /// that replay it is unregistered again and the error returned. It may
    /// unlisten itself to cut the replay short, but adding or removing other
    /// listeners from the replay is an error.
    pub fn listen<F>(&mut self, scope: ListenerScope, callback: F) -> Result<ListenerId, InputError>
    where
        F: FnMut(&mut InputManager, &InputEvent) -> Result<(), InputError> + 'static,
    {
        if let ListenerScope::Player(Some(player_id)) = scope {
            if self.player(player_id).is_none() {
                return Err(InputError::InvalidPlayer(player_id));
            }
        }

        let callback: Rc<RefCell<ListenerFn>> = Rc::new(RefCell::new(callback));
        let id = self.listeners.add(scope, Rc::clone(&callback))?;
        if scope.replays_connections() {
            self.replay_connections(id, scope, &callback)?;
        }
        Ok(id)
    }

    /// Listen to everything
    pub fn spy<F>(&mut self, callback: F) -> Result<ListenerId, InputError>
    where
        F: FnMut(&mut InputManager, &InputEvent) -> Result<(), InputError> + 'static,
    {
        self.listen(ListenerScope::All, callback)
    }

    pub fn unlisten(&mut self, id: ListenerId) -> Result<(), InputError> {
        self.listeners.remove(id)
    }

    fn replay_connections(
        &mut self,
        id: ListenerId,
        scope: ListenerScope,
        callback: &Rc<RefCell<ListenerFn>>,
    ) -> Result<(), InputError> {
        let events: Vec<InputEvent> = self
            .devices
            .iter()
            .map(|device| InputEvent::source(Source::Connect(device.devid())))
            .filter(|event| scope.accepts(event))
            .collect();
        let revision = self.listeners.revision();

        for event in events {
            let result = match callback.try_borrow_mut() {
                Ok(mut callback) => (&mut *callback)(self, &event),
                Err(_) => Err(InputError::ListenerListChanged),
            };
            if let Err(err) = result {
                if self.listeners.contains(id) {
                    self.listeners.remove(id)?;
                }
                return Err(err);
            }
            if !self.listeners.contains(id) {
                return Ok(());
            }
            if self.listeners.revision() != revision {
                self.listeners.remove(id)?;
                return Err(InputError::ListenerListChanged);
            }
        }
        Ok(())
    }

    /// Deliver an event to the delegate, then matching listeners newest first
    ///
    /// Listeners are looked up again right before each call, so one removed
    /// by an earlier callback is skipped. So is one already running further
    /// up the stack.
    fn broadcast(&mut self, event: &InputEvent) -> Result<(), InputError> {
        if let Some(delegate) = self.delegate.as_mut() {
            delegate.on_event(event)?;
            if let Some(output) = &event.output {
                if let (Some(signal), true) = (output.signal(), output.value) {
                    delegate.on_signal(signal, output.player_id);
                }
            }
        }

        for id in self.listeners.matching(event) {
            let Some(cell) = self.listeners.callback(id) else {
                continue;
            };
            let Ok(mut callback) = cell.try_borrow_mut() else {
                trace!("Listener {} is already running, skipping", id);
                continue;
            };
            (&mut *callback)(self, event)?;
        }
        Ok(())
    }
}
