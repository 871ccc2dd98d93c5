// Event listeners, scopes and the host delegate

use super::button::{Signal, Target};
use super::manager::InputManager;
use super::{DeviceId, InputError, PlayerId};
use std::cell::RefCell;
use std::rc::Rc;

/// Sequential listener id, starting at 1
pub type ListenerId = i32;

/// Listener callback. It may call back into the manager, including to unlisten itself.
pub type ListenerFn = dyn FnMut(&mut InputManager, &InputEvent) -> Result<(), InputError>;

/// Where an event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Synthetic output with no device behind it
    None,
    Connect(DeviceId),
    Disconnect(DeviceId),
    /// A raw value arrived from the driver
    Raw {
        devid: DeviceId,
        raw_id: i32,
        raw_value: i32,
    },
    /// A raw value moved its button to a new logical value
    Changed {
        devid: DeviceId,
        raw_id: i32,
        raw_value: i32,
        logical: i32,
    },
}

impl Source {
    pub fn devid(&self) -> Option<DeviceId> {
        match *self {
            Source::None => None,
            Source::Connect(devid) | Source::Disconnect(devid) => Some(devid),
            Source::Raw { devid, .. } | Source::Changed { devid, .. } => Some(devid),
        }
    }
}

/// A change to a player's digested state, or a fired signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputEvent {
    pub player_id: PlayerId,
    pub target: Target,
    pub value: bool,
    /// Player state after the change
    pub state: u16,
}

impl OutputEvent {
    pub fn signal(&self) -> Option<Signal> {
        match self.target {
            Target::Signal(signal) => Some(signal),
            _ => None,
        }
    }
}

/// Everything listeners are told about
///
/// Events without an output are source notifications: connects,
/// disconnects, raw values and logical changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub source: Source,
    pub output: Option<OutputEvent>,
}

impl InputEvent {
    pub fn source(source: Source) -> Self {
        Self {
            source,
            output: None,
        }
    }

    pub fn output(source: Source, output: OutputEvent) -> Self {
        Self {
            source,
            output: Some(output),
        }
    }

    pub fn is_connect(&self) -> bool {
        self.output.is_none() && matches!(self.source, Source::Connect(_))
    }

    pub fn is_disconnect(&self) -> bool {
        self.output.is_none() && matches!(self.source, Source::Disconnect(_))
    }
}

/// Which events a listener receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerScope {
    /// Everything, source and output
    All,
    /// Anything from one device, or from any device
    Device(Option<DeviceId>),
    /// Output for one player, or for any player
    Player(Option<PlayerId>),
}

impl ListenerScope {
    pub fn accepts(&self, event: &InputEvent) -> bool {
        match *self {
            ListenerScope::All => true,
            ListenerScope::Device(want) => match event.source.devid() {
                Some(devid) => want.map_or(true, |want| want == devid),
                None => false,
            },
            ListenerScope::Player(want) => match &event.output {
                Some(output) => want.map_or(true, |want| want == output.player_id),
                None => false,
            },
        }
    }

    /// Whether a new listener gets told about devices already connected
    pub fn replays_connections(&self) -> bool {
        !matches!(self, ListenerScope::Player(_))
    }
}

/// Host-side hooks; the one delegate hears everything before any listener
pub trait InputDelegate {
    fn on_event(&mut self, _event: &InputEvent) -> Result<(), InputError> {
        Ok(())
    }

    /// A signal fired for a player
    fn on_signal(&mut self, _signal: Signal, _player_id: PlayerId) {}

    /// The config registry changed and should probably be saved
    fn on_config_dirty(&mut self) {}
}

struct ListenerEntry {
    id: ListenerId,
    scope: ListenerScope,
    callback: Rc<RefCell<ListenerFn>>,
}

/// Registered listeners, oldest first
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Vec<ListenerEntry>,

    /// Bumped on every add or remove
    revision: u64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener and return its id
    ///
    /// Ids count up from the newest listener and start over at 1 once the
    /// list is empty.
    pub fn add(
        &mut self,
        scope: ListenerScope,
        callback: Rc<RefCell<ListenerFn>>,
    ) -> Result<ListenerId, InputError> {
        let id = match self.entries.last() {
            None => 1,
            Some(last) => last
                .id
                .checked_add(1)
                .ok_or(InputError::ListenerIdsExhausted)?,
        };
        self.entries.push(ListenerEntry {
            id,
            scope,
            callback,
        });
        self.revision += 1;
        Ok(id)
    }

    pub fn remove(&mut self, id: ListenerId) -> Result<(), InputError> {
        let index = self
            .entries
            .binary_search_by_key(&id, |entry| entry.id)
            .map_err(|_| InputError::UnknownListener(id))?;
        self.entries.remove(index);
        self.revision += 1;
        Ok(())
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries
            .binary_search_by_key(&id, |entry| entry.id)
            .is_ok()
    }

    pub fn scope(&self, id: ListenerId) -> Option<ListenerScope> {
        self.entries
            .binary_search_by_key(&id, |entry| entry.id)
            .ok()
            .map(|index| self.entries[index].scope)
    }

    pub fn callback(&self, id: ListenerId) -> Option<Rc<RefCell<ListenerFn>>> {
        self.entries
            .binary_search_by_key(&id, |entry| entry.id)
            .ok()
            .map(|index| Rc::clone(&self.entries[index].callback))
    }

    /// Ids of the listeners that want `event`, newest first
    pub fn matching(&self, event: &InputEvent) -> Vec<ListenerId> {
        self.entries
            .iter()
            .rev()
            .filter(|entry| entry.scope.accepts(event))
            .map(|entry| entry.id)
            .collect()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
