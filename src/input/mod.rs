// Input management system
//
// Turns raw controls reported by any number of devices into a 16-bit button
// state per player, plus stateless signals such as QUIT or PAUSE.
//
// ## Architecture
//
// - `button`: Logical buttons, signals and rule targets
// - `driver`: What the manager needs from a platform driver
// - `config`: Per-device mapping rules and the config registry
// - `guess`: Builds a config for devices nobody has configured
// - `device`: Compiled button tables and the raw value state machine
// - `player`: Per-player button state
// - `listener`: Scoped event listeners and the host delegate
// - `persist`: Text encoding of the config registry
// - `manager`: Main input manager coordinating everything
//
// ## Usage Example
//
// ```rust
// use inmgr::input::InputManager;
//
// let mut manager = InputManager::new(None, 2);
// manager.load_config(text.as_bytes())?;
//
// // System keyboard, no driver behind it
// manager.connect(0, None)?;
//
// // From the platform event loop
// manager.on_raw_event(0, 0x0007_0052, 1)?;
//
// if manager.player_state(1) & Button::Up.mask() != 0 {
//     // Player 1 is holding UP
// }
// ```

pub mod button;
pub mod config;
pub mod device;
pub mod driver;
pub mod guess;
pub mod listener;
pub mod manager;
pub mod persist;
pub mod player;

pub use button::{Button, Signal, Target, TargetClass};
pub use config::{Config, ConfigHandle, ConfigRegistry, Rule};
pub use driver::{Capability, DeviceIdentity, InputDriver, StaticDriver};
pub use listener::{InputDelegate, InputEvent, ListenerId, ListenerScope, OutputEvent, Source};
pub use manager::InputManager;
pub use player::Player;

/// Driver-assigned device id
pub type DeviceId = i64;

/// 1-based player id; 0 means "any" or "all players" depending on context
pub type PlayerId = usize;

/// Input manager errors
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Unknown device: {0}")]
    UnknownDevice(DeviceId),

    #[error("No such player: {0}")]
    InvalidPlayer(PlayerId),

    #[error("Duplicate rule for raw button 0x{0:08x}")]
    DuplicateRule(i32),

    #[error("Unknown listener: {0}")]
    UnknownListener(ListenerId),

    #[error("Listener ids exhausted")]
    ListenerIdsExhausted,

    #[error("Device {0} has no config")]
    NoConfig(DeviceId),

    #[error("Device list changed during broadcast")]
    DeviceListChanged,

    #[error("Listener list changed during replay")]
    ListenerListChanged,

    #[error("Config line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Listener failed: {0}")]
    Listener(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_error_display() {
        let err = InputError::DuplicateRule(0x10);
        assert_eq!(err.to_string(), "Duplicate rule for raw button 0x00000010");

        let err = InputError::Parse {
            line: 3,
            message: "Rule before header".to_string(),
        };
        assert_eq!(err.to_string(), "Config line 3: Rule before header");
    }
}
