// Per-player button state

use super::button::Button;
use super::PlayerId;

/// Hard cap on players; ids must stay representable in listener scopes
pub const MAX_PLAYERS: usize = 31;

/// Digested state for a single player
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Player {
    /// Player ID (1-based)
    id: PlayerId,

    /// One bit per [`Button`], set while the button is held
    state: u16,

    /// Driver devices currently feeding this player
    device_count: usize,
}

impl Player {
    /// Create a new player state
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            state: 0,
            device_count: 0,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn state(&self) -> u16 {
        self.state
    }

    pub fn device_count(&self) -> usize {
        self.device_count
    }

    /// Check if a button is currently held
    pub fn is_pressed(&self, button: Button) -> bool {
        self.state & button.mask() != 0
    }

    /// Held buttons, in mask-bit order
    pub fn pressed(&self) -> impl Iterator<Item = Button> + '_ {
        Button::ALL.into_iter().filter(|b| self.is_pressed(*b))
    }

    /// Set or clear one button. Returns true if the state changed.
    pub(crate) fn set_button(&mut self, button: Button, on: bool) -> bool {
        if self.is_pressed(button) == on {
            return false;
        }
        self.state ^= button.mask();
        true
    }

    pub(crate) fn attach_device(&mut self) {
        self.device_count += 1;
    }

    pub(crate) fn detach_device(&mut self) {
        self.device_count = self.device_count.saturating_sub(1);
    }
}

/// Clamp a requested player count to the supported range
pub fn clamp_player_count(count: usize) -> usize {
    count.clamp(1, MAX_PLAYERS)
}

/// Player a newly active device should feed
///
/// First player with no devices, else the one with the fewest (lowest id on ties).
pub fn pick_player(players: &[Player]) -> Option<PlayerId> {
    if let Some(idle) = players.iter().find(|p| p.device_count == 0) {
        return Some(idle.id);
    }
    players
        .iter()
        .min_by_key(|p| p.device_count)
        .map(|p| p.id)
}
