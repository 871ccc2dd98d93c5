// Logical button definitions and their text names

use std::fmt;

/// One of the 16 two-state outputs that make up a player's state mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Button {
    Left,
    Right,
    Up,
    Down,
    South,
    West,
    East,
    North,
    L1,
    R1,
    L2,
    R2,
    Aux1,
    Aux2,
    Aux3,
    Cd,
}

impl Button {
    /// All buttons in mask-bit order
    pub const ALL: [Button; 16] = [
        Button::Left,
        Button::Right,
        Button::Up,
        Button::Down,
        Button::South,
        Button::West,
        Button::East,
        Button::North,
        Button::L1,
        Button::R1,
        Button::L2,
        Button::R2,
        Button::Aux1,
        Button::Aux2,
        Button::Aux3,
        Button::Cd,
    ];

    /// The single bit this button occupies in a player state
    pub fn mask(self) -> u16 {
        1 << (self as u16)
    }

    /// Inverse of [`Button::mask`]; `None` unless exactly one bit is set
    pub fn from_mask(mask: u16) -> Option<Self> {
        if mask.count_ones() != 1 {
            return None;
        }
        Self::ALL.get(mask.trailing_zeros() as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Button::Left => "LEFT",
            Button::Right => "RIGHT",
            Button::Up => "UP",
            Button::Down => "DOWN",
            Button::South => "SOUTH",
            Button::West => "WEST",
            Button::East => "EAST",
            Button::North => "NORTH",
            Button::L1 => "L1",
            Button::R1 => "R1",
            Button::L2 => "L2",
            Button::R2 => "R2",
            Button::Aux1 => "AUX1",
            Button::Aux2 => "AUX2",
            Button::Aux3 => "AUX3",
            Button::Cd => "CD",
        }
    }
}

/// Stateless outputs. They fire on the transition to "on" and never touch the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Signal {
    Quit,
    Fullscreen,
    Mute,
    Pause,
    Screencap,
    Savestate,
    Loadstate,
    Menu,
    Reset,
    Debug,
    Step,
    Fastfwd,
}

/// Signals live above the 16-bit button range so the two families never collide
pub const SIGNAL_BASE: u32 = 0x10000;

impl Signal {
    pub const ALL: [Signal; 12] = [
        Signal::Quit,
        Signal::Fullscreen,
        Signal::Mute,
        Signal::Pause,
        Signal::Screencap,
        Signal::Savestate,
        Signal::Loadstate,
        Signal::Menu,
        Signal::Reset,
        Signal::Debug,
        Signal::Step,
        Signal::Fastfwd,
    ];

    pub fn code(self) -> u32 {
        SIGNAL_BASE + 1 + self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        let offset = code.checked_sub(SIGNAL_BASE + 1)?;
        Self::ALL.get(offset as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Signal::Quit => "QUIT",
            Signal::Fullscreen => "FULLSCREEN",
            Signal::Mute => "MUTE",
            Signal::Pause => "PAUSE",
            Signal::Screencap => "SCREENCAP",
            Signal::Savestate => "SAVESTATE",
            Signal::Loadstate => "LOADSTATE",
            Signal::Menu => "MENU",
            Signal::Reset => "RESET",
            Signal::Debug => "DEBUG",
            Signal::Step => "STEP",
            Signal::Fastfwd => "FASTFWD",
        }
    }
}

/// Where a raw control can be routed
///
/// `Horz`, `Vert` and `Dpad` are compounds: one raw control drives two or four
/// buttons. `None` is an explicit "ignore this control" rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    None,
    Button(Button),
    Signal(Signal),
    Horz,
    Vert,
    Dpad,
}

/// How a compiled button interprets its raw range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetClass {
    None,
    TwoState,
    Signal,
    Axis,
    Dpad,
}

impl Target {
    /// Numeric code, as used by the hex fallback in config files
    pub fn code(self) -> u32 {
        match self {
            Target::None => 0,
            Target::Button(button) => u32::from(button.mask()),
            Target::Signal(signal) => signal.code(),
            Target::Horz => u32::from(Button::Left.mask() | Button::Right.mask()),
            Target::Vert => u32::from(Button::Up.mask() | Button::Down.mask()),
            Target::Dpad => 0x000f,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Target::None),
            0x0003 => Some(Target::Horz),
            0x000c => Some(Target::Vert),
            0x000f => Some(Target::Dpad),
            c if c >= SIGNAL_BASE => Signal::from_code(c).map(Target::Signal),
            c => u16::try_from(c)
                .ok()
                .and_then(Button::from_mask)
                .map(Target::Button),
        }
    }

    pub fn class(self) -> TargetClass {
        match self {
            Target::None => TargetClass::None,
            Target::Button(_) => TargetClass::TwoState,
            Target::Signal(_) => TargetClass::Signal,
            Target::Horz | Target::Vert => TargetClass::Axis,
            Target::Dpad => TargetClass::Dpad,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Target::None => "NONE",
            Target::Button(button) => button.name(),
            Target::Signal(signal) => signal.name(),
            Target::Horz => "HORZ",
            Target::Vert => "VERT",
            Target::Dpad => "DPAD",
        }
    }

    /// Parse a target the way config files spell it
    ///
    /// Names are case-insensitive. The single-letter names from the older
    /// file format (A B C D L R) are still accepted, as are integers in
    /// decimal or `0x` hex.
    pub fn parse(src: &str) -> Option<Self> {
        let src = src.trim();
        if src.is_empty() {
            return None;
        }

        let named = [Target::None, Target::Horz, Target::Vert, Target::Dpad]
            .into_iter()
            .chain(Button::ALL.into_iter().map(Target::Button))
            .chain(Signal::ALL.into_iter().map(Target::Signal))
            .find(|target| target.name().eq_ignore_ascii_case(src));
        if named.is_some() {
            return named;
        }

        let legacy = match src.to_ascii_uppercase().as_str() {
            "A" => Some(Button::South),
            "B" => Some(Button::West),
            "C" => Some(Button::East),
            "D" => Some(Button::North),
            "L" => Some(Button::L1),
            "R" => Some(Button::R1),
            _ => None,
        };
        if let Some(button) = legacy {
            return Some(Target::Button(button));
        }

        parse_int(src)
            .and_then(|n| u32::try_from(n).ok())
            .and_then(Target::from_code)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Button> for Target {
    fn from(button: Button) -> Self {
        Target::Button(button)
    }
}

impl From<Signal> for Target {
    fn from(signal: Signal) -> Self {
        Target::Signal(signal)
    }
}

/// Integer in decimal or `0x` hex, optionally negative
pub fn parse_int(src: &str) -> Option<i64> {
    let (negative, digits) = match src.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, src),
    };
    let value = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if negative { -value } else { value })
}

/// Split a normalized D-pad value (0..=7, clockwise from north) into x and y
///
/// Anything outside 0..=7 is centered.
pub fn decode_dpad(value: i32) -> (i32, i32) {
    match value {
        0 => (0, -1),
        1 => (1, -1),
        2 => (1, 0),
        3 => (1, 1),
        4 => (0, 1),
        5 => (-1, 1),
        6 => (-1, 0),
        7 => (-1, -1),
        _ => (0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_masks_are_distinct_bits() {
        let mut seen = 0u16;
        for button in Button::ALL {
            assert_eq!(button.mask().count_ones(), 1);
            assert_eq!(seen & button.mask(), 0, "Duplicate mask for {:?}", button);
            seen |= button.mask();
        }
        assert_eq!(seen, 0xffff);
        assert_eq!(Button::Left.mask(), 0x0001);
        assert_eq!(Button::Cd.mask(), 0x8000);
    }

    #[test]
    fn test_button_from_mask() {
        assert_eq!(Button::from_mask(0x0010), Some(Button::South));
        assert_eq!(Button::from_mask(0x0003), None);
        assert_eq!(Button::from_mask(0), None);
    }

    #[test]
    fn test_signal_codes_above_button_range() {
        for signal in Signal::ALL {
            assert!(signal.code() > 0xffff);
            assert_eq!(Signal::from_code(signal.code()), Some(signal));
        }
        assert_eq!(Signal::Quit.code(), 0x10001);
        assert_eq!(Signal::Fastfwd.code(), 0x1000c);
    }

    #[test]
    fn test_target_code_roundtrip() {
        let targets = [Target::None, Target::Horz, Target::Vert, Target::Dpad]
            .into_iter()
            .chain(Button::ALL.into_iter().map(Target::Button))
            .chain(Signal::ALL.into_iter().map(Target::Signal));
        for target in targets {
            assert_eq!(Target::from_code(target.code()), Some(target));
        }
        assert_eq!(Target::from_code(0x0005), None);
        assert_eq!(Target::from_code(0x20000), None);
    }

    #[test]
    fn test_parse_names_case_insensitive() {
        assert_eq!(Target::parse("south"), Some(Target::Button(Button::South)));
        assert_eq!(Target::parse("Dpad"), Some(Target::Dpad));
        assert_eq!(Target::parse("QUIT"), Some(Target::Signal(Signal::Quit)));
        assert_eq!(Target::parse("none"), Some(Target::None));
    }

    #[test]
    fn test_parse_legacy_names() {
        assert_eq!(Target::parse("A"), Some(Target::Button(Button::South)));
        assert_eq!(Target::parse("b"), Some(Target::Button(Button::West)));
        assert_eq!(Target::parse("L"), Some(Target::Button(Button::L1)));
        assert_eq!(Target::parse("R"), Some(Target::Button(Button::R1)));
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(Target::parse("0x8000"), Some(Target::Button(Button::Cd)));
        assert_eq!(Target::parse("0x10008"), Some(Target::Signal(Signal::Menu)));
        assert_eq!(Target::parse("16"), Some(Target::Button(Button::South)));
        assert_eq!(Target::parse("0x7"), None);
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(Target::parse("JUMP"), None);
        assert_eq!(Target::parse(""), None);
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("0x1f"), Some(31));
        assert_eq!(parse_int("-12"), Some(-12));
        assert_eq!(parse_int("0XFF"), Some(255));
        assert_eq!(parse_int("zz"), None);
    }

    #[test]
    fn test_decode_dpad_table() {
        assert_eq!(decode_dpad(0), (0, -1));
        assert_eq!(decode_dpad(2), (1, 0));
        assert_eq!(decode_dpad(5), (-1, 1));
        assert_eq!(decode_dpad(7), (-1, -1));
        assert_eq!(decode_dpad(8), (0, 0));
        assert_eq!(decode_dpad(-1), (0, 0));
    }

    #[test]
    fn test_target_class() {
        assert_eq!(Target::Dpad.class(), TargetClass::Dpad);
        assert_eq!(Target::Horz.class(), TargetClass::Axis);
        assert_eq!(Target::Button(Button::L2).class(), TargetClass::TwoState);
        assert_eq!(Target::Signal(Signal::Pause).class(), TargetClass::Signal);
    }
}
