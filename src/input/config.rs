// Device configurations and the registry that holds them

use super::button::{Button, Target};
use super::driver::DeviceIdentity;
use super::InputError;
use crate::util::sorted;
use crate::util::{Arena, Handle};

/// Stable reference to a config in the registry
pub type ConfigHandle = Handle<Config>;

/// Maps one raw control to one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub raw_id: i32,
    pub target: Target,
}

impl Rule {
    pub fn new(raw_id: i32, target: Target) -> Self {
        Self { raw_id, target }
    }
}

/// Mapping rules for one kind of device
///
/// Identity fields left at zero (or an empty name) match anything, so a
/// config with no identity at all is a catch-all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    vendor: u16,
    product: u16,
    name: String,

    /// Sorted by raw id, one rule per raw id
    rules: Vec<Rule>,
}

impl Config {
    pub fn new(vendor: u16, product: u16, name: &str) -> Self {
        Self {
            vendor,
            product,
            name: name.trim().to_string(),
            rules: Vec::new(),
        }
    }

    /// Config keyed on everything a device reported about itself
    ///
    /// The name is escaped so it only ever matches that exact device name.
    pub fn for_identity(identity: &DeviceIdentity) -> Self {
        Self::new(identity.vendor, identity.product, &escape_pattern(&identity.name))
    }

    pub fn vendor(&self) -> u16 {
        self.vendor
    }

    pub fn product(&self) -> u16 {
        self.product
    }

    /// Name pattern; see [`pattern_match`]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.trim().to_string();
    }

    /// True when this config matches every device
    pub fn is_wildcard(&self) -> bool {
        self.vendor == 0 && self.product == 0 && self.name.is_empty()
    }

    pub fn matches(&self, identity: &DeviceIdentity) -> bool {
        if self.vendor != 0 && self.vendor != identity.vendor {
            return false;
        }
        if self.product != 0 && self.product != identity.product {
            return false;
        }
        if !self.name.is_empty() && !pattern_match(&self.name, &identity.name) {
            return false;
        }
        true
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, raw_id: i32) -> Option<&Rule> {
        sorted::search(&self.rules, &raw_id, |r| r.raw_id)
            .ok()
            .map(|index| &self.rules[index])
    }

    /// Add a new rule; a second rule for the same raw id is an error
    pub fn add_rule(&mut self, raw_id: i32, target: Target) -> Result<(), InputError> {
        sorted::insert_unique(&mut self.rules, Rule::new(raw_id, target), |r| r.raw_id)
            .map(|_| ())
            .ok_or(InputError::DuplicateRule(raw_id))
    }

    /// Insert or overwrite a rule. Returns true if anything changed.
    pub fn set_rule(&mut self, raw_id: i32, target: Target) -> bool {
        match sorted::search(&self.rules, &raw_id, |r| r.raw_id) {
            Ok(index) => {
                if self.rules[index].target == target {
                    return false;
                }
                self.rules[index].target = target;
                true
            }
            Err(index) => {
                self.rules.insert(index, Rule::new(raw_id, target));
                true
            }
        }
    }

    pub fn remove_rule(&mut self, raw_id: i32) -> Option<Rule> {
        sorted::search(&self.rules, &raw_id, |r| r.raw_id)
            .ok()
            .map(|index| self.rules.remove(index))
    }

    /// Usable configs route something to all four directions and to SOUTH
    pub fn is_valid(&self) -> bool {
        let mut mask = 0u16;
        for rule in &self.rules {
            mask |= match rule.target {
                Target::Button(button) => button.mask(),
                // Horz/Vert/Dpad codes are the masks of the buttons they drive.
                Target::Horz | Target::Vert | Target::Dpad => rule.target.code() as u16,
                Target::None | Target::Signal(_) => 0,
            };
        }
        let required = Button::Left.mask()
            | Button::Right.mask()
            | Button::Up.mask()
            | Button::Down.mask()
            | Button::South.mask();
        mask & required == required
    }
}

/// Pattern matching `name` literally
pub fn escape_pattern(name: &str) -> String {
    let mut pattern = String::with_capacity(name.len());
    for c in name.chars() {
        if c == '*' || c == '\\' {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern
}

/// Match a device name against a config name pattern
///
/// Both sides are trimmed. `*` matches any run of characters, a run of
/// whitespace matches a run of whitespace, `\x` matches `x` exactly, and
/// everything else compares ASCII case-insensitively.
pub fn pattern_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.trim().chars().collect();
    let name: Vec<char> = name.trim().chars().collect();
    match_from(&pattern, &name)
}

fn match_from(pat: &[char], src: &[char]) -> bool {
    let (mut p, mut s) = (0, 0);
    loop {
        if p >= pat.len() {
            return s >= src.len();
        }

        if pat[p] == '*' {
            while p < pat.len() && pat[p] == '*' {
                p += 1;
            }
            if p >= pat.len() {
                return true;
            }
            return (s..src.len()).any(|start| match_from(&pat[p..], &src[start..]));
        }

        if s >= src.len() {
            return false;
        }

        if pat[p].is_whitespace() {
            if !src[s].is_whitespace() {
                return false;
            }
            while p < pat.len() && pat[p].is_whitespace() {
                p += 1;
            }
            while s < src.len() && src[s].is_whitespace() {
                s += 1;
            }
            continue;
        }

        if pat[p] == '\\' {
            p += 1;
            // Trailing backslash is a malformed pattern.
            if p >= pat.len() || pat[p] != src[s] {
                return false;
            }
            p += 1;
            s += 1;
            continue;
        }

        if !pat[p].eq_ignore_ascii_case(&src[s]) {
            return false;
        }
        p += 1;
        s += 1;
    }
}

/// All known configs, in lookup order
///
/// Lookup is first-match, so catch-all configs belong at the end.
#[derive(Debug, Default)]
pub struct ConfigRegistry {
    configs: Arena<Config>,
    order: Vec<ConfigHandle>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a config at the end of the lookup order
    pub fn add(&mut self, config: Config) -> ConfigHandle {
        let handle = self.configs.insert(config);
        self.order.push(handle);
        handle
    }

    /// Remove a config. Devices still holding its handle see `None` from then on.
    pub fn remove(&mut self, handle: ConfigHandle) -> Option<Config> {
        let config = self.configs.remove(handle)?;
        self.order.retain(|h| *h != handle);
        Some(config)
    }

    pub fn get(&self, handle: ConfigHandle) -> Option<&Config> {
        self.configs.get(handle)
    }

    pub fn get_mut(&mut self, handle: ConfigHandle) -> Option<&mut Config> {
        self.configs.get_mut(handle)
    }

    pub fn contains(&self, handle: ConfigHandle) -> bool {
        self.configs.contains(handle)
    }

    /// First config, in registry order, that matches the device
    pub fn find_by_identity(&self, identity: &DeviceIdentity) -> Option<ConfigHandle> {
        self.iter()
            .find(|(_, config)| config.matches(identity))
            .map(|(handle, _)| handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConfigHandle, &Config)> + '_ {
        self.order
            .iter()
            .filter_map(move |handle| self.configs.get(*handle).map(|c| (*handle, c)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.configs = Arena::new();
        self.order.clear();
    }
}
