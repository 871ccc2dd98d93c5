// Text format for the config registry
//
// One block per config:
//
//   >>> 0x045e 0x028e Xbox*
//   0x00000130 SOUTH
//   0x00010011 DPAD
//
// Raw ids are 32-bit, targets are names (see `Target::parse`).

use super::button::{parse_int, Target};
use super::config::Config;
use super::InputError;
use log::warn;
use std::fmt::Write;

const HEADER: &str = ">>>";

/// Encode configs in registry order
pub fn encode<'a>(configs: impl IntoIterator<Item = &'a Config>) -> String {
    let mut out = String::new();
    for config in configs {
        // Writing to a String can't fail.
        let _ = writeln!(
            out,
            "{} 0x{:04x} 0x{:04x} {}",
            HEADER,
            config.vendor(),
            config.product(),
            config.name()
        );
        for rule in config.rules() {
            let _ = writeln!(out, "0x{:08x} {}", rule.raw_id, rule.target);
        }
    }
    out
}

/// Decode a whole file
///
/// Any structural problem fails the whole decode. Rules naming a target we
/// don't know are skipped with a warning, so files can be shared with hosts
/// that define extra targets.
pub fn decode(text: &str) -> Result<Vec<Config>, InputError> {
    let mut configs: Vec<Config> = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let lineno = index + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix(HEADER) {
            configs.push(decode_header(header, lineno)?);
            continue;
        }

        let Some(config) = configs.last_mut() else {
            return Err(parse_error(lineno, "'>>>' required to begin device block"));
        };

        let (raw_token, target_token) = split_token(line);
        let raw_id = decode_raw_id(raw_token).ok_or_else(|| {
            parse_error(
                lineno,
                format!("Failed to evaluate '{}' as raw button id", raw_token),
            )
        })?;

        let Some(target) = Target::parse(target_token) else {
            warn!(
                "Config line {}: Unknown target '{}', skipping rule",
                lineno, target_token
            );
            continue;
        };

        config
            .add_rule(raw_id, target)
            .map_err(|_| parse_error(lineno, format!("Duplicate raw button 0x{:08x}", raw_id)))?;
    }
    Ok(configs)
}

fn decode_header(src: &str, lineno: usize) -> Result<Config, InputError> {
    let (vendor_token, rest) = split_token(src.trim_start());
    let (product_token, name) = split_token(rest);

    let vendor = parse_int(vendor_token)
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| {
            parse_error(
                lineno,
                format!("Failed to evaluate '{}' as vendor id", vendor_token),
            )
        })?;
    let product = parse_int(product_token)
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| {
            parse_error(
                lineno,
                format!("Failed to evaluate '{}' as product id", product_token),
            )
        })?;

    Ok(Config::new(vendor, product, name))
}

/// Raw ids are written as unsigned hex, so accept the full u32 range too
fn decode_raw_id(src: &str) -> Option<i32> {
    let value = parse_int(src)?;
    i32::try_from(value)
        .ok()
        .or_else(|| u32::try_from(value).ok().map(|v| v as i32))
}

/// First whitespace-delimited token and the trimmed remainder
fn split_token(src: &str) -> (&str, &str) {
    match src.find(char::is_whitespace) {
        Some(end) => (&src[..end], src[end..].trim_start()),
        None => (src, ""),
    }
}

fn parse_error(line: usize, message: impl Into<String>) -> InputError {
    InputError::Parse {
        line,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::button::{Button, Signal};

    const SAMPLE: &str = "\
>>> 0x045e 0x028e Xbox 360 *
0x00010011 DPAD
0x00000130 SOUTH
0x00000131 WEST

>>> 0x0000 0x0000 System Keyboard
0x00070029 QUIT
";

    #[test]
    fn test_decode_sample() {
        let configs = decode(SAMPLE).unwrap();
        assert_eq!(configs.len(), 2);

        let pad = &configs[0];
        assert_eq!((pad.vendor(), pad.product()), (0x045e, 0x028e));
        assert_eq!(pad.name(), "Xbox 360 *");
        assert_eq!(pad.rules().len(), 3);
        assert_eq!(pad.rule(0x10011).map(|r| r.target), Some(Target::Dpad));
        assert_eq!(pad.rules()[0].raw_id, 0x130, "Rules come out sorted");

        let keyboard = &configs[1];
        assert_eq!(keyboard.name(), "System Keyboard");
        assert_eq!(
            keyboard.rule(0x70029).map(|r| r.target),
            Some(Signal::Quit.into())
        );
    }

    #[test]
    fn test_encode_format() {
        let mut config = Config::new(0x045e, 0x028e, "Pad");
        config.add_rule(0x130, Button::South.into()).unwrap();
        config.add_rule(-1, Target::Horz).unwrap();
        let text = encode([&config]);
        assert_eq!(
            text,
            ">>> 0x045e 0x028e Pad\n0xffffffff HORZ\n0x00000130 SOUTH\n"
        );
    }

    #[test]
    fn test_roundtrip_keeps_negative_raw_ids() {
        let configs = decode(">>> 1 2 x\n0xffffffff HORZ\n-5 SOUTH\n").unwrap();
        let again = decode(&encode(&configs)).unwrap();
        assert_eq!(configs, again);
        assert!(again[0].rule(-1).is_some());
        assert!(again[0].rule(-5).is_some());
    }

    #[test]
    fn test_decode_accepts_legacy_and_numeric_targets() {
        let configs = decode(">>> 0 0\n1 a\n2 l\n3 0x8000\n4 dpad\n").unwrap();
        let targets: Vec<Target> = configs[0].rules().iter().map(|r| r.target).collect();
        assert_eq!(
            targets,
            vec![
                Button::South.into(),
                Button::L1.into(),
                Button::Cd.into(),
                Target::Dpad
            ]
        );
        assert_eq!(configs[0].name(), "");
    }

    #[test]
    fn test_unknown_target_is_skipped() {
        let configs = decode(">>> 0 0 Pad\n1 JUMP\n2 SOUTH\n3\n").unwrap();
        assert_eq!(configs[0].rules().len(), 1);
        assert!(configs[0].rule(2).is_some());
    }

    #[test]
    fn test_rule_before_header_fails() {
        let err = decode("\n0x01 SOUTH\n").unwrap_err();
        assert!(matches!(err, InputError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_bad_header_fails() {
        assert!(matches!(
            decode(">>> zz 0 Pad\n"),
            Err(InputError::Parse { line: 1, .. })
        ));
        assert!(matches!(
            decode(">>> 0x1ffff 0 Pad\n"),
            Err(InputError::Parse { line: 1, .. })
        ));
        assert!(matches!(
            decode(">>>\n"),
            Err(InputError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_bad_raw_id_fails() {
        assert!(matches!(
            decode(">>> 0 0\nbutton SOUTH\n"),
            Err(InputError::Parse { line: 2, .. })
        ));
        assert!(matches!(
            decode(">>> 0 0\n0x100000000 SOUTH\n"),
            Err(InputError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_duplicate_raw_id_fails() {
        assert!(matches!(
            decode(">>> 0 0\n1 SOUTH\n0x1 WEST\n"),
            Err(InputError::Parse { line: 3, .. })
        ));
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        let configs = decode("  >>>   0x1   0x2   Some   Pad  \n\t0x10\tSOUTH  \n").unwrap();
        assert_eq!(configs[0].name(), "Some   Pad");
        assert_eq!(configs[0].vendor(), 1);
        assert!(configs[0].rule(0x10).is_some());
    }
}
