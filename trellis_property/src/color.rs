// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Color parsing for color properties.

use peniko::color::{Srgb, parse_color};

use crate::value::Value;

/// Parses a color value into RGBA components in `0.0..=1.0`.
///
/// Accepts `#rrggbb` and `#rrggbbaa` hex strings (each component is exactly
/// `byte / 255`), CSS color names, and lists of three or four numbers (alpha
/// defaults to 1).
pub(crate) fn parse(value: &Value) -> Result<[f64; 4], String> {
    match value {
        Value::Str(text) => parse_str(text.trim()),
        Value::List(list) => parse_components(&list.to_vec()),
        other => Err(format!(
            "ColorProperty accepts a color name, a hex string or a list of 3 or 4 numbers, got {}",
            other.type_name()
        )),
    }
}

fn parse_str(text: &str) -> Result<[f64; 4], String> {
    if let Some(hex) = text.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(|| format!("invalid hex color {text:?}"));
    }
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!("unknown color {text:?}"));
    }
    let color = parse_color(text)
        .map_err(|_| format!("unknown color {text:?}"))?
        .to_alpha_color::<Srgb>();
    Ok(color.components.map(f64::from))
}

fn parse_hex(hex: &str) -> Option<[f64; 4]> {
    if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
        return None;
    }
    let mut rgba = [1.0; 4];
    for (i, slot) in rgba.iter_mut().enumerate().take(hex.len() / 2) {
        let byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        *slot = f64::from(byte) / 255.0;
    }
    Some(rgba)
}

fn parse_components(items: &[Value]) -> Result<[f64; 4], String> {
    if !matches!(items.len(), 3 | 4) {
        return Err(format!(
            "ColorProperty expects 3 or 4 components, got {}",
            items.len()
        ));
    }
    let mut rgba = [1.0; 4];
    for (slot, item) in rgba.iter_mut().zip(items) {
        *slot = item
            .as_f64()
            .ok_or_else(|| format!("color components must be numbers, got {}", item.type_name()))?;
    }
    Ok(rgba)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_colors() {
        assert_eq!(parse(&"yellow".into()), Ok([1.0, 1.0, 0.0, 1.0]));
        assert_eq!(parse(&"white".into()), Ok([1.0; 4]));
        assert!(parse(&"notacolor".into()).is_err());
        assert!(parse(&"rgb(1, 2, 3)".into()).is_err());
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse(&"#00ff00".into()), Ok([0.0, 1.0, 0.0, 1.0]));
        let [r, g, b, a] = parse(&"#7f7fff7f".into()).unwrap();
        assert_eq!(r, 127.0 / 255.0);
        assert_eq!(g, 127.0 / 255.0);
        assert_eq!(b, 1.0);
        assert_eq!(a, 127.0 / 255.0);
        assert!(parse(&"#fff".into()).is_err());
        assert!(parse(&"#gg0000".into()).is_err());
    }

    #[test]
    fn component_lists() {
        assert_eq!(parse(&Value::list([1, 1, 0])), Ok([1.0, 1.0, 0.0, 1.0]));
        assert_eq!(
            parse(&Value::list([0.5, 0.25, 0.0, 0.5])),
            Ok([0.5, 0.25, 0.0, 0.5])
        );
        assert!(parse(&Value::list([1, 1])).is_err());
        assert!(parse(&Value::list(["a", "b", "c"])).is_err());
        assert!(parse(&Value::from(3)).is_err());
    }
}
