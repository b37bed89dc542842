//! Lenient reading of DOM element style hints
//!
//! Styles may arrive under `styles`, `style`, or flat on the element, with
//! numbers encoded either as JSON numbers or strings (`"0.05"`, `"0px"`).
//! Anything unreadable is treated as absent.

use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ElementStyle {
    pub opacity: Option<f64>,
    pub z_index: Option<f64>,
    pub font_size: Option<f64>,
    pub hidden: bool,
}

impl ElementStyle {
    pub fn parse(element: &Value) -> Self {
        let Some(obj) = element.as_object() else {
            return Self::default();
        };
        let styles = obj
            .get("styles")
            .or_else(|| obj.get("style"))
            .and_then(Value::as_object)
            .unwrap_or(obj);

        let lookup = |keys: &[&str]| keys.iter().find_map(|k| styles.get(*k).and_then(number));

        let display_none = styles
            .get("display")
            .and_then(Value::as_str)
            .is_some_and(|d| d.trim().eq_ignore_ascii_case("none"));
        let visibility_hidden = styles
            .get("visibility")
            .and_then(Value::as_str)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("hidden"));
        let flagged = obj.get("hidden").and_then(Value::as_bool).unwrap_or(false);

        Self {
            opacity: lookup(&["opacity"]),
            z_index: lookup(&["zIndex", "z-index", "z_index"]),
            font_size: lookup(&["fontSize", "font-size", "font_size"]),
            hidden: flagged || display_none || visibility_hidden,
        }
    }
}

/// JSON number, or a string with a leading numeric part (`"12px"` gives 12).
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            let end = s
                .char_indices()
                .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && matches!(c, '-' | '+'))))
                .map_or(s.len(), |(i, _)| i);
            s[..end].parse().ok()
        }
        _ => None,
    }
}
