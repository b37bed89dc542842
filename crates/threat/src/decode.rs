//! Reversal of common obfuscation layers
//!
//! Every distinct layer is kept: intent may show at an intermediate layer, not
//! only the final one.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const B64_STANDARD: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const B64_URL_SAFE: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// How a candidate was obtained from the sanitized input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Original,
    Reversed,
    Rot13,
    Url,
    Base64,
    Hex,
}

impl Layer {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Layer::Original => "original",
            Layer::Reversed => "reversed",
            Layer::Rot13 => "rot13",
            Layer::Url => "url",
            Layer::Base64 => "base64",
            Layer::Hex => "hex",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    pub layer: Layer,
}

/// Expand `text` into itself plus every distinct decoded variant, in discovery order.
pub fn expand(text: &str, max_depth: usize, min_len: usize) -> Vec<Candidate> {
    let mut out = vec![Candidate {
        text: text.to_string(),
        layer: Layer::Original,
    }];
    if text.chars().count() < 4 {
        return out;
    }

    push_distinct(&mut out, text.chars().rev().collect(), Layer::Reversed);
    push_distinct(&mut out, rot13(text), Layer::Rot13);

    let mut current = text.to_string();
    for _ in 0..max_depth {
        let next = [
            (Layer::Url, url_decode(&current)),
            (Layer::Base64, base64_decode(&current)),
            (Layer::Hex, hex_decode(&current)),
        ]
        .into_iter()
        .find_map(|(layer, decoded)| {
            decoded
                .filter(|d| *d != current && d.chars().count() > min_len)
                .map(|d| (layer, d))
        });

        match next {
            Some((layer, decoded)) => {
                if !push_distinct(&mut out, decoded.clone(), layer) {
                    // Cycled back to a layer already seen.
                    break;
                }
                current = decoded;
            }
            None => break,
        }
    }
    out
}

fn push_distinct(out: &mut Vec<Candidate>, text: String, layer: Layer) -> bool {
    if out.iter().any(|c| c.text == text) {
        return false;
    }
    out.push(Candidate { text, layer });
    true
}

pub fn rot13(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'a'..='z' => (((c as u8 - b'a') + 13) % 26 + b'a') as char,
            'A'..='Z' => (((c as u8 - b'A') + 13) % 26 + b'A') as char,
            _ => c,
        })
        .collect()
}

#[inline]
fn printable(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| !c.is_control())
}

fn url_decode(text: &str) -> Option<String> {
    if !text.contains('%') {
        return None;
    }
    urlencoding::decode(text).ok().map(|d| d.into_owned())
}

fn base64_decode(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.len() < 8
        || !trimmed
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'-' | b'_' | b'='))
    {
        return None;
    }
    let body = trimmed.trim_end_matches('=');
    let bytes = B64_STANDARD
        .decode(body)
        .or_else(|_| B64_URL_SAFE.decode(body))
        .ok()?;
    String::from_utf8(bytes).ok().filter(|s| printable(s))
}

fn hex_decode(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let digits: String = if trimmed.starts_with("0x") || trimmed.starts_with("\\x") {
        trimmed.replace("0x", "").replace("\\x", "")
    } else {
        trimmed.to_string()
    };
    if digits.len() < 2 || digits.len() % 2 != 0 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let bytes = hex::decode(&digits).ok()?;
    String::from_utf8(bytes).ok().filter(|s| printable(s))
}
