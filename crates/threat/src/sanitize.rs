//! Invisible-character stripping and homoglyph folding

/// Cyrillic, Greek and Latin-extended lookalikes folded to ASCII.
const HOMOGLYPHS: &[(char, char)] = &[
    // Cyrillic lowercase
    ('а', 'a'), ('е', 'e'), ('о', 'o'), ('р', 'p'), ('с', 'c'), ('х', 'x'),
    ('у', 'y'), ('ѕ', 's'), ('і', 'i'), ('ј', 'j'), ('ԁ', 'd'), ('һ', 'h'),
    // Cyrillic uppercase
    ('А', 'A'), ('В', 'B'), ('Е', 'E'), ('К', 'K'), ('М', 'M'), ('Н', 'H'),
    ('О', 'O'), ('Р', 'P'), ('С', 'C'), ('Т', 'T'), ('Х', 'X'),
    // Greek
    ('α', 'a'), ('ο', 'o'), ('ρ', 'p'), ('ι', 'i'), ('κ', 'k'), ('ν', 'v'), ('τ', 't'),
    // Latin extended
    ('ɡ', 'g'), ('ḷ', 'l'), ('ṃ', 'm'), ('ṇ', 'n'), ('ṭ', 't'), ('ṿ', 'v'), ('ẉ', 'w'),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub text: String,
    pub invisible_removed: usize,
    pub homoglyphs_folded: usize,
}

/// Zero-width, bidi-control, soft-hyphen and C0/C1 control characters.
/// Line breaks and tabs are whitespace, not invisible.
#[inline]
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{2069}'
            | '\u{FEFF}'
            | '\u{00AD}'
            | '\u{034F}'
    ) || (c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
}

#[inline]
fn fold(c: char) -> Option<char> {
    // Fullwidth ASCII block maps 1:1 onto printable ASCII.
    if ('\u{FF01}'..='\u{FF5E}').contains(&c) {
        return char::from_u32(c as u32 - 0xFF01 + 0x21);
    }
    HOMOGLYPHS
        .iter()
        .find(|(glyph, _)| *glyph == c)
        .map(|(_, latin)| *latin)
}

pub fn sanitize(input: &str) -> Sanitized {
    let mut text = String::with_capacity(input.len());
    let mut invisible_removed = 0;
    let mut homoglyphs_folded = 0;

    for c in input.chars() {
        if is_invisible(c) {
            invisible_removed += 1;
            continue;
        }
        if matches!(c, '\n' | '\r' | '\t') {
            text.push(' ');
            continue;
        }
        match fold(c) {
            Some(latin) => {
                homoglyphs_folded += 1;
                text.push(latin);
            }
            None => text.push(c),
        }
    }

    Sanitized {
        text,
        invisible_removed,
        homoglyphs_folded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_zero_width() {
        let s = sanitize("p\u{200b}ass\u{200b}word");
        assert_eq!(s.text, "password");
        assert_eq!(s.invisible_removed, 2);
        assert_eq!(s.homoglyphs_folded, 0);
    }

    #[test]
    fn folds_cyrillic_lookalikes() {
        // "раураl" with Cyrillic р, а, у, а
        let s = sanitize("\u{0440}\u{0430}\u{0443}\u{0440}\u{0430}l");
        assert_eq!(s.text, "paypal");
        assert_eq!(s.homoglyphs_folded, 5);
    }

    #[test]
    fn folds_fullwidth() {
        let s = sanitize("ｅｖａｌ");
        assert_eq!(s.text, "eval");
    }

    #[test]
    fn whitespace_survives_as_space() {
        let s = sanitize("a\nb\tc");
        assert_eq!(s.text, "a b c");
        assert_eq!(s.invisible_removed, 0);
    }

    #[test]
    fn plain_text_untouched() {
        let s = sanitize("hello world");
        assert_eq!(s.text, "hello world");
        assert_eq!(s.invisible_removed + s.homoglyphs_folded, 0);
    }
}
