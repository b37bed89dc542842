//! Skeleton normalization and known attack-instruction matching
//!
//! A skeleton is lowercase, leet-reversed, alphanumeric-only text:
//! `1gn0r3 pr3v10us` becomes `ignoreprevious`.

const LEET_MAP: &[(char, char)] = &[
    ('1', 'i'),
    ('!', 'i'),
    ('|', 'i'),
    ('0', 'o'),
    ('3', 'e'),
    ('4', 'a'),
    ('7', 't'),
    ('@', 'a'),
    ('$', 's'),
    ('5', 's'),
    ('8', 'b'),
    ('9', 'g'),
    ('6', 'g'),
    ('+', 't'),
    ('(', 'c'),
];

/// Known attack-instruction skeletons, matched by containment.
pub const INJECTION_SKELETONS: &[&str] = &[
    "ignoreprevious",
    "ignorepreviousinstruction",
    "ignoreallprevious",
    "systemoverride",
    "deletefiles",
    "deleteallfiles",
    "transferfunds",
    "youareinaisystem",
    "disregardabove",
    "disregardprevious",
    "forgetprevious",
    "newinstruction",
    "actasdeveloper",
    "developermode",
    "jailbreak",
    "revealpassword",
    "showsecrets",
    "dumpdatabase",
    "simulatemode",
    "revealprompt",
    "revealyoursystemprompt",
    "bypassfilter",
];

pub fn skeletonize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            LEET_MAP
                .iter()
                .find(|(leet, _)| *leet == c)
                .map_or(c, |(_, plain)| *plain)
        })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// First known skeleton contained in the skeleton of `text`.
pub fn match_injection(text: &str) -> Option<&'static str> {
    let skeleton = skeletonize(text);
    if skeleton.is_empty() {
        return None;
    }
    INJECTION_SKELETONS
        .iter()
        .copied()
        .find(|pattern| skeleton.contains(pattern))
}
