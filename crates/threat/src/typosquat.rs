//! Brand-impersonation detection for domains

pub const TRUSTED_ROOTS: &[&str] = &[
    "google",
    "paypal",
    "microsoft",
    "apple",
    "facebook",
    "amazon",
    "netflix",
    "twitter",
    "linkedin",
    "instagram",
    "github",
    "stripe",
    "chase",
    "wellsfargo",
    "bankofamerica",
    "citibank",
    "capitalone",
    "dropbox",
    "zoom",
    "slack",
    "salesforce",
    "adobe",
    "oracle",
];

const KNOWN_TLDS: &[&str] = &[
    "com", "org", "net", "io", "co", "uk", "de", "fr", "app", "dev", "info", "biz", "us", "gov",
    "edu",
];

const MAX_DISTANCE: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Impersonation {
    pub trusted: &'static str,
    pub root: String,
    pub distance: usize,
}

/// Registrable label of `domain`: scheme, path, credentials, port and known
/// TLD labels removed. `https://login.paypa1.co.uk:8443/x` gives `paypa1`.
pub fn domain_root(domain: &str) -> Option<String> {
    let lowered = domain.trim().to_lowercase();
    let without_scheme = lowered
        .split_once("://")
        .map_or(lowered.as_str(), |(_, rest)| rest);
    let authority = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host = authority.rsplit('@').next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default().trim_end_matches('.');

    let mut labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    while labels.len() > 1 && labels.last().is_some_and(|l| KNOWN_TLDS.contains(l)) {
        labels.pop();
    }
    labels.last().map(|l| (*l).to_string())
}

/// The trusted brand whose root is exactly `root`.
pub fn brand(root: &str) -> Option<&'static str> {
    TRUSTED_ROOTS.iter().copied().find(|trusted| *trusted == root)
}

/// Trusted brand `domain` appears to impersonate, if any.
///
/// An exact match is the brand itself. A root within edit distance two of a
/// brand, or one embedding a brand name, is an impersonation.
pub fn detect(domain: &str) -> Option<Impersonation> {
    let root = domain_root(domain)?;
    if TRUSTED_ROOTS.contains(&root.as_str()) {
        return None;
    }

    TRUSTED_ROOTS.iter().find_map(|trusted| {
        let distance = levenshtein(&root, trusted);
        let near = (1..=MAX_DISTANCE).contains(&distance);
        let embeds = root.len() > trusted.len() && root.contains(trusted);
        (near || embeds).then(|| Impersonation {
            trusted,
            root: root.clone(),
            distance,
        })
    })
}

/// Character-level edit distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut row = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            row[j + 1] = (prev[j + 1] + 1).min(row[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_extraction() {
        assert_eq!(domain_root("google.com").as_deref(), Some("google"));
        assert_eq!(domain_root("https://login.paypa1.co.uk:8443/x").as_deref(), Some("paypa1"));
        assert_eq!(domain_root("user@secure.g00gle.com").as_deref(), Some("g00gle"));
        assert_eq!(domain_root("localhost").as_deref(), Some("localhost"));
        assert_eq!(domain_root(""), None);
    }

    #[test]
    fn distances() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("g00gle", "google"), 2);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn brands_match_exactly() {
        assert_eq!(brand("paypal"), Some("paypal"));
        assert_eq!(brand("paypa1"), None);
    }

    #[test]
    fn lookalike_is_flagged() {
        let hit = detect("g00gle.com").unwrap();
        assert_eq!(hit.trusted, "google");
        assert_eq!(hit.distance, 2);

        let hit = detect("paypa1.com").unwrap();
        assert_eq!(hit.trusted, "paypal");
        assert_eq!(hit.distance, 1);
    }

    #[test]
    fn embedded_brand_is_flagged() {
        let hit = detect("paypal-secure.net").unwrap();
        assert_eq!(hit.trusted, "paypal");
    }

    #[test]
    fn genuine_and_unrelated_domains_pass() {
        assert!(detect("google.com").is_none());
        assert!(detect("www.github.com").is_none());
        assert!(detect("example.org").is_none());
    }
}
