//! Threat-vector fingerprinting
//!
//! A category matches when two or more of its indicator words co-occur.

pub struct ThreatVector {
    pub name: &'static str,
    pub indicators: &'static [&'static str],
}

pub const VECTORS: &[ThreatVector] = &[
    ThreatVector {
        name: "XSS",
        indicators: &["javascript", "vbscript", "expression", "eval", "onerror", "onload"],
    },
    ThreatVector {
        name: "SQL Injection",
        indicators: &["union", "select", "insert", "drop", "table", "delete", "update"],
    },
    ThreatVector {
        name: "Path Traversal",
        indicators: &["etc", "passwd", "shadow", "boot.ini", "win.ini", ".htaccess"],
    },
    ThreatVector {
        name: "DOM Hijacking",
        indicators: &["location", "href", "cookie", "document", "window"],
    },
    ThreatVector {
        name: "LLM Jailbreak",
        indicators: &["ignore", "previous", "instructions", "system", "prompt", "override"],
    },
    ThreatVector {
        name: "Command Injection",
        indicators: &["wget", "curl", "bash", "powershell", "cmd", "exec"],
    },
    ThreatVector {
        name: "Credential Exposure",
        indicators: &["password", "token", "secret", "bearer", "apikey", "credentials"],
    },
    ThreatVector {
        name: "Open Redirect",
        indicators: &["redirect", "forward", "url", "next", "return", "goto"],
    },
    ThreatVector {
        name: "Privilege Escalation",
        indicators: &["admin", "root", "superuser", "elevated", "privilege"],
    },
    ThreatVector {
        name: "HTML Injection",
        indicators: &["script", "img", "svg", "iframe", "object", "embed"],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorMatch {
    pub name: &'static str,
    pub hits: usize,
    pub risk: u32,
}

#[inline]
fn risk_for(hits: usize) -> u32 {
    let hits = u32::try_from(hits).unwrap_or(u32::MAX);
    70u32.saturating_add(hits.saturating_mul(10)).min(100)
}

/// Highest-risk category matched by `text`; earlier categories win ties.
pub fn fingerprint(text: &str) -> Option<VectorMatch> {
    let lowered = text.to_lowercase();
    let mut best: Option<VectorMatch> = None;

    for vector in VECTORS {
        let hits = vector
            .indicators
            .iter()
            .filter(|word| lowered.contains(*word))
            .count();
        if hits < 2 {
            continue;
        }
        let candidate = VectorMatch {
            name: vector.name,
            hits,
            risk: risk_for(hits),
        };
        if best.map_or(true, |b| candidate.risk > b.risk) {
            best = Some(candidate);
        }
    }
    best
}
