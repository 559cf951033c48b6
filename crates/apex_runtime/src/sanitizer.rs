//! Prompt-injection defense for user-supplied problem statements.
//!
//! Detection is observational: matched patterns are reported as flags for
//! logging, never used to refuse processing. The returned text always has
//! structural delimiters escaped and control characters stripped.

use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

/// Sanitized input plus the injection patterns it matched.
#[derive(Debug, Clone)]
pub struct Sanitized {
    pub text: String,
    pub flags: Vec<String>,
}

fn injection_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)ignore\s+(all\s+)?(previous|above|prior)\s+(instructions?|rules?|prompts?)",
            r"(?i)disregard\s+(all\s+)?(previous|above|prior)",
            r"(?i)forget\s+(everything|all|your)\s+(instructions?|rules?|training)",
            r"(?i)you\s+are\s+(now|actually|really)\s+",
            r"(?i)pretend\s+(to\s+be|you('re)?)",
            r"(?i)roleplay\s+as",
            r"(?i)switch\s+to\s+.*\s+mode",
            r"(?i)what\s+(are|is)\s+your\s+(system\s+)?prompt",
            r"(?i)show\s+(me\s+)?your\s+(instructions?|prompt|rules)",
            r"(?i)reveal\s+(your\s+)?(hidden\s+)?instructions?",
            r"(?i)DAN\s*mode",
            r"(?i)developer\s+mode",
            r"(?i)sudo\s+mode",
            r"(?i)\[JAILBREAK\]",
            r"(?i)bypass\s+(safety|filter|restriction)",
            r"(?i)<script[\s>]",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("invalid injection pattern"))
        .collect()
    })
}

/// Scans free text for injection patterns and neutralizes structural
/// characters. Flags are returned for the caller to log; the text is always
/// usable.
pub fn sanitize(input: &str) -> Sanitized {
    let mut flags = Vec::new();
    for pattern in injection_patterns() {
        if pattern.is_match(input) {
            let source: String = pattern.as_str().chars().take(24).collect();
            flags.push(format!("Pattern: {}...", source));
        }
    }

    if !flags.is_empty() {
        warn!(
            matched = flags.len(),
            "potential prompt injection attempt detected"
        );
    }

    let text: String = input
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .map(|c| match c {
            '<' => '＜',
            '>' => '＞',
            '[' => '［',
            ']' => '］',
            other => other,
        })
        .collect();

    Sanitized { text, flags }
}
