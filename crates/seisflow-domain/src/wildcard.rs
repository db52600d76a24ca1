//! Wildcard filter parsing (§9): `*` (any), `?` (single char), and `!X`
//! negation. Positive patterns are sent to FDSN services (after mapping
//! empty location to `--`); negations are never sent outbound and are
//! applied client-side after the response comes back (§4.5 step 1).

use regex::Regex;

/// One comma-separated filter value (e.g. a `channel=` argument), split into
/// the patterns to send on the wire and the patterns to reject locally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WildcardFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl WildcardFilter {
    /// Parses a comma-separated list such as `"HH?,BH?,!HHZ"`.
    pub fn parse(spec: &str) -> Self {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for raw in spec.split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            if let Some(negated) = raw.strip_prefix('!') {
                exclude.push(negated.to_string());
            } else {
                include.push(raw.to_string());
            }
        }
        Self { include, exclude }
    }

    /// `true` iff no constraint was specified at all (fully open filter).
    pub fn is_unconstrained(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// `true` iff `value` satisfies this filter: matches at least one
    /// include pattern (or there are none, meaning "any"), and matches no
    /// exclude pattern.
    pub fn matches(&self, value: &str) -> bool {
        if self.exclude.iter().any(|p| glob_match(p, value)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| glob_match(p, value))
    }

    /// The patterns that are safe to send in an outbound FDSN request body —
    /// i.e. everything except negations. Empty means "no filtering" which
    /// callers map to a literal `*`.
    pub fn outbound_patterns(&self) -> &[String] {
        &self.include
    }
}

/// Converts a glob pattern (`*`, `?`) to an anchored regex and tests it.
pub fn glob_match(pattern: &str, value: &str) -> bool {
    glob_to_regex(pattern).is_match(value)
}

pub fn glob_to_regex(pattern: &str) -> Regex {
    let mut re = String::with_capacity(pattern.len() + 2);
    re.push('^');
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            _ => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).expect("glob-derived regex is always valid")
}

/// Converts a glob pattern to a SQL `LIKE` pattern: `*` -> `%`, `?` -> `_`,
/// with existing `%`/`_`/`\` escaped so they're matched literally.
pub fn glob_to_sql_like(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '*' => out.push('%'),
            '?' => out.push('_'),
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// FDSN maps an empty location code to the literal string `"--"` on the
/// wire; callers keep `""` in memory and call this only when building
/// request bodies.
pub fn location_for_wire(location: &str) -> &str {
    if location.is_empty() {
        "--"
    } else {
        location
    }
}
