//! Wildcard patterns for index names and field paths.
//!
//! Patterns support `*` (any run of characters) and `?` (any single
//! character). Field patterns additionally cover dotted descendants: a rule
//! on `machine` applies to `machine.os` unless a more specific rule overrides
//! it. Specificity is the count of literal (non-wildcard) characters and is
//! used to pick the winning rule *within* one role.

use regex::Regex;

/// A compiled index or field pattern.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    raw: String,
    /// Compiled form; `None` for exact patterns, which compare literally.
    regex: Option<Regex>,
}

impl WildcardPattern {
    pub fn new(raw: &str) -> Self {
        let regex = if raw.contains(['*', '?']) {
            // Escaping every literal char makes the compile infallible in
            // practice; a failed compile degrades to literal comparison.
            Regex::new(&wildcard_to_regex(raw)).ok()
        } else {
            None
        };
        Self {
            raw: raw.to_string(),
            regex,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_exact(&self) -> bool {
        self.regex.is_none()
    }

    /// Count of literal characters. Exact, deeper paths rank above wildcards
    /// and parent paths.
    pub fn specificity(&self) -> usize {
        self.raw.chars().filter(|c| *c != '*' && *c != '?').count()
    }

    /// Whole-string match, no descendant coverage.
    pub fn matches(&self, candidate: &str) -> bool {
        match &self.regex {
            Some(re) => re.is_match(candidate),
            None => self.raw == candidate,
        }
    }

    /// Field-path match: whole-string, or the pattern names an ancestor
    /// object of `path` (`machine` covers `machine.os.keyword`).
    pub fn matches_path(&self, path: &str) -> bool {
        if self.matches(path) {
            return true;
        }
        path.rsplit_once('.')
            .is_some_and(|(parent, _)| self.matches_path(parent))
    }
}

fn wildcard_to_regex(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    out.push('^');
    for c in raw.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}
