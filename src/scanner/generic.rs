//! A scanner configured with a single user-supplied capture-group
//! regex, for target types the built-in scanners don't cover.

use regex::Regex;

use super::Scanner;

pub struct GenericScanner {
    pattern: Regex,
}

impl GenericScanner {
    /// `pattern` must have exactly one capture group yielding the
    /// reference string.
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }
}

impl Scanner for GenericScanner {
    fn references(&self, content: &str) -> Vec<String> {
        self.pattern
            .captures_iter(content)
            .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
            .collect()
    }
}
