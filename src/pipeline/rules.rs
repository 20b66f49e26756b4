//! Extension rule matching.
//!
//! Rules are compared by full, case-insensitive equality of the extension
//! string (leading dot included). List order is the only precedence: the
//! first rule that matches wins, later duplicates are never consulted.

use tracing::trace;

use crate::config::Rule;

/// Ordered rule list.
#[derive(Debug, Clone, Default)]
pub struct RuleMatcher {
    rules: Vec<Rule>,
}

impl RuleMatcher {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// First rule for `extension`, or `None` when nothing matches.
    pub fn find(&self, extension: &str) -> Option<&Rule> {
        match_rule(extension, &self.rules)
    }
}

/// First rule in `rules` whose extension equals `extension`, ignoring case.
pub fn match_rule<'a>(extension: &str, rules: &'a [Rule]) -> Option<&'a Rule> {
    let wanted = extension.to_lowercase();
    let rule = rules
        .iter()
        .find(|rule| rule.extension.to_lowercase() == wanted);
    trace!(extension = %extension, matched = rule.is_some(), "Rule lookup");
    rule
}
