use regex::Regex;

use crate::error::{DumpError, Result};
use crate::model::Dialog;

/// Selects which dialogs a session visits. Patterns use `*` as a wildcard and
/// are matched against both the dialog id and its name.
#[derive(Debug, Clone, Default)]
pub struct DialogFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl DialogFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: compile_all(include)?,
            exclude: compile_all(exclude)?,
        })
    }

    pub fn includes(&self, dialog: &Dialog) -> bool {
        let matches = |patterns: &[Regex]| {
            patterns.iter().any(|re| {
                re.is_match(&dialog.id) || dialog.name.as_deref().is_some_and(|n| re.is_match(n))
            })
        };
        if matches(&self.exclude) {
            return false;
        }
        self.include.is_empty() || matches(&self.include)
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns.iter().map(|p| glob_to_regex(p)).collect()
}

fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("(?i)^{body}$"))
        .map_err(|err| DumpError::config(format!("invalid dialog pattern '{pattern}': {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_filter_includes_everything() {
        let filter = DialogFilter::default();
        assert!(filter.includes(&Dialog::new("anything")));
    }

    #[test]
    fn include_matches_id_or_name() {
        let filter = DialogFilter::new(&patterns(&["team-*", "alice"]), &[]).unwrap();
        assert!(filter.includes(&Dialog::new("team-core")));
        assert!(filter.includes(&Dialog::new("user#1").with_name("Alice")));
        assert!(!filter.includes(&Dialog::new("bob")));
    }

    #[test]
    fn exclude_wins_over_include() {
        let filter = DialogFilter::new(&patterns(&["*"]), &patterns(&["*.bot"])).unwrap();
        assert!(filter.includes(&Dialog::new("alice")));
        assert!(!filter.includes(&Dialog::new("news.bot")));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let filter = DialogFilter::new(&patterns(&["chat(1)"]), &[]).unwrap();
        assert!(filter.includes(&Dialog::new("chat(1)")));
        assert!(!filter.includes(&Dialog::new("chat1")));
    }
}
