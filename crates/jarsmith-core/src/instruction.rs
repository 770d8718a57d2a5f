//! Selection rules
//!
//! Archive merges, shading and directory ingestion only need to ask whether a
//! name is selected. [`Instruction`] is that narrow contract; the full
//! wildcard and macro language lives outside this workspace.

use crate::{ArchiveError, ArchiveResult};
use regex::Regex;

/// A predicate over archive paths or package names
pub trait Instruction {
    /// Returns true when the name matches the rule's pattern
    fn matches(&self, name: &str) -> bool;

    /// Returns true when a match means "exclude"
    fn is_negated(&self) -> bool {
        false
    }

    /// Whether the name is selected: a match that is not negated, or a
    /// non-match of a negated rule
    fn selects(&self, name: &str) -> bool {
        self.matches(name) ^ self.is_negated()
    }
}

impl<F> Instruction for F
where
    F: Fn(&str) -> bool,
{
    fn matches(&self, name: &str) -> bool {
        self(name)
    }
}

/// Wildcard instruction backed by a regular expression
///
/// `*` matches any run of characters, `?` a single character, and a leading
/// `!` negates the rule. A pattern ending in `.*` or `/*` also matches the
/// bare prefix, so `com.acme.*` selects `com.acme` itself.
#[derive(Debug, Clone)]
pub struct PatternInstruction {
    source: String,
    pattern: Regex,
    negated: bool,
}

impl PatternInstruction {
    /// Parse a wildcard instruction
    pub fn new(instruction: &str) -> ArchiveResult<Self> {
        let trimmed = instruction.trim();
        let (negated, body) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let mut re = String::from("^(?:");
        let (body, optional_tail) = if let Some(stem) = body.strip_suffix(".*") {
            (stem, Some(r"\..*"))
        } else if let Some(stem) = body.strip_suffix("/*") {
            (stem, Some("/.*"))
        } else {
            (body, None)
        };
        for c in body.chars() {
            match c {
                '*' => re.push_str(".*"),
                '?' => re.push('.'),
                other => re.push_str(&regex::escape(&other.to_string())),
            }
        }
        if let Some(tail) = optional_tail {
            re.push_str("(?:");
            re.push_str(tail);
            re.push_str(")?");
        }
        re.push_str(")$");

        let pattern = Regex::new(&re)
            .map_err(|e| ArchiveError::InvalidArgument(format!("{instruction}: {e}")))?;
        Ok(Self {
            source: instruction.to_string(),
            pattern,
            negated,
        })
    }

    /// Use a regular expression verbatim; the whole name must match
    pub fn regex(pattern: &str) -> ArchiveResult<Self> {
        let anchored = format!("^(?:{pattern})$");
        let compiled = Regex::new(&anchored)
            .map_err(|e| ArchiveError::InvalidArgument(format!("{pattern}: {e}")))?;
        Ok(Self {
            source: pattern.to_string(),
            pattern: compiled,
            negated: false,
        })
    }

    /// The instruction text this rule was built from
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Instruction for PatternInstruction {
    fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }

    fn is_negated(&self) -> bool {
        self.negated
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn PatternInstruction___star___matches_any_run() {
        let i = PatternInstruction::new("META-INF/*.SF").unwrap();

        assert!(i.matches("META-INF/CERT.SF"));
        assert!(!i.matches("META-INF/CERT.RSA"));
    }

    #[test]
    fn PatternInstruction___package_wildcard___matches_prefix_itself() {
        let i = PatternInstruction::new("com.acme.*").unwrap();

        assert!(i.matches("com.acme"));
        assert!(i.matches("com.acme.impl"));
        assert!(!i.matches("com.acmex"));
    }

    #[test]
    fn PatternInstruction___negated___inverts_selection() {
        let i = PatternInstruction::new("!META-INF/versions/*").unwrap();

        assert!(i.is_negated());
        assert!(i.matches("META-INF/versions/9/a.class"));
        assert!(!i.selects("META-INF/versions/9/a.class"));
        assert!(i.selects("a.class"));
    }

    #[test]
    fn PatternInstruction___dots___are_literal() {
        let i = PatternInstruction::new("a.b").unwrap();

        assert!(i.matches("a.b"));
        assert!(!i.matches("axb"));
    }

    #[test]
    fn PatternInstruction___regex___requires_full_match() {
        let i = PatternInstruction::regex(r"CVS|\.svn|\.git|\.DS_Store").unwrap();

        assert!(i.matches(".git"));
        assert!(!i.matches(".gitignore"));
    }

    #[test]
    fn PatternInstruction___regex___invalid___returns_error() {
        let result = PatternInstruction::regex("(unclosed");

        assert!(matches!(result, Err(ArchiveError::InvalidArgument(_))));
    }

    #[test]
    fn Instruction___closure___is_never_negated() {
        let rule = |name: &str| name.ends_with(".class");

        assert!(rule.selects("a/B.class"));
        assert!(!rule.selects("a/b.txt"));
    }
}
