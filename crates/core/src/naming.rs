//! Chronicle naming policy and name patterns
//!
//! Full chronicle names join simple names with a separator and start with the
//! name of the top chronicle, e.g. `bt.fx.usd`. In a non-strict name space the
//! top segment may be omitted (`fx.usd`).

use crate::error::{Error, Result};

/// Splits, checks and joins chronicle names
pub trait NamingPolicy: Send + Sync {
    /// Separator between simple names
    fn separator(&self) -> char;

    /// Simple name of the top chronicle
    fn top(&self) -> &str;

    /// Validate a simple (unqualified) name
    fn check_simple_name(&self, name: &str) -> Result<()>;

    /// Simple names below the top chronicle, outermost first
    fn segments(&self, full_name: &str) -> Result<Vec<String>>;

    /// Full name of a chronicle given its segments below the top chronicle
    fn full_name(&self, segments: &[&str]) -> String;

    /// Split a full name into the parent's full name and the simple name
    ///
    /// The parent is `None` for chronicles directly below the top chronicle.
    fn split(&self, full_name: &str) -> Result<(Option<String>, String)> {
        let mut segments = self.segments(full_name)?;
        let simple = segments.pop().ok_or_else(|| {
            Error::InvalidOperation(format!("{} names the top chronicle", full_name))
        })?;
        let parent = if segments.is_empty() {
            None
        } else {
            let refs: Vec<&str> = segments.iter().map(String::as_str).collect();
            Some(self.full_name(&refs))
        };
        Ok((parent, simple))
    }
}

/// Dot-separated names with an optional strict top segment
#[derive(Debug, Clone)]
pub struct DottedNamingPolicy {
    top: String,
    strict: bool,
}

impl DottedNamingPolicy {
    /// Create a policy for the given top chronicle name
    pub fn new(top: impl Into<String>, strict: bool) -> Self {
        Self {
            top: top.into(),
            strict,
        }
    }

    /// Whether full names must start with the top chronicle
    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

impl NamingPolicy for DottedNamingPolicy {
    fn separator(&self) -> char {
        '.'
    }

    fn top(&self) -> &str {
        &self.top
    }

    fn check_simple_name(&self, name: &str) -> Result<()> {
        let reason = if name.is_empty() {
            Some("name is empty")
        } else if name.contains(self.separator()) {
            Some("simple name contains the separator")
        } else if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            Some("only letters, digits, '_' and '-' are allowed")
        } else {
            None
        };
        match reason {
            None => Ok(()),
            Some(reason) => Err(Error::InvalidValue {
                value_type: "name".to_string(),
                value: name.to_string(),
                reason: reason.to_string(),
            }),
        }
    }

    fn segments(&self, full_name: &str) -> Result<Vec<String>> {
        let mut parts: Vec<&str> = full_name.split(self.separator()).collect();
        if parts.first() == Some(&self.top.as_str()) {
            parts.remove(0);
        } else if self.strict {
            return Err(Error::InvalidValue {
                value_type: "name".to_string(),
                value: full_name.to_string(),
                reason: format!("full name must start with {}", self.top),
            });
        }
        for part in &parts {
            self.check_simple_name(part)?;
        }
        Ok(parts.into_iter().map(str::to_string).collect())
    }

    fn full_name(&self, segments: &[&str]) -> String {
        let mut name = self.top.clone();
        for segment in segments {
            name.push(self.separator());
            name.push_str(segment);
        }
        name
    }
}

/// Wildcard pattern over catalog and schema names
///
/// `*` matches any run of characters, `?` a single one.
#[derive(Debug, Clone)]
pub struct NamePattern {
    pattern: Option<glob::Pattern>,
}

impl NamePattern {
    /// Compile a pattern
    pub fn new(pattern: &str) -> Result<Self> {
        glob::Pattern::new(pattern)
            .map(|pattern| Self {
                pattern: Some(pattern),
            })
            .map_err(|e| Error::InvalidValue {
                value_type: "pattern".to_string(),
                value: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    /// Pattern matching everything
    pub fn any() -> Self {
        Self { pattern: None }
    }

    /// True if the whole name matches
    pub fn matches(&self, name: &str) -> bool {
        match &self.pattern {
            Some(pattern) => pattern.matches(name),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_split_with_and_without_top() {
        let policy = DottedNamingPolicy::new("bt", false);
        assert_eq!(
            policy.split("bt.fx.usd").unwrap(),
            (Some("bt.fx".to_string()), "usd".to_string())
        );
        assert_eq!(policy.split("fx").unwrap(), (None, "fx".to_string()));
        assert!(policy.split("bt").is_err());
    }

    #[test]
    fn test_strict_requires_top() {
        let policy = DottedNamingPolicy::new("bt", true);
        assert!(policy.segments("fx.usd").is_err());
        assert_eq!(policy.segments("bt.fx.usd").unwrap(), vec!["fx", "usd"]);
    }

    #[test]
    fn test_simple_name_rules() {
        let policy = DottedNamingPolicy::new("bt", false);
        assert!(policy.check_simple_name("usd_2-x").is_ok());
        assert!(policy.check_simple_name("").is_err());
        assert!(policy.check_simple_name("a.b").is_err());
        assert!(policy.check_simple_name("a b").is_err());
    }

    #[test]
    fn test_full_name_joins_segments() {
        let policy = DottedNamingPolicy::new("bt", false);
        assert_eq!(policy.full_name(&["fx", "usd"]), "bt.fx.usd");
        assert_eq!(policy.full_name(&[]), "bt");
    }

    #[test]
    fn test_name_pattern() {
        let pattern = NamePattern::new("Tick*").unwrap();
        assert!(pattern.matches("Ticker"));
        assert!(!pattern.matches("ticker"));
        assert!(NamePattern::any().matches("anything at all"));
        assert!(NamePattern::new("[").is_err());
    }

    proptest! {
        #[test]
        fn prop_split_inverts_full_name(segments in proptest::collection::vec("[a-z0-9_-]{1,8}", 1..5)) {
            let policy = DottedNamingPolicy::new("bt", true);
            let refs: Vec<&str> = segments.iter().map(String::as_str).collect();
            let full = policy.full_name(&refs);
            prop_assert_eq!(policy.segments(&full).unwrap(), segments.clone());

            let (parent, simple) = policy.split(&full).unwrap();
            prop_assert_eq!(&simple, segments.last().unwrap());
            let expected_parent = if refs.len() > 1 {
                Some(policy.full_name(&refs[..refs.len() - 1]))
            } else {
                None
            };
            prop_assert_eq!(parent, expected_parent);
        }
    }
}
