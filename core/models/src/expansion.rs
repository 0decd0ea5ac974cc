//! Group expansion rules shaping effective memberships.
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use netauth_errors::Error;

/// Kind of edge an expansion rule adds (or removes) between two groups.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleMode {
    /// Members of the target group are members of the group.
    Include,

    /// Members of the target group are never members of the group.
    Exclude,

    /// Remove any existing rule targeting the group (request only).
    Drop,
}

impl RuleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleMode::Include => "INCLUDE",
            RuleMode::Exclude => "EXCLUDE",
            RuleMode::Drop => "DROP",
        }
    }
}

impl FromStr for RuleMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "INCLUDE" => Ok(RuleMode::Include),
            "EXCLUDE" => Ok(RuleMode::Exclude),
            "DROP" => Ok(RuleMode::Drop),
            _ => {
                let reason = format!("unknown expansion mode '{}'", value);
                Err(Error::MalformedRequest(reason))
            }
        }
    }
}

/// A parsed `MODE:target` expansion rule.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ExpansionRule {
    pub mode: RuleMode,
    pub target: String,
}

impl ExpansionRule {
    pub fn new<S: Into<String>>(mode: RuleMode, target: S) -> ExpansionRule {
        ExpansionRule {
            mode,
            target: target.into(),
        }
    }

    /// Parse a rule from its `MODE:target` string encoding.
    pub fn parse(raw: &str) -> Result<ExpansionRule, Error> {
        let (mode, target) = raw.split_once(':').ok_or_else(|| {
            let reason = format!("expansion rule '{}' is not in the MODE:target form", raw);
            Error::MalformedRequest(reason)
        })?;
        if target.is_empty() {
            let reason = format!("expansion rule '{}' has no target", raw);
            return Err(Error::MalformedRequest(reason));
        }
        Ok(ExpansionRule {
            mode: mode.parse()?,
            target: target.to_string(),
        })
    }

    /// Parse all valid rules in a list, skipping malformed entries.
    pub fn parse_all(list: &[String]) -> Vec<ExpansionRule> {
        list.iter()
            .filter_map(|raw| ExpansionRule::parse(raw).ok())
            .collect()
    }
}

impl fmt::Display for ExpansionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.mode.as_str(), self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::ExpansionRule;
    use super::RuleMode;

    #[test]
    fn parse_rule() {
        let rule = ExpansionRule::parse("INCLUDE:dev").unwrap();
        assert_eq!(rule, ExpansionRule::new(RuleMode::Include, "dev"));
        assert_eq!(rule.to_string(), "INCLUDE:dev");
        let rule = ExpansionRule::parse("exclude:contractors").unwrap();
        assert_eq!(rule.mode, RuleMode::Exclude);
    }

    #[test]
    fn parse_invalid() {
        assert!(ExpansionRule::parse("INCLUDE").is_err());
        assert!(ExpansionRule::parse("INCLUDE:").is_err());
        assert!(ExpansionRule::parse("MERGE:dev").is_err());
    }

    #[test]
    fn parse_all_skips_invalid() {
        let list = vec!["INCLUDE:a".to_string(), "junk".to_string()];
        assert_eq!(ExpansionRule::parse_all(&list).len(), 1);
    }
}
