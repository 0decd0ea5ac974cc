//! Free-form boolean query expressions with field qualifiers.
//!
//! An expression is a whitespace separated list of clauses:
//!
//! - `value` matches documents with any field matching the value.
//! - `field:value` matches documents whose `field` matches the value.
//!   Fields are dotted paths (`meta.Shell`) and can omit leading path segments (`Shell`).
//! - A `+` prefix makes the clause required, a `-` prefix excludes matching documents.
//!   Without a prefix clauses are optional but at least one must match unless
//!   the expression has required clauses.
//!
//! Values are matched case insensitively and can be:
//!
//! - A plain term: equal to the field or to one of its words.
//! - A glob: terms with `*`, `?` or `[...]` (`ID:demo*`).
//! - A phrase in double quotes: contained in the field.
//! - A numeric range: `>N`, `>=N`, `<N`, `<=N`.
use netauth_errors::Error;

use crate::document::normalise;
use crate::document::Document;
use crate::document::FieldValue;

/// How a clause contributes to matching.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Occur {
    Must,
    MustNot,
    Should,
}

/// Value matching logic of a clause.
#[derive(Clone, Debug)]
enum Matcher {
    Glob(glob::Pattern),
    Phrase(String),
    Range(Comparison, f64),
    Term(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Comparison {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

#[derive(Clone, Debug)]
struct Clause {
    field: Option<String>,
    matcher: Matcher,
    occur: Occur,
}

/// A parsed query expression.
#[derive(Clone, Debug)]
pub struct Query {
    clauses: Vec<Clause>,
}

impl Query {
    /// Parse a query expression.
    ///
    /// Empty and malformed expressions fail with [`Error::BadSearch`].
    pub fn parse(expression: &str) -> Result<Query, Error> {
        let tokens = tokenize(expression)?;
        if tokens.is_empty() {
            return Err(Error::BadSearch("the search expression is empty".into()));
        }
        let clauses = tokens
            .iter()
            .map(|token| Clause::parse(token))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Query { clauses })
    }

    /// Score a document against the query, or `None` if it does not match.
    pub fn score(&self, document: &Document) -> Option<usize> {
        let has_must = self.clauses.iter().any(|clause| clause.occur == Occur::Must);
        let has_should = self
            .clauses
            .iter()
            .any(|clause| clause.occur == Occur::Should);
        let mut score = 0;
        let mut should_matched = false;
        for clause in &self.clauses {
            let matched = clause.matches(document);
            match (clause.occur, matched) {
                (Occur::Must, false) => return None,
                (Occur::MustNot, true) => return None,
                (Occur::Must, true) => score += 1,
                (Occur::Should, true) => {
                    should_matched = true;
                    score += 1;
                }
                _ => (),
            }
        }
        if has_should && !has_must && !should_matched {
            return None;
        }
        Some(score)
    }
}

impl Clause {
    fn parse(token: &str) -> Result<Clause, Error> {
        let (occur, rest) = match token.chars().next() {
            Some('+') => (Occur::Must, &token[1..]),
            Some('-') => (Occur::MustNot, &token[1..]),
            _ => (Occur::Should, token),
        };
        if rest.is_empty() {
            let reason = format!("clause '{}' has no value", token);
            return Err(Error::BadSearch(reason));
        }

        let (field, value) = match rest.starts_with('"') {
            true => (None, rest),
            false => match rest.split_once(':') {
                None => (None, rest),
                Some((field, value)) => (Some(field), value),
            },
        };
        if let Some(field) = field {
            if field.is_empty() {
                let reason = format!("clause '{}' has an empty field name", token);
                return Err(Error::BadSearch(reason));
            }
        }
        if value.is_empty() {
            let reason = format!("clause '{}' has no value", token);
            return Err(Error::BadSearch(reason));
        }

        Ok(Clause {
            field: field.map(normalise),
            matcher: Matcher::parse(value)?,
            occur,
        })
    }

    fn matches(&self, document: &Document) -> bool {
        document
            .fields
            .iter()
            .filter(|(path, _)| match &self.field {
                None => true,
                Some(field) => path == field || path.ends_with(&format!(".{}", field)),
            })
            .any(|(_, value)| self.matcher.matches(value))
    }
}

impl Matcher {
    fn parse(value: &str) -> Result<Matcher, Error> {
        if let Some(phrase) = value.strip_prefix('"') {
            let phrase = phrase.strip_suffix('"').unwrap_or(phrase);
            return Ok(Matcher::Phrase(phrase.to_lowercase()));
        }

        let range = [
            (">=", Comparison::GreaterOrEqual),
            ("<=", Comparison::LessOrEqual),
            (">", Comparison::Greater),
            ("<", Comparison::Less),
        ];
        for (prefix, comparison) in range {
            if let Some(number) = value.strip_prefix(prefix) {
                let number: f64 = number.parse().map_err(|_| {
                    Error::BadSearch(format!("'{}' is not a valid number", number))
                })?;
                return Ok(Matcher::Range(comparison, number));
            }
        }

        let value = value.to_lowercase();
        if value.contains(['*', '?', '[']) {
            let pattern = glob::Pattern::new(&value).map_err(|error| {
                Error::BadSearch(format!("invalid wildcard '{}': {}", value, error))
            })?;
            return Ok(Matcher::Glob(pattern));
        }
        Ok(Matcher::Term(value))
    }

    fn matches(&self, value: &FieldValue) -> bool {
        match (self, value) {
            (Matcher::Range(comparison, bound), FieldValue::Number(value)) => match comparison {
                Comparison::Greater => value > bound,
                Comparison::GreaterOrEqual => value >= bound,
                Comparison::Less => value < bound,
                Comparison::LessOrEqual => value <= bound,
            },
            (Matcher::Range(_, _), _) => false,
            (Matcher::Term(term), FieldValue::Number(value)) => term
                .parse::<f64>()
                .map(|term| term == *value)
                .unwrap_or(false),
            (Matcher::Term(term), FieldValue::Bool(value)) => term == &value.to_string(),
            (Matcher::Term(term), FieldValue::Text(text)) => {
                let text = text.to_lowercase();
                text == *term || words(&text).any(|word| word == term)
            }
            (Matcher::Glob(pattern), FieldValue::Text(text)) => {
                pattern.matches(&text.to_lowercase())
            }
            (Matcher::Glob(pattern), FieldValue::Number(value)) => {
                pattern.matches(&value.to_string())
            }
            (Matcher::Glob(_), FieldValue::Bool(_)) => false,
            (Matcher::Phrase(phrase), FieldValue::Text(text)) => {
                text.to_lowercase().contains(phrase.as_str())
            }
            (Matcher::Phrase(_), _) => false,
        }
    }
}

/// Split text into words on non alphanumeric characters.
fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
}

/// Split an expression into clauses on whitespace outside double quotes.
fn tokenize(expression: &str) -> Result<Vec<String>, Error> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in expression.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if quoted {
        let reason = "unbalanced double quotes in search expression".to_string();
        return Err(Error::BadSearch(reason));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use netauth_errors::Error;
    use netauth_models::Entity;

    use super::Query;
    use crate::document::Document;

    fn alice() -> Document {
        let mut entity = Entity::with_id("alice");
        entity.number = 42;
        let meta = entity.meta_mut();
        meta.shell = Some("/bin/bash".into());
        meta.display_name = Some("Alice Liddell".into());
        meta.groups.push("dev".into());
        Document::entity(&entity)
    }

    fn matches(expression: &str) -> bool {
        Query::parse(expression).unwrap().score(&alice()).is_some()
    }

    #[test]
    fn empty_expression_is_bad_search() {
        for expression in ["", "   "] {
            let error = Query::parse(expression).unwrap_err();
            assert!(matches!(error, Error::BadSearch(_)));
        }
    }

    #[test]
    fn malformed_expressions() {
        for expression in ["+", "ID:", ":alice", "\"open", "number:>x", "id:[a"] {
            let error = Query::parse(expression).unwrap_err();
            assert!(matches!(error, Error::BadSearch(_)), "{}", expression);
        }
    }

    #[test]
    fn field_qualified_terms() {
        assert!(matches("ID:alice"));
        assert!(matches("meta.Shell:/bin/bash"));
        assert!(matches("Shell:/bin/bash"));
        assert!(matches("meta.DisplayName:liddell"));
        assert!(!matches("ID:bob"));
        assert!(!matches("meta.Shell:/bin/zsh"));
    }

    #[test]
    fn wildcards_and_phrases() {
        assert!(matches("ID:ali*"));
        assert!(matches("ID:a?ice"));
        assert!(matches("displayname:\"alice lid\""));
        assert!(!matches("ID:bo*"));
    }

    #[test]
    fn numeric_ranges() {
        assert!(matches("number:>40"));
        assert!(matches("number:<=42"));
        assert!(matches("number:42"));
        assert!(!matches("number:<42"));
    }

    #[test]
    fn boolean_clauses() {
        assert!(matches("+ID:alice groups:ops"));
        assert!(!matches("+ID:alice -groups:dev"));
        assert!(matches("ID:bob dev"));
        assert!(!matches("ID:bob ops"));
        assert!(matches("-ID:bob"));
    }

    #[test]
    fn score_counts_matching_clauses() {
        let query = Query::parse("ID:alice dev ops").unwrap();
        assert_eq!(query.score(&alice()), Some(2));
    }
}
