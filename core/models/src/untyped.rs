//! Legacy untyped metadata (KV1) stored as `key{index}:value` strings.
//!
//! The string encoding is kept for on-disk compatibility only.
//! Code manipulating untyped metadata works with [`UntypedEntry`] triples instead.
use std::fmt;

use netauth_errors::Error;

/// Key used to read all untyped metadata entries.
pub const UNTYPED_WILDCARD: &str = "*";

/// A parsed `key{index}:value` entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UntypedEntry {
    pub key: String,
    pub index: Option<String>,
    pub value: String,
}

impl UntypedEntry {
    /// Parse an entry from its string encoding.
    ///
    /// The value is optional so that bare keys (`key` or `key{index}`) can be
    /// used to address entries.
    pub fn parse(raw: &str) -> Result<UntypedEntry, Error> {
        let (key, value) = match raw.split_once(':') {
            Some((key, value)) => (key, value),
            None => (raw, ""),
        };
        let (key, index) = match key.strip_suffix('}').and_then(|key| key.split_once('{')) {
            Some((key, index)) => (key, Some(index.to_string())),
            None => (key, None),
        };
        if key.is_empty() {
            let reason = format!("untyped metadata entry '{}' has no key", raw);
            return Err(Error::MalformedRequest(reason));
        }
        Ok(UntypedEntry {
            key: key.to_string(),
            index,
            value: value.to_string(),
        })
    }

    /// Check if the entry has the same key and index as `other`.
    pub fn same_slot(&self, other: &UntypedEntry) -> bool {
        self.key == other.key && self.index == other.index
    }
}

impl fmt::Display for UntypedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.index {
            None => write!(f, "{}:{}", self.key, self.value),
            Some(index) => write!(f, "{}{{{}}}:{}", self.key, index, self.value),
        }
    }
}

/// Reject keys that can't be encoded because they contain the `:` separator.
pub fn check_key(key: &str) -> Result<(), Error> {
    if key.contains(':') {
        let reason = format!("untyped metadata key '{}' contains the reserved ':'", key);
        return Err(Error::MalformedRequest(reason));
    }
    Ok(())
}

/// Insert or update an entry in a list of encoded entries.
///
/// An existing entry with the same key and index has its value replaced in place,
/// otherwise the entry is appended.
pub fn upsert(list: &mut Vec<String>, raw: &str) -> Result<(), Error> {
    let entry = UntypedEntry::parse(raw)?;
    let existing = list.iter_mut().find(|current| match UntypedEntry::parse(current) {
        Ok(current) => current.same_slot(&entry),
        Err(_) => false,
    });
    match existing {
        Some(current) => *current = entry.to_string(),
        None => list.push(entry.to_string()),
    }
    Ok(())
}

/// Remove entries whose key and index exactly match the given key.
pub fn clear_exact(list: &mut Vec<String>, raw: &str) -> Result<(), Error> {
    let target = UntypedEntry::parse(raw)?;
    list.retain(|current| match UntypedEntry::parse(current) {
        Ok(current) => !current.same_slot(&target),
        Err(_) => true,
    });
    Ok(())
}

/// Remove entries whose key matches the given key, regardless of index.
pub fn clear_fuzzy(list: &mut Vec<String>, raw: &str) -> Result<(), Error> {
    let target = UntypedEntry::parse(raw)?;
    list.retain(|current| match UntypedEntry::parse(current) {
        Ok(current) => current.key != target.key,
        Err(_) => true,
    });
    Ok(())
}

/// Return entries whose key matches the given key, or all entries for [`UNTYPED_WILDCARD`].
///
/// When the requested key carries an index only the entry in that slot is returned.
pub fn read(list: &[String], raw: &str) -> Result<Vec<String>, Error> {
    if raw == UNTYPED_WILDCARD {
        return Ok(list.to_vec());
    }
    let target = UntypedEntry::parse(raw)?;
    let found = list
        .iter()
        .filter(|current| match UntypedEntry::parse(current) {
            Err(_) => false,
            Ok(current) if target.index.is_some() => current.same_slot(&target),
            Ok(current) => current.key == target.key,
        })
        .cloned()
        .collect();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::UntypedEntry;

    fn fixture() -> Vec<String> {
        vec![
            "phone{home}:555-1".to_string(),
            "phone{work}:555-2".to_string(),
            "shoe:42".to_string(),
        ]
    }

    #[test]
    fn parse_indexed() {
        let entry = UntypedEntry::parse("phone{home}:555:1").unwrap();
        assert_eq!(entry.key, "phone");
        assert_eq!(entry.index.as_deref(), Some("home"));
        assert_eq!(entry.value, "555:1");
        assert_eq!(entry.to_string(), "phone{home}:555:1");
    }

    #[test]
    fn parse_bare_key() {
        let entry = UntypedEntry::parse("shoe").unwrap();
        assert_eq!(entry.key, "shoe");
        assert_eq!(entry.index, None);
        assert_eq!(entry.value, "");
    }

    #[test]
    fn parse_rejects_empty_key() {
        assert!(UntypedEntry::parse(":value").is_err());
    }

    #[test]
    fn check_key_rejects_separator() {
        assert!(super::check_key("phone{home}").is_ok());
        let error = super::check_key("a:b").unwrap_err();
        assert!(matches!(error, netauth_errors::Error::MalformedRequest(_)));
    }

    #[test]
    fn upsert_replaces_slot() {
        let mut list = fixture();
        super::upsert(&mut list, "phone{work}:555-9").unwrap();
        assert_eq!(list[1], "phone{work}:555-9");
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn upsert_appends_new_slot() {
        let mut list = fixture();
        super::upsert(&mut list, "phone{cell}:555-3").unwrap();
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn upsert_same_value_is_noop() {
        let mut list = fixture();
        super::upsert(&mut list, "shoe:42").unwrap();
        assert_eq!(list, fixture());
    }

    #[test]
    fn clear_exact_keeps_other_slots() {
        let mut list = fixture();
        super::clear_exact(&mut list, "phone{home}").unwrap();
        assert_eq!(list, ["phone{work}:555-2", "shoe:42"]);
    }

    #[test]
    fn clear_fuzzy_drops_all_slots() {
        let mut list = fixture();
        super::clear_fuzzy(&mut list, "phone").unwrap();
        assert_eq!(list, ["shoe:42"]);
    }

    #[test]
    fn read_by_key() {
        let list = fixture();
        assert_eq!(super::read(&list, "phone").unwrap().len(), 2);
        assert_eq!(super::read(&list, "phone{work}").unwrap(), ["phone{work}:555-2"]);
        assert_eq!(super::read(&list, "*").unwrap().len(), 3);
        assert!(super::read(&list, "hat").unwrap().is_empty());
    }
}
