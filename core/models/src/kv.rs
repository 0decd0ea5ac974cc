//! Structured key/values metadata (KV2) attached to entities and groups.
use serde::Deserialize;
use serde::Serialize;

use netauth_errors::Error;

/// Key used to read every record in a KV2 list.
pub const KV_WILDCARD: &str = "*";

/// A single key with its ordered values.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct KvData {
    #[prost(string, tag = "1")]
    pub key: String,

    #[prost(message, repeated, tag = "2")]
    pub values: Vec<KvValue>,
}

/// One value of a [`KvData`] record with its position.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct KvValue {
    #[prost(string, tag = "1")]
    pub value: String,

    #[prost(int32, tag = "2")]
    pub index: i32,
}

impl KvData {
    /// Create a record from `(index, value)` pairs.
    pub fn new<K, I, V>(key: K, values: I) -> KvData
    where
        K: Into<String>,
        I: IntoIterator<Item = (i32, V)>,
        V: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|(index, value)| KvValue {
                value: value.into(),
                index,
            })
            .collect();
        KvData {
            key: key.into(),
            values,
        }
    }

    /// Return a copy of the record with values ordered by index.
    pub fn sorted(&self) -> KvData {
        let mut record = self.clone();
        record.values.sort_by_key(|value| value.index);
        record
    }
}

/// Read records from a KV2 list by exact key, or all records with [`KV_WILDCARD`].
///
/// Values of returned records are sorted by index.
pub fn read(records: &[KvData], key: &str) -> Result<Vec<KvData>, Error> {
    let found: Vec<KvData> = records
        .iter()
        .filter(|record| key == KV_WILDCARD || record.key == key)
        .map(KvData::sorted)
        .collect();
    if found.is_empty() && key != KV_WILDCARD {
        return Err(Error::NoSuchKey(key.to_string()));
    }
    Ok(found)
}

/// Append a record to a KV2 list, failing if the key is already present.
pub fn add(records: &mut Vec<KvData>, record: KvData) -> Result<(), Error> {
    if records.iter().any(|existing| existing.key == record.key) {
        return Err(Error::KeyExists(record.key));
    }
    records.push(record);
    Ok(())
}

/// Remove the record with the exact key, failing if no record matches.
pub fn del(records: &mut Vec<KvData>, key: &str) -> Result<(), Error> {
    let before = records.len();
    records.retain(|record| record.key != key);
    if records.len() == before {
        return Err(Error::NoSuchKey(key.to_string()));
    }
    Ok(())
}

/// Replace an existing record wholesale.
pub fn replace(records: &mut Vec<KvData>, record: KvData) -> Result<(), Error> {
    del(records, &record.key)?;
    add(records, record)
}

#[cfg(test)]
mod tests {
    use netauth_errors::Error;

    use super::KvData;

    fn phone() -> KvData {
        KvData::new("phone", [(1, "555-2"), (0, "555-1")])
    }

    #[test]
    fn add_rejects_existing_key() {
        let mut records = vec![phone()];
        let error = super::add(&mut records, phone()).unwrap_err();
        assert_eq!(error, Error::KeyExists("phone".into()));
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn del_missing_key() {
        let mut records = vec![phone()];
        super::del(&mut records, "phone").unwrap();
        let error = super::del(&mut records, "phone").unwrap_err();
        assert_eq!(error, Error::NoSuchKey("phone".into()));
    }

    #[test]
    fn read_sorts_values() {
        let records = vec![phone()];
        let found = super::read(&records, "phone").unwrap();
        let values: Vec<&str> = found[0].values.iter().map(|v| v.value.as_str()).collect();
        assert_eq!(values, ["555-1", "555-2"]);
    }

    #[test]
    fn read_wildcard() {
        let records = vec![phone(), KvData::new("office", [(0, "B12")])];
        let found = super::read(&records, "*").unwrap();
        assert_eq!(found.len(), 2);
        assert!(super::read(&[], "*").unwrap().is_empty());
    }

    #[test]
    fn replace_requires_existing() {
        let mut records = Vec::new();
        let error = super::replace(&mut records, phone()).unwrap_err();
        assert_eq!(error, Error::NoSuchKey("phone".into()));

        records.push(phone());
        super::replace(&mut records, KvData::new("phone", [(0, "555-9")])).unwrap();
        assert_eq!(records[0].values.len(), 1);
        assert_eq!(records[0].values[0].value, "555-9");
    }
}
