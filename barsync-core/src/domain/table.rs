use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Name of a physical bar table. One table holds one (ticker, interval) pair.
///
/// Table names end up inside DDL and DML text, so only plain SQL identifiers
/// are accepted: an ASCII letter or underscore followed by letters, digits or
/// underscores, at most 63 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid table name '{0}': expected [A-Za-z_][A-Za-z0-9_]*, at most 63 bytes")]
pub struct InvalidTableName(pub String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidTableName> {
        let name = name.into();
        let mut chars = name.chars();
        let valid_head = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid_head && valid_tail && name.len() <= 63 {
            Ok(Self(name))
        } else {
            Err(InvalidTableName(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted identifier for use in SQL text.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl TryFrom<String> for TableName {
    type Error = InvalidTableName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TableName> for String {
    fn from(name: TableName) -> Self {
        name.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        assert!(TableName::new("cac").is_ok());
        assert!(TableName::new("cac_hourly").is_ok());
        assert!(TableName::new("_tmp2").is_ok());
    }

    #[test]
    fn rejects_injection_and_odd_names() {
        assert!(TableName::new("").is_err());
        assert!(TableName::new("1cac").is_err());
        assert!(TableName::new("cac; DROP TABLE x").is_err());
        assert!(TableName::new("cac\"").is_err());
        assert!(TableName::new("a".repeat(64)).is_err());
    }

    #[test]
    fn quoted_wraps_in_double_quotes() {
        let t = TableName::new("cac").unwrap();
        assert_eq!(t.quoted(), "\"cac\"");
    }
}
