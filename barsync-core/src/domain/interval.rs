//! Bar interval (bucket size).

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Bucket size of a bar table.
///
/// Unknown spellings are kept verbatim in `Other` and handed to the quote
/// source as-is; they get no freshness gating and no trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Interval {
    Daily,
    Hourly,
    Weekly,
    Other(String),
}

impl Interval {
    /// Parse an interval code. Accepts the quote-source codes (`1d`, `1h`,
    /// `1wk`) and the long names (`daily`, `hourly`, `weekly`).
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "1d" | "daily" | "day" => Self::Daily,
            "1h" | "60m" | "hourly" | "hour" => Self::Hourly,
            "1wk" | "weekly" | "week" => Self::Weekly,
            _ => Self::Other(s.trim().to_string()),
        }
    }

    /// Code understood by the quote source.
    pub fn code(&self) -> &str {
        match self {
            Self::Daily => "1d",
            Self::Hourly => "1h",
            Self::Weekly => "1wk",
            Self::Other(code) => code,
        }
    }
}

impl FromStr for Interval {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for Interval {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<Interval> for String {
    fn from(interval: Interval) -> Self {
        interval.code().to_string()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_source_codes_and_names() {
        assert_eq!(Interval::parse("1d"), Interval::Daily);
        assert_eq!(Interval::parse("Daily"), Interval::Daily);
        assert_eq!(Interval::parse("1h"), Interval::Hourly);
        assert_eq!(Interval::parse(" hourly "), Interval::Hourly);
        assert_eq!(Interval::parse("1wk"), Interval::Weekly);
        assert_eq!(Interval::parse("weekly"), Interval::Weekly);
    }

    #[test]
    fn unknown_code_is_kept_verbatim() {
        let iv = Interval::parse("1mo");
        assert_eq!(iv, Interval::Other("1mo".into()));
        assert_eq!(iv.code(), "1mo");
    }

    #[test]
    fn serde_uses_source_code() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            interval: Interval,
        }
        let w: Wrapper = toml::from_str(r#"interval = "weekly""#).unwrap();
        assert_eq!(w.interval, Interval::Weekly);
        let out = toml::to_string(&w).unwrap();
        assert_eq!(out.trim(), r#"interval = "1wk""#);
    }
}
