//! Order-comparable release versions.
//!
//! Accepts dotted numeric releases ("1", "1.3", "0.4.2", "2.0.0.1").
//! Missing trailing components compare as zero, so `1.3 == 1.3.0`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    release: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("version string is empty")]
    Empty,

    #[error("invalid version component {component:?} in {input:?}")]
    InvalidComponent { input: String, component: String },
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            release: vec![major, minor, patch],
        }
    }

    fn component(&self, idx: usize) -> u64 {
        self.release.get(idx).copied().unwrap_or(0)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(VersionError::Empty);
        }

        let release = trimmed
            .split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|_| VersionError::InvalidComponent {
                        input: s.to_string(),
                        component: part.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { release })
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.release.iter().map(u64::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let n = self.release.len().max(other.release.len());
        (0..n)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn missing_components_compare_as_zero() {
        assert_eq!(v("1.3"), v("1.3.0"));
        assert!(v("1.2") < v("1.3.0"));
        assert!(v("1.10") > v("1.9.9"));
    }

    #[test]
    fn leading_v_is_accepted() {
        assert_eq!(v("v2.0.1"), Version::new(2, 0, 1));
    }

    #[test]
    fn rejects_non_numeric_components() {
        let err = "1.x".parse::<Version>().unwrap_err();
        assert!(matches!(err, VersionError::InvalidComponent { .. }));
        assert_eq!("".parse::<Version>().unwrap_err(), VersionError::Empty);
    }

    #[test]
    fn serde_uses_plain_strings() {
        let json = serde_json::to_string(&v("0.4.2")).unwrap();
        assert_eq!(json, "\"0.4.2\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v("0.4.2"));
        assert!(serde_json::from_str::<Version>("\"abc\"").is_err());
    }
}
