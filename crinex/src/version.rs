//! Format revision description
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Version is used to describe both RINEX and CRINEX revisions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Version {
    /// Version major number
    pub major: u8,
    /// Version minor number
    pub minor: u8,
}

#[derive(Clone, Debug, Error)]
pub enum ParsingError {
    #[error("failed to parse version from \"{0}\"")]
    VersionFormat(String),
}

impl Version {
    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl std::str::FromStr for Version {
    type Err = ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.split_once('.') {
            Some((major, minor)) => {
                let major = major
                    .parse::<u8>()
                    .map_err(|_| ParsingError::VersionFormat(s.to_string()))?;
                let minor = minor
                    .parse::<u8>()
                    .map_err(|_| ParsingError::VersionFormat(s.to_string()))?;
                Ok(Self { major, minor })
            },
            None => {
                let major = trimmed
                    .parse::<u8>()
                    .map_err(|_| ParsingError::VersionFormat(s.to_string()))?;
                Ok(Self { major, minor: 0 })
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::Version;
    use std::str::FromStr;

    #[test]
    fn parsing() {
        let v = Version::from_str("     2.11").unwrap();
        assert_eq!(v, Version::new(2, 11));

        let v = Version::from_str("3.0").unwrap();
        assert_eq!(v, Version::new(3, 0));
        assert_eq!(v.to_string(), "3.0");

        let v = Version::from_str("2").unwrap();
        assert_eq!(v, Version::new(2, 0));

        assert!(Version::from_str("x.y").is_err());
    }
}
