//! Error taxonomy shared by both conversion directions.
use crate::{MAX_DIFF_ORDER, MAX_LINE_LEN, MAX_OBS_TYPES, MAX_SAT};
use thiserror::Error;

/// Every line-related variant carries the 1-based number of the input
/// line on which the condition was detected, plus a delimited echo of
/// the offending content.
#[derive(Error, Debug)]
pub enum Error {
    #[error("i/o error")]
    Io(#[from] std::io::Error),
    #[error("the file seems to be truncated in the middle, after reading line {line}: start>{snippet}<end")]
    TruncatedFile { line: u64, snippet: String },
    #[error("the file format is not valid, only RINEX version 2/3 observation data is supported: start>{snippet}<end")]
    NotObservationRinex { snippet: String },
    #[error("the file format is not Compact RINEX, or the format version is not supported (1.0/3.0)")]
    NotCrinex,
    #[error("error when reading line {line}: start>{snippet}<end")]
    MalformedEpochLine { line: u64, snippet: String },
    #[error("line {line}: invalid format for clock offset: start>{snippet}<end")]
    MalformedClock { line: u64, snippet: String },
    #[error("line {line}: number of satellites exceeds the maximum ({max}): start>{snippet}<end", max = MAX_SAT)]
    TooManySatellites { line: u64, snippet: String },
    #[error("line {line}: number of data types exceeds the maximum ({max}): start>{snippet}<end", max = MAX_OBS_TYPES)]
    TooManyObsTypes { line: u64, snippet: String },
    #[error("line {line}: difference order exceeds the maximum ({max}): start>{snippet}<end", max = MAX_DIFF_ORDER)]
    OrderTooLarge { line: u64, snippet: String },
    #[error("line {line}: new satellite, but the data arc is not initialized: start>{snippet}<end")]
    SatelliteNotInitialized { line: u64, snippet: String },
    #[error("line {line}: the data field in the previous epoch is blank, but the arc is not initialized: start>{snippet}<end")]
    ArcNotInitialized { line: u64, snippet: String },
    #[error("line {line}: the epoch should be initialized, but is not: start>{snippet}<end")]
    EpochNotInitialized { line: u64, snippet: String },
    #[error("line {line}: duplicated satellite in one epoch: start>{snippet}<end")]
    DuplicatedSatellite { line: u64, snippet: String },
    #[error("line {line}: GNSS type is not defined in the header: start>{snippet}<end")]
    UndefinedSystem { line: u64, snippet: String },
    #[error("line {line}: null character found or the line is too long (>{max}): start>{snippet}<end", max = MAX_LINE_LEN)]
    OversizedLine { line: u64, snippet: String },
    #[error("line {line}: mismatch of the number of the data types: start>{snippet}<end")]
    ObsCountMismatch { line: u64, snippet: String },
    #[error("line {line}: abnormal data field: start>{snippet}<end")]
    AbnormalField { line: u64, snippet: String },
    #[error("line {line}: data field is blank but carries flags: start>{snippet}<end")]
    FlagOnBlankField { line: u64, snippet: String },
    #[error("line {line}: {what} becomes out of range allowed in the RINEX format")]
    OutputOverflow { line: u64, what: &'static str },
}

impl Error {
    /// True for the conditions that skip mode may absorb: a warning is
    /// issued, the current epoch is dropped and processing resumes at
    /// the next epoch boundary. Everything else aborts the conversion.
    pub fn recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedEpochLine { .. }
                | Self::OversizedLine { .. }
                | Self::ObsCountMismatch { .. }
                | Self::AbnormalField { .. }
                | Self::DuplicatedSatellite { .. }
                | Self::SatelliteNotInitialized { .. }
                | Self::ArcNotInitialized { .. }
                | Self::EpochNotInitialized { .. }
        )
    }
}

#[cfg(test)]
mod test {
    use super::Error;

    #[test]
    fn messages_carry_line_and_snippet() {
        let e = Error::MalformedEpochLine {
            line: 42,
            snippet: " 21  1  1".to_string(),
        };
        let msg = e.to_string();
        assert!(msg.contains("line 42"));
        assert!(msg.contains("start> 21  1  1<end"));
    }

    #[test]
    fn recoverable_kinds() {
        assert!(Error::DuplicatedSatellite {
            line: 1,
            snippet: String::new()
        }
        .recoverable());
        assert!(!Error::TruncatedFile {
            line: 1,
            snippet: String::new()
        }
        .recoverable());
        assert!(!Error::NotCrinex.recoverable());
    }
}
