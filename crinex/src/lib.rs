//! Compact RINEX (CRINEX) compression / decompression.
//!
//! CRINEX is the lossless compression scheme designed by Y. Hatanaka
//! for RINEX Observation files. Observation values are reduced to third
//! order finite differences along per-satellite, per-observable data arcs,
//! while the epoch descriptor and the LLI/SSI flags are reduced to
//! per-character differences against the previous epoch.
//!
//! Two streaming engines are provided: [Compressor] (RNX2CRX operation)
//! and [Decompressor] (CRX2RNX operation). Both consume a line oriented
//! input stream and produce the converted stream on any [std::io::Write],
//! one epoch at a time:
//!
//! ```no_run
//! use std::io::BufReader;
//! use std::fs::File;
//! use crinex::prelude::*;
//!
//! let input = BufReader::new(File::open("AJAC3550.21O").unwrap());
//! let mut output = Vec::<u8>::new();
//! let mut compressor = Compressor::new();
//! let summary = compressor.run(input, &mut output).unwrap();
//! assert_eq!(summary.warnings, 0);
//! ```
//!
//! Supported format revisions: RINEX 2.x ↔ CRINEX 1.0,
//! RINEX 3.x ↔ CRINEX 3.0.

pub mod clock;
pub mod compressor;
pub mod crinex;
pub mod decompressor;
pub mod errors;
pub mod field;
pub mod numdiff;
pub mod reader;
pub mod sat;
pub mod textdiff;
pub mod version;

pub use crate::{
    compressor::Compressor, crinex::Crinex, decompressor::Decompressor, errors::Error,
};

/// Package to include all basic structures
pub mod prelude {
    pub use crate::compressor::Compressor;
    pub use crate::crinex::Crinex;
    pub use crate::decompressor::Decompressor;
    pub use crate::errors::Error;
    pub use crate::reader::{BufferedReader, LineReader};
    pub use crate::version::Version;
    pub use crate::Summary;
    // pub re-export, to access the datetime definitions
    pub use hifitime::Epoch;
}

/// Maximum number of satellites observed at one epoch
pub const MAX_SAT: usize = 100;

/// Maximum number of observation types for one GNSS system
pub const MAX_OBS_TYPES: usize = 100;

/// Maximum number of characters in one logical line
pub const MAX_LINE_LEN: usize = 2048;

/// Differencing depth of the data arcs
pub const MAX_DIFF_ORDER: usize = 3;

/// Conversion report, returned by both engines on natural completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Observation epochs emitted
    pub epochs: u64,
    /// Non fatal conditions encountered (skipped epochs, tolerated
    /// overflows). A non zero count maps to the warning exit status
    /// of the historical tools.
    pub warnings: u32,
}

/// Reads a leading (possibly sign prefixed) integer, ignoring anything
/// past the last digit, like the C library `atoi`. Header counters and
/// the epoch satellite counter are immediately followed by unrelated
/// columns, so a full-field parse is not applicable.
pub(crate) fn parse_prefix_int(s: &str) -> i64 {
    let t = s.trim_start();
    let (sign, t) = match t.strip_prefix('-') {
        Some(rem) => (-1, rem),
        None => (1, t),
    };
    let mut value = 0_i64;
    for c in t.chars() {
        match c.to_digit(10) {
            Some(d) => value = value * 10 + d as i64,
            None => break,
        }
    }
    sign * value
}

/// Chops trailing blanks. The first column survives even when blank,
/// so an all-blank line reduces to a single space, never to nothing.
pub(crate) fn chop(s: &mut String) {
    while s.len() > 1 && s.ends_with(' ') {
        s.pop();
    }
}

/// True when `line` carries the given header label in columns 60+.
pub(crate) fn has_label(line: &str, label: &str) -> bool {
    line.get(60..).map_or(false, |s| s.starts_with(label))
}

#[cfg(test)]
mod test {
    use super::{chop, has_label, parse_prefix_int};

    #[test]
    fn prefix_int() {
        assert_eq!(parse_prefix_int("  4"), 4);
        assert_eq!(parse_prefix_int(" 20G07G23G26"), 20);
        assert_eq!(parse_prefix_int("     2.11"), 2);
        assert_eq!(parse_prefix_int("-12 "), -12);
        assert_eq!(parse_prefix_int("   "), 0);
        assert_eq!(parse_prefix_int("G01"), 0);
    }

    #[test]
    fn chop_keeps_first_column() {
        let mut s = String::from("abc   ");
        chop(&mut s);
        assert_eq!(s, "abc");

        let mut s = String::from("    ");
        chop(&mut s);
        assert_eq!(s, " ");

        let mut s = String::new();
        chop(&mut s);
        assert_eq!(s, "");
    }

    #[test]
    fn header_labels() {
        let line = format!("{:60}END OF HEADER", "");
        assert!(has_label(&line, "END OF HEADER"));
        assert!(!has_label("END OF HEADER", "END OF HEADER"));
    }
}
