//! CRINEX header prelude definitions
use crate::version::Version;
use hifitime::Epoch;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

fn fmt_month(m: u8) -> &'static str {
    match m {
        1 => "Jan",
        2 => "Feb",
        3 => "Mar",
        4 => "Apr",
        5 => "May",
        6 => "Jun",
        7 => "Jul",
        8 => "Aug",
        9 => "Sep",
        10 => "Oct",
        11 => "Nov",
        _ => "Dec",
    }
}

/// Describes the two lines a compressor prepends to the RINEX header:
/// `CRINEX VERS   / TYPE` and `CRINEX PROG / DATE`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Crinex {
    /// Compression format revision: 1.0 compresses RINEX 2.x,
    /// 3.0 compresses RINEX 3.x
    pub version: Version,
    /// Compression program name
    pub prog: String,
    /// Date of compression
    pub date: Epoch,
}

impl Crinex {
    /// Sets compression format revision
    pub fn with_version(&self, version: Version) -> Self {
        let mut s = self.clone();
        s.version = version;
        s
    }

    /// Sets compression program name
    pub fn with_prog(&self, prog: &str) -> Self {
        let mut s = self.clone();
        s.prog = prog.to_string();
        s
    }

    /// Sets compression date
    pub fn with_date(&self, e: Epoch) -> Self {
        let mut s = self.clone();
        s.date = e;
        s
    }

    /// `dd-Mon-yy HH:MM` stamp of the compression date
    pub fn timestamp(&self) -> String {
        let (y, m, d, hh, mm, _, _) = self.date.to_gregorian_utc();
        format!(
            "{:02}-{}-{:02} {:02}:{:02}",
            d,
            fmt_month(m),
            y.rem_euclid(100),
            hh,
            mm
        )
    }

    /// Checks the `CRINEX VERS   / TYPE` line and returns the announced
    /// major revision, which must be 1 or 3.
    pub fn parse_prelude(line: &str) -> Option<u8> {
        if !crate::has_label(line, "CRINEX VERS   / TYP") {
            return None;
        }
        match line.get(..3) {
            Some("1.0") => Some(1),
            Some("3.0") => Some(3),
            _ => None,
        }
    }
}

impl Default for Crinex {
    fn default() -> Self {
        Self {
            version: Version::new(3, 0),
            prog: format!("rust-crinex-{}", env!("CARGO_PKG_VERSION")),
            date: Epoch::now().unwrap_or_default(),
        }
    }
}

impl std::fmt::Display for Crinex {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:<20}", self.version.to_string())?;
        write!(f, "{:<40}", "COMPACT RINEX FORMAT")?;
        writeln!(f, "CRINEX VERS   / TYPE")?;
        write!(f, "{:<40.40}", self.prog)?;
        write!(f, "{:<20}", self.timestamp())?;
        write!(f, "CRINEX PROG / DATE")
    }
}
