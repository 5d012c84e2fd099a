//! Satellite table bookkeeping: slot mapping across epochs and the
//! per-system observation-type counts.
use crate::{errors::Error, parse_prefix_int, MAX_OBS_TYPES};
use std::collections::HashMap;

/// Satellite lists are packed 3-character identifiers, taken verbatim
/// from the epoch lines: treating them as opaque bytes is what keeps
/// round trips byte exact.
pub fn slot_table(new: &str, old: &str) -> Vec<Option<usize>> {
    let nsat = new.len() / 3;
    let nsat_old = old.len() / 3;
    let mut table = Vec::with_capacity(nsat);
    for i in 0..nsat {
        let id = &new[3 * i..3 * i + 3];
        table.push((0..nsat_old).find(|j| &old[3 * j..3 * j + 3] == id));
    }
    table
}

/// First satellite appearing twice in one epoch, if any
pub fn find_duplicate(list: &str) -> Option<usize> {
    let nsat = list.len() / 3;
    for i in 0..nsat {
        let id = &list[3 * i..3 * i + 3];
        for j in i + 1..nsat {
            if &list[3 * j..3 * j + 3] == id {
                return Some(i);
            }
        }
    }
    None
}

/// Observation-type counts declared by the header: one global count
/// for RINEX 2, one per GNSS system letter for RINEX 3.
#[derive(Debug, Clone, Default)]
pub struct ObsTypes {
    pub global: usize,
    per_system: HashMap<u8, usize>,
}

impl ObsTypes {
    /// Count for the system identified by the first letter of a
    /// satellite id. None when the header never declared it.
    pub fn for_system(&self, letter: u8) -> Option<usize> {
        self.per_system.get(&letter).copied()
    }

    /// Inspects one header (or header-update event) line, maintaining
    /// the counts. Continuation lines leave the counts alone.
    pub fn scan(&mut self, line: &str, line_number: u64) -> Result<(), Error> {
        if crate::has_label(line, "# / TYPES OF OBSERV") {
            if line.as_bytes().get(5) != Some(&b' ') {
                self.global = parse_prefix_int(line).max(0) as usize;
                if self.global > MAX_OBS_TYPES {
                    return Err(Error::TooManyObsTypes {
                        line: line_number,
                        snippet: line.to_string(),
                    });
                }
            }
        } else if crate::has_label(line, "SYS / # / OBS TYPES") {
            let letter = line.as_bytes()[0];
            if letter != b' ' {
                let count = parse_prefix_int(&line[3..]).max(0) as usize;
                if count > MAX_OBS_TYPES {
                    return Err(Error::TooManyObsTypes {
                        line: line_number,
                        snippet: line.to_string(),
                    });
                }
                self.per_system.insert(letter, count);
            }
        }
        Ok(())
    }

    /// Field count of every record in the epoch, in satellite order.
    /// RINEX 3 resolves each satellite's system letter, which must be
    /// declared.
    pub fn record_types(
        &self,
        rinex_major: u8,
        sat_list: &str,
        line_number: u64,
    ) -> Result<Vec<usize>, Error> {
        let nsat = sat_list.len() / 3;
        if rinex_major == 2 {
            return Ok(vec![self.global; nsat]);
        }
        let mut counts = Vec::with_capacity(nsat);
        for i in 0..nsat {
            let letter = sat_list.as_bytes()[3 * i];
            match self.for_system(letter) {
                Some(n) => counts.push(n),
                None => {
                    return Err(Error::UndefinedSystem {
                        line: line_number,
                        snippet: sat_list.to_string(),
                    })
                },
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod test {
    use super::{find_duplicate, slot_table, ObsTypes};

    #[test]
    fn slot_mapping() {
        let old = "G01G05R22";
        let new = "G05G07R22";
        assert_eq!(slot_table(new, old), vec![Some(1), None, Some(2)]);
        assert_eq!(slot_table("", old), Vec::<Option<usize>>::new());
        assert_eq!(slot_table(new, ""), vec![None, None, None]);
    }

    #[test]
    fn duplicates() {
        assert_eq!(find_duplicate("G01G05G01"), Some(0));
        assert_eq!(find_duplicate("G01G05R01"), None);
    }

    #[test]
    fn header_scanning() {
        let mut types = ObsTypes::default();
        let line = format!("{:<60}# / TYPES OF OBSERV", "     4    C1    L1    P2    S1");
        types.scan(&line, 3).unwrap();
        assert_eq!(types.global, 4);

        // continuation lines carry blanks in the count columns
        let line = format!("{:<60}# / TYPES OF OBSERV", "          S2");
        types.scan(&line, 4).unwrap();
        assert_eq!(types.global, 4);

        let line = format!("{:<60}SYS / # / OBS TYPES", "G    5 C1C L1C D1C S1C C2W");
        types.scan(&line, 5).unwrap();
        assert_eq!(types.for_system(b'G'), Some(5));
        assert_eq!(types.for_system(b'R'), None);

        let line = format!("{:<60}# / TYPES OF OBSERV", "   101");
        assert!(types.scan(&line, 6).is_err());
    }

    #[test]
    fn per_record_counts() {
        let mut types = ObsTypes::default();
        types
            .scan(
                &format!("{:<60}SYS / # / OBS TYPES", "G    4 C1C L1C D1C S1C"),
                1,
            )
            .unwrap();
        types.global = 6;

        assert_eq!(types.record_types(2, "G01R22", 10).unwrap(), vec![6, 6]);
        assert_eq!(types.record_types(3, "G01G09", 10).unwrap(), vec![4, 4]);
        assert!(types.record_types(3, "G01R22", 10).is_err());
    }
}
