//! Per-character differencing of header-like lines (epoch descriptors
//! and observation flag strings).
//!
//! A compressed line has the same width as the source: columns equal to
//! the previous epoch become blanks, columns that turned into a blank
//! become `&`, anything else is copied through. Both operations are
//! pure; callers own the reference line and update it only once the
//! whole epoch is accepted.

/// Appends to `out` the difference of `new` against `base`, trailing
/// blanks chopped and a newline added.
pub fn diff(base: &str, new: &str, out: &mut String) {
    let b = base.as_bytes();
    let n = new.as_bytes();
    let start = out.len();
    let shared = b.len().min(n.len());

    for i in 0..shared {
        if n[i] == b[i] {
            out.push(' ');
        } else if n[i] == b' ' {
            out.push('&');
        } else {
            out.push(n[i] as char);
        }
    }
    // columns the new line no longer covers are erased
    for i in shared..b.len() {
        out.push(if b[i] == b' ' { ' ' } else { '&' });
    }
    // columns past the end of the reference pass through
    if n.len() > b.len() {
        out.push_str(&new[shared..]);
    }

    while out.len() > start && out.ends_with(' ') {
        out.pop();
    }
    out.push('\n');
}

/// Applies a compressed line onto its reference, in place: blanks keep
/// the reference column, `&` forces a blank, anything else overwrites.
/// A delta running past the reference extends it (`&` again decoding to
/// a blank).
pub fn merge(base: &mut String, delta: &str) {
    let b = base.as_bytes();
    let d = delta.as_bytes();
    let shared = b.len().min(d.len());
    let mut merged = Vec::with_capacity(b.len().max(d.len()));

    for i in 0..shared {
        merged.push(match d[i] {
            b' ' => b[i],
            b'&' => b' ',
            c => c,
        });
    }
    if d.len() > b.len() {
        for &c in &d[shared..] {
            merged.push(if c == b'&' { b' ' } else { c });
        }
    } else {
        merged.extend_from_slice(&b[shared..]);
    }

    *base = String::from_utf8_lossy(&merged).into_owned();
}

#[cfg(test)]
mod test {
    use super::{diff, merge};

    fn diffed(base: &str, new: &str) -> String {
        let mut out = String::new();
        diff(base, new, &mut out);
        out
    }

    fn merged(base: &str, delta: &str) -> String {
        let mut s = base.to_string();
        merge(&mut s, delta);
        s
    }

    #[test]
    fn diff_masks_repeated_columns() {
        assert_eq!(
            diffed(" 21  1  1  0  0  0.0000000  0  1G01", " 21  1  1  0  0 30.0000000  0  1G01"),
            "                3\n"
        );
        // a column changing to a blank is marked with '&'
        assert_eq!(diffed("AB", "A "), " &\n");
        // identical lines reduce to an empty compressed line
        assert_eq!(diffed("G01G02", "G01G02"), "\n");
    }

    #[test]
    fn diff_against_the_arc_seed() {
        // the "&" seed makes the first epoch come out almost verbatim,
        // which is exactly the initialization line the format wants
        assert_eq!(
            diffed("&", " 21  1  1  0  0  0.0000000  0  1G01"),
            "&21  1  1  0  0  0.0000000  0  1G01\n"
        );
    }

    #[test]
    fn diff_tail_rules() {
        // new line longer: the tail passes through verbatim
        assert_eq!(diffed(" 2200", " 2200 123"), "      123\n");
        // new line shorter: leftover non-blanks are erased with '&'
        assert_eq!(diffed("G01G02", "G01"), "   &&&\n");
        assert_eq!(diffed("G01   x", "G01"), "      &\n");
    }

    #[test]
    fn merge_round_trips() {
        let epochs = [
            " 21  1  1  0  0  0.0000000  0  2G01G02",
            " 21  1  1  0  0 30.0000000  0  2G01G02",
            " 21  1  1  0  1  0.0000000  0  1G05",
            " 21  1  1  0  1 30.0000000  0  2G05R22",
        ];
        let mut base = String::from("&");
        let mut recovered = String::new();
        for epoch in epochs {
            let mut delta = String::new();
            diff(&base, epoch, &mut delta);
            let delta = delta.trim_end_matches('\n');
            merge(&mut recovered, delta);
            // satellites leaving the list decode to trailing blanks,
            // chopped downstream
            assert_eq!(recovered.trim_end(), epoch);
            base = epoch.to_string();
            recovered = epoch.to_string();
        }
    }

    #[test]
    fn merge_flag_strings() {
        assert_eq!(merged("1424", " 5"), "1524");
        assert_eq!(merged("1424", "  &9"), "14 9");
        // undersized reference: the delta tail is copied with '&'
        // decoding to blanks
        assert_eq!(merged("", "4&17"), "4 17");
        assert_eq!(merged("14", "  2&"), "142 ");
        // delta shorter than the reference keeps the tail
        assert_eq!(merged("1424", " 3"), "1324");
    }
}
