//! Receiver clock-offset codec. The clock runs through the same
//! third-order differencing as the observation fields, but with an
//! eight-digit lower half and a version-dependent decimal shift:
//! RINEX 2 carries one digit ahead of the decimal point, RINEX 3 four.
use crate::MAX_DIFF_ORDER;

/// Difference pyramid of the clock arc. The arc counters live in the
/// owning context, since the clock has a single slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockDiff {
    pub upper: [i64; MAX_DIFF_ORDER + 1],
    pub lower: [i64; MAX_DIFF_ORDER + 1],
}

impl ClockDiff {
    const MODULUS: i64 = 100_000_000;

    /// Compression: differences level 0 against the previous epoch,
    /// `order` levels deep.
    pub fn take_diff(&mut self, prev: &Self, order: usize) {
        for k in 0..order {
            self.upper[k + 1] = self.upper[k] - prev.upper[k];
            self.lower[k + 1] = self.lower[k] - prev.lower[k];
        }
    }

    /// Decompression: cumulates the received delta on top of the
    /// previous epoch's pyramid, borrowing one level lower while the
    /// arc is still deepening.
    pub fn accumulate(&mut self, prev: &Self, order: usize, deepening: bool) {
        for k in 0..order {
            let (pu, pl) = if deepening {
                (prev.upper[k], prev.lower[k])
            } else {
                (prev.upper[k + 1], prev.lower[k + 1])
            };
            self.upper[k + 1] = self.upper[k] + pu;
            self.lower[k + 1] = self.lower[k] + pl;
            self.upper[k + 1] += self.lower[k + 1] / Self::MODULUS;
            self.lower[k + 1] %= Self::MODULUS;
        }
    }
}

/// Parses the clock-offset columns of a RINEX epoch line. The decimal
/// point sits at the third column; `shift` digits are moved across it
/// so the lower half spans exactly eight digits. None when the layout
/// does not match.
pub fn read_clock(field: &str, shift: usize) -> Option<(i64, i64)> {
    let b = field.as_bytes();
    if b.len() < 3 || b[2] != b'.' {
        return None;
    }
    let frac = &field[3..];
    if frac.len() < shift + 1 {
        return None;
    }
    let mut head = String::with_capacity(2 + shift);
    head.push_str(&field[..2]);
    head.push_str(&frac[..shift]);
    let upper: i64 = head.trim().parse().ok()?;
    let mut lower: i64 = frac[shift..].trim_end().parse().ok()?;
    if b[0] == b'-' || b[1] == b'-' {
        lower = -lower;
    }
    Some((upper, lower))
}

/// Re-emits a recovered clock offset, Fortran style: a zero integer
/// part leaves a blank ahead of the decimal point. Returns false when
/// the value carries more digits than the layout allows (two ahead of
/// the `shift` fractional columns).
pub fn print_clock(upper: i64, lower: i64, shift: usize, out: &mut String) -> bool {
    let (mut u, mut l) = (upper, lower);
    if u < 0 && l > 0 {
        u += 1;
        l -= 100_000_000;
    } else if u > 0 && l < 0 {
        u -= 1;
        l += 100_000_000;
    }

    // one throwaway digit guarantees the sign shows up even for a
    // zero upper half
    let sgn: i64 = if l < 0 { -1 } else { 1 };
    let probe = u * 10 + sgn;
    let digits = format!("{:0w$}", probe.abs(), w = shift + 1);
    let head = if probe < 0 {
        format!("-{}", digits)
    } else {
        digits
    };
    let n = head.len() - 1; // throwaway digit dropped
    let head = &head.as_bytes()[..n];

    let mut fits = true;
    let mut b = Vec::with_capacity(shift + 11);
    b.extend_from_slice(b"  .");
    b.extend_from_slice(&head[n - shift..]);
    if n > shift {
        b[1] = head[n - shift - 1];
        if n > shift + 1 {
            b[0] = head[n - shift - 2];
            if n > shift + 2 {
                fits = false;
            }
        }
    }
    out.push_str(&String::from_utf8_lossy(&b));
    out.push_str(&format!("{:08}", l.abs()));
    out.push('\n');
    fits
}

#[cfg(test)]
mod test {
    use super::{print_clock, read_clock, ClockDiff};

    fn printed(upper: i64, lower: i64, shift: usize) -> (String, bool) {
        let mut out = String::new();
        let fits = print_clock(upper, lower, shift, &mut out);
        (out, fits)
    }

    #[test]
    fn parsing_rinex2() {
        // one digit ahead of the point, nine behind
        assert_eq!(read_clock("  .123456789", 1), Some((1, 23_456_789)));
        assert_eq!(read_clock(" 0.123456789", 1), Some((1, 23_456_789)));
        assert_eq!(read_clock(" -.123456789", 1), Some((-1, -23_456_789)));
        assert_eq!(read_clock("-0.123456789", 1), Some((-1, -23_456_789)));
        assert_eq!(read_clock("  .000000001", 1), Some((0, 1)));
        assert_eq!(read_clock("bad", 1), None);
        assert_eq!(read_clock(" 0 123456789", 1), None);
    }

    #[test]
    fn parsing_rinex3() {
        // four digits ahead of the point, twelve behind
        assert_eq!(
            read_clock("  .123456789012", 4),
            Some((1_234, 56_789_012))
        );
        assert_eq!(
            read_clock(" -.123456789012", 4),
            Some((-1_234, -56_789_012))
        );
    }

    #[test]
    fn printing_rinex2() {
        assert_eq!(printed(1, 23_456_789, 1), ("  .123456789\n".to_string(), true));
        assert_eq!(printed(0, 1, 1), ("  .000000001\n".to_string(), true));
        assert_eq!(printed(-1, -23_456_789, 1), (" -.123456789\n".to_string(), true));
        // nine digit delta: one digit patched ahead of the point
        assert_eq!(printed(21, 23_456_789, 1), (" 2.123456789\n".to_string(), true));
        // ten digit delta: two digits patched
        assert_eq!(printed(321, 23_456_789, 1), ("32.123456789\n".to_string(), true));
        // wider does not fit the layout
        let (_, fits) = printed(4_321, 23_456_789, 1);
        assert!(!fits);
    }

    #[test]
    fn printing_rinex3() {
        assert_eq!(
            printed(1_234, 56_789_012, 4),
            ("  .123456789012\n".to_string(), true)
        );
        assert_eq!(
            printed(-1_234, -56_789_012, 4),
            (" -.123456789012\n".to_string(), true)
        );
        assert_eq!(
            printed(21_234, 56_789_012, 4),
            (" 2.123456789012\n".to_string(), true)
        );
    }

    #[test]
    fn arc_round_trip() {
        let offsets = [(1_i64, 23_456_789_i64), (1, 23_456_790), (1, 23_456_792)];

        // compression
        let mut deltas = Vec::new();
        let mut prev = ClockDiff::default();
        for (epoch, (u, l)) in offsets.iter().enumerate() {
            let mut clk = ClockDiff::default();
            clk.upper[0] = *u;
            clk.lower[0] = *l;
            let order = epoch.min(3);
            clk.take_diff(&prev, order);
            deltas.push((clk.upper[order], clk.lower[order], order));
            prev = clk;
        }
        assert_eq!(deltas[0], (1, 23_456_789, 0));
        assert_eq!(deltas[1], (0, 1, 1));
        assert_eq!(deltas[2], (0, 1, 2));

        // decompression
        let mut prev = ClockDiff::default();
        let mut order = -1_i64;
        for (i, (du, dl, _)) in deltas.iter().enumerate() {
            let mut clk = ClockDiff::default();
            clk.upper[0] = *du;
            clk.lower[0] = *dl;
            let deepening = order < 3;
            if deepening {
                order += 1;
            }
            clk.accumulate(&prev, order as usize, deepening);
            assert_eq!(
                (clk.upper[order as usize], clk.lower[order as usize]),
                (offsets[i].0, offsets[i].1)
            );
            prev = clk;
        }
    }
}
