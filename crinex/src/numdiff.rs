//! Numerical differencing along a per-satellite, per-observable data arc.
//!
//! Observation values never go through floating point: a field holds up
//! to 13 significant digits, which a quantized f64 cannot carry exactly.
//! Each value is split into an (upper, lower) pair of signed integers,
//! `value = upper * 10^5 + lower` in thousandths units, and differencing
//! is carried out on both halves in parallel. The halves share a sign
//! (or one of them is zero) at rest; intermediate sums may disagree and
//! are reconciled before rendering.
use crate::MAX_DIFF_ORDER;
use std::fmt::Write;

/// State of one data arc: the difference pyramid of the most recent
/// value, the number of accumulated differences (`order`), and the
/// depth this arc targets (`arc_order`, announced by the `N&`
/// initialization token). `order == -1` marks a blank field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDiff {
    upper: [i64; MAX_DIFF_ORDER + 1],
    lower: [i64; MAX_DIFF_ORDER + 1],
    pub order: i8,
    pub arc_order: i8,
}

impl Default for FieldDiff {
    fn default() -> Self {
        Self::blank()
    }
}

impl FieldDiff {
    const MODULUS: i64 = 100_000;

    /// A slot holding no live arc
    pub fn blank() -> Self {
        Self {
            upper: [0; MAX_DIFF_ORDER + 1],
            lower: [0; MAX_DIFF_ORDER + 1],
            order: -1,
            arc_order: -1,
        }
    }

    /// Loads a freshly parsed value at difference level 0
    pub fn load(&mut self, upper: i64, lower: i64) {
        self.upper[0] = upper;
        self.lower[0] = lower;
        self.order = 0;
    }

    /// Compression: differences this value against the previous epoch,
    /// deepening the arc by one level up to the target depth.
    pub fn take_diff(&mut self, prev: &Self) {
        self.order = prev.order;
        if self.order < MAX_DIFF_ORDER as i8 {
            self.order += 1;
        }
        for k in 0..self.order as usize {
            self.upper[k + 1] = self.upper[k] - prev.upper[k];
            self.lower[k + 1] = self.lower[k] - prev.lower[k];
        }
    }

    /// Compression: restarts the arc at this value, making level 0 the
    /// emitted difference.
    pub fn restart(&mut self) {
        self.order = 0;
    }

    /// Decompression: begins a new arc from an `N&` token
    pub fn init_arc(&mut self, arc_order: i8, upper: i64, lower: i64) {
        self.order = -1;
        self.arc_order = arc_order;
        self.upper[0] = upper;
        self.lower[0] = lower;
    }

    /// Decompression: continues the previous epoch's arc, with the
    /// received delta at level 0.
    pub fn continue_arc(&mut self, prev: &Self, upper: i64, lower: i64) {
        self.order = prev.order;
        self.arc_order = prev.arc_order;
        self.upper[0] = upper;
        self.lower[0] = lower;
    }

    /// Decompression: cumulates the received delta on top of the
    /// previous epoch's pyramid. While the arc is still deepening the
    /// sums borrow from one level lower, emulating the not yet
    /// saturated encoder.
    pub fn accumulate(&mut self, prev: &Self) {
        if self.order < self.arc_order {
            self.order += 1;
            for k in 0..self.order as usize {
                self.upper[k + 1] = self.upper[k] + prev.upper[k];
                self.lower[k + 1] = self.lower[k] + prev.lower[k];
                self.carry(k + 1);
            }
        } else {
            for k in 0..self.order as usize {
                self.upper[k + 1] = self.upper[k] + prev.upper[k + 1];
                self.lower[k + 1] = self.lower[k] + prev.lower[k + 1];
                self.carry(k + 1);
            }
        }
    }

    fn carry(&mut self, level: usize) {
        self.upper[level] += self.lower[level] / Self::MODULUS;
        self.lower[level] %= Self::MODULUS;
    }

    /// Value at the top of the pyramid: the emitted difference when
    /// compressing, the reconstructed value when decompressing.
    pub fn top(&self) -> (i64, i64) {
        let i = self.order.max(0) as usize;
        (self.upper[i], self.lower[i])
    }
}

/// Reconciles a split pair so both halves share a sign, then appends
/// the compact rendering: the lower half alone when the upper is zero,
/// otherwise the upper half followed by the zero-padded lower half.
pub fn write_delta(upper: i64, lower: i64, modulus: i64, digits: usize, out: &mut String) {
    let mut u = upper + lower / modulus;
    let mut l = lower % modulus;
    if u < 0 && l > 0 {
        u += 1;
        l -= modulus;
    } else if u > 0 && l < 0 {
        u -= 1;
        l += modulus;
    }
    if u == 0 {
        let _ = write!(out, "{}", l);
    } else {
        let _ = write!(out, "{}{:0w$}", u, l.abs(), w = digits);
    }
}

/// Splits a rendered integer back into its (upper, lower) halves,
/// `digits` being the width of the lower half.
pub fn split_value(s: &str, digits: usize) -> Option<(i64, i64)> {
    let unsigned = s.strip_prefix('-').unwrap_or(s);
    if unsigned.len() <= digits {
        Some((0, s.parse().ok()?))
    } else {
        let (hi, lo) = s.split_at(s.len() - digits);
        let upper: i64 = hi.parse().ok()?;
        let lower: i64 = lo.parse().ok()?;
        Some((upper, if upper < 0 { -lower } else { lower }))
    }
}

#[cfg(test)]
mod test {
    use super::{split_value, write_delta, FieldDiff};

    fn pair(value: i64) -> (i64, i64) {
        // value in thousandths units
        let u = value / 100_000;
        let l = value - u * 100_000;
        (u, l)
    }

    fn rendered(upper: i64, lower: i64) -> String {
        let mut s = String::new();
        write_delta(upper, lower, 100_000, 5, &mut s);
        s
    }

    #[test]
    fn compression_sequence() {
        // same carrier phase sequence the historical tools agree on
        let values = [
            126_298_057_858_i64,
            126_282_454_570,
            126_267_372_371,
            126_252_810_509,
            127_814_188_268,
            127_800_656_941,
            127_787_641_437,
            127_775_141_621,
        ];
        let expected = [
            "-15603288",
            "521089",
            "-752",
            "1575419284",
            "-3150848707",
            "1575424909",
            "-135",
        ];

        let mut prev = FieldDiff::blank();
        let (u, l) = pair(values[0]);
        prev.load(u, l);
        prev.restart();

        for (value, expected) in values[1..].iter().zip(expected.iter()) {
            let mut current = FieldDiff::blank();
            let (u, l) = pair(*value);
            current.load(u, l);
            current.take_diff(&prev);
            let (du, dl) = current.top();
            assert_eq!(&rendered(du, dl), expected);
            prev = current;
        }
    }

    #[test]
    fn decompression_sequence() {
        let deltas = [
            "-15603288",
            "521089",
            "-752",
            "1575419284",
            "-3150848707",
            "1575424909",
            "-135",
        ];
        let recovered = [
            126_282_454_570_i64,
            126_267_372_371,
            126_252_810_509,
            127_814_188_268,
            127_800_656_941,
            127_787_641_437,
            127_775_141_621,
        ];

        let mut prev = FieldDiff::blank();
        let (u, l) = pair(126_298_057_858);
        prev.init_arc(3, u, l);
        prev.accumulate(&FieldDiff::blank());

        for (delta, value) in deltas.iter().zip(recovered.iter()) {
            let mut current = FieldDiff::blank();
            let (u, l) = split_value(delta, 5).unwrap();
            current.continue_arc(&prev, u, l);
            current.accumulate(&prev);
            let (ru, rl) = current.top();
            assert_eq!(ru * 100_000 + rl, *value);
            prev = current;
        }
    }

    #[test]
    fn order_saturates() {
        let mut prev = FieldDiff::blank();
        prev.load(0, 1000);
        prev.restart();
        for step in 1..6 {
            let mut current = FieldDiff::blank();
            current.load(0, 1000 + step);
            current.take_diff(&prev);
            assert_eq!(current.order as usize, (step as usize).min(3));
            prev = current;
        }
    }

    #[test]
    fn delta_rendering() {
        assert_eq!(rendered(0, 0), "0");
        assert_eq!(rendered(0, -42), "-42");
        assert_eq!(rendered(234_567, 89_123), "23456789123");
        assert_eq!(rendered(-1, -2), "-100002");
        // transiently disagreeing halves are reconciled first
        assert_eq!(rendered(1, -1), "99999");
        assert_eq!(rendered(-1, 1), "-99999");
        // lower-half overflow is absorbed into the upper half
        assert_eq!(rendered(1, 200_001), "300001");
    }

    #[test]
    fn split_round_trip() {
        assert_eq!(split_value("23456789123", 5), Some((234_567, 89_123)));
        assert_eq!(split_value("-752", 5), Some((0, -752)));
        assert_eq!(split_value("-3150848707", 5), Some((-31508, -48_707)));
        assert_eq!(split_value("99999", 5), Some((0, 99_999)));
        assert_eq!(split_value("123456789", 8), Some((1, 23_456_789)));
        assert_eq!(split_value("x", 5), None);
    }
}
