//! RINEX → CRINEX compression engine (the RNX2CRX operation).
use crate::{
    chop,
    clock::{self, ClockDiff},
    crinex::Crinex,
    errors::Error,
    field, has_label,
    numdiff::{self, FieldDiff},
    parse_prefix_int,
    reader::LineReader,
    sat::{self, ObsTypes},
    textdiff,
    version::Version,
    Summary, MAX_DIFF_ORDER, MAX_LINE_LEN, MAX_SAT,
};

use log::warn;
use std::fmt::Write as _;
use std::io::{BufRead, Write};

/// Streaming compression context. Owns every piece of inter-epoch
/// state: the previous epoch line, the previous satellite list and
/// flags, one difference arc per (satellite, observable) slot, and the
/// clock arc. One instance performs one conversion.
///
/// Output is buffered per epoch: an epoch either reaches the writer
/// complete or (in skip mode) not at all.
pub struct Compressor {
    /// Warn and skip malformed epochs instead of aborting
    skip: bool,
    /// Restart every data arc each N epochs, trading file size for
    /// damage recovery in transmission
    reinit_every: Option<u64>,
    /// Prelude synthesized ahead of the RINEX header
    crinex: Crinex,
    rinex_major: u8,
    types: ObsTypes,
    /// Previous epoch line; the "&" seed makes the first difference
    /// come out as the arc initialization line
    prev_line: String,
    /// Previous epoch satellite list, packed 3-character ids
    prev_sats: String,
    prev_flags: Vec<String>,
    prev_data: Vec<Vec<FieldDiff>>,
    flags: Vec<String>,
    data: Vec<Vec<FieldDiff>>,
    rec_types: Vec<usize>,
    clk: ClockDiff,
    clk_prev: ClockDiff,
    /// Clock arc depth, -1 while no clock arc is live
    clk_order: i8,
    epoch_count: u64,
    summary: Summary,
    buf: String,
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor {
    pub fn new() -> Self {
        Self {
            skip: false,
            reinit_every: None,
            crinex: Crinex::default(),
            rinex_major: 0,
            types: ObsTypes::default(),
            prev_line: String::from("&"),
            prev_sats: String::new(),
            prev_flags: Vec::new(),
            prev_data: Vec::new(),
            flags: Vec::new(),
            data: Vec::new(),
            rec_types: Vec::new(),
            clk: ClockDiff::default(),
            clk_prev: ClockDiff::default(),
            clk_order: -1,
            epoch_count: 0,
            summary: Summary::default(),
            buf: String::with_capacity(1024),
        }
    }

    /// Warn and skip malformed epochs (default: abort on the first one)
    pub fn skip_strange_epochs(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Restart all data arcs every `n` epochs
    pub fn reinitialize_every(mut self, n: u64) -> Self {
        self.reinit_every = if n > 0 { Some(n) } else { None };
        self
    }

    /// Program name and compression date announced by the synthesized
    /// `CRINEX PROG / DATE` line
    pub fn with_crinex(mut self, crinex: Crinex) -> Self {
        self.crinex = crinex;
        self
    }

    fn v2(&self) -> bool {
        self.rinex_major == 2
    }

    /// Runs the conversion to completion. Returns the [Summary] on
    /// natural end of input, the first fatal condition otherwise.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        input: R,
        mut output: W,
    ) -> Result<Summary, Error> {
        let mut reader = LineReader::new(input);
        self.header(&mut reader, &mut output)?;
        while let Some(line) = self.next_epoch_line(&mut reader)? {
            self.process_epoch(&mut reader, &mut output, line)?;
        }
        output.flush()?;
        Ok(self.summary)
    }

    /// Passes the header through, prefixed by the CRINEX prelude, while
    /// collecting the observation-type counts.
    fn header<R: BufRead, W: Write>(
        &mut self,
        reader: &mut LineReader<R>,
        output: &mut W,
    ) -> Result<(), Error> {
        let mut line = reader.require_line()?;
        chop(&mut line);
        let major = parse_prefix_int(&line);
        if !has_label(&line, "RINEX VERSION / TYPE")
            || line.as_bytes().get(20) != Some(&b'O')
            || !(major == 2 || major == 3)
        {
            return Err(Error::NotObservationRinex { snippet: line });
        }
        self.rinex_major = major as u8;
        self.crinex.version = Version::new(if self.v2() { 1 } else { 3 }, 0);
        writeln!(output, "{}", self.crinex)?;
        writeln!(output, "{}", line)?;
        loop {
            let mut line = reader.require_line()?;
            chop(&mut line);
            writeln!(output, "{}", line)?;
            self.types.scan(&line, reader.line_number())?;
            if has_label(&line, "END OF HEADER") {
                break;
            }
        }
        Ok(())
    }

    /// Finds the next epoch line. None on end of input; in skip mode a
    /// malformed candidate starts a scan for the next plausible epoch
    /// line, resetting every arc.
    fn next_epoch_line<R: BufRead>(
        &mut self,
        reader: &mut LineReader<R>,
    ) -> Result<Option<String>, Error> {
        let raw = match reader.next_line()? {
            None => return Ok(None),
            Some(raw) => raw,
        };
        if raw.text.starts_with('\u{1a}') {
            return Ok(None); // DOS end of file
        }
        if !raw.terminated {
            if raw.text.bytes().all(|b| b == 0) {
                warn!("null characters are detected at the end of file, neglected");
                self.summary.warnings += 1;
                return Ok(None);
            }
            return self.recover(
                reader,
                Error::OversizedLine {
                    line: reader.line_number(),
                    snippet: raw.text,
                },
            );
        }
        if raw.text.len() >= MAX_LINE_LEN || raw.text.contains('\0') {
            return self.recover(
                reader,
                Error::OversizedLine {
                    line: reader.line_number(),
                    snippet: raw.text,
                },
            );
        }
        let mut line = raw.text;
        if self.v2() {
            chop(&mut line);
            let b = line.as_bytes();
            let ok = line.len() >= 29
                && b[0] == b' '
                && b[27] == b' '
                && b[28].is_ascii_digit()
                && (line.len() == 29 || b[29] == b' ');
            if !ok {
                let err = Error::MalformedEpochLine {
                    line: reader.line_number(),
                    snippet: line,
                };
                return self.recover(reader, err);
            }
        } else {
            if !line.starts_with('>') {
                let err = Error::MalformedEpochLine {
                    line: reader.line_number(),
                    snippet: line,
                };
                return self.recover(reader, err);
            }
            while line.len() < 41 {
                line.push(' ');
            }
        }
        Ok(Some(line))
    }

    /// Skip-mode recovery: scans forward for a line shaped like an
    /// epoch start, then resets every arc so the stream re-initializes.
    fn recover<R: BufRead>(
        &mut self,
        reader: &mut LineReader<R>,
        err: Error,
    ) -> Result<Option<String>, Error> {
        if !self.skip {
            return Err(err);
        }
        warn!("{}; skipping to the next epoch", err);
        self.summary.warnings += 1;
        self.buf.clear();
        let mut line = loop {
            let mut candidate = match reader.require_line() {
                Ok(l) => l,
                Err(e @ Error::OversizedLine { .. }) => {
                    warn!("{}", e);
                    self.summary.warnings += 1;
                    continue;
                },
                Err(e) => return Err(e),
            };
            chop(&mut candidate);
            if self.epoch_candidate(&candidate) {
                break candidate;
            }
        };
        if !self.v2() {
            while line.len() < 41 {
                line.push(' ');
            }
        }
        self.initialize_all(0);
        Ok(Some(line))
    }

    /// Shape of a line that can restart processing after a recovery
    fn epoch_candidate(&self, line: &str) -> bool {
        let b = line.as_bytes();
        if self.v2() {
            line.len() >= 30
                && b[0] == b' '
                && b[3] == b' '
                && b[6] == b' '
                && b[9] == b' '
                && b[12] == b' '
                && b[15] == b' '
                && b[26] == b' '
                && b[27] == b' '
                && b[28].is_ascii_digit()
                && b[29] == b' '
                && (line.len() <= 68 || (line.len() > 70 && b[70] == b'.'))
        } else {
            line.starts_with('>')
        }
    }

    fn initialize_all(&mut self, count: u64) {
        self.prev_line.clear();
        self.prev_line.push('&');
        self.clk_order = -1;
        self.prev_sats.clear();
        self.epoch_count = count;
    }

    /// Absorbs a recoverable per-epoch failure in skip mode, dropping
    /// the half-built epoch; anything else propagates.
    fn absorb(&mut self, err: Error) -> Result<(), Error> {
        if self.skip && err.recoverable() {
            warn!("{}; skipping this epoch", err);
            self.summary.warnings += 1;
            self.buf.clear();
            Ok(())
        } else {
            Err(err)
        }
    }

    fn process_epoch<R: BufRead, W: Write>(
        &mut self,
        reader: &mut LineReader<R>,
        output: &mut W,
        mut line: String,
    ) -> Result<(), Error> {
        let (event_col, nsat_col, sat_col, clock_col, shift) = if self.v2() {
            (28, 29, 32, 68, 1)
        } else {
            (31, 32, 41, 41, 4)
        };

        // event records pass through and restart everything
        let flag = line
            .as_bytes()
            .get(event_col)
            .map_or(0, |b| (*b as char).to_digit(10).unwrap_or(0));
        if flag > 1 {
            self.put_event_data(reader, output, &line)?;
            self.initialize_all(0);
            return Ok(());
        }

        // clock offset, when the line extends that far
        if line.len() > clock_col {
            let (u, l) = match clock::read_clock(&line[clock_col..], shift) {
                Some(pair) => pair,
                None => {
                    return Err(Error::MalformedClock {
                        line: reader.line_number(),
                        snippet: line[clock_col..].to_string(),
                    })
                },
            };
            if self.clk_order < MAX_DIFF_ORDER as i8 {
                self.clk_order += 1;
            }
            self.clk.upper[0] = u;
            self.clk.lower[0] = l;
            line.truncate(clock_col);
        } else {
            self.clk_order = -1;
        }

        let nsat = parse_prefix_int(&line[nsat_col..]);
        if nsat > MAX_SAT as i64 {
            return Err(Error::TooManySatellites {
                line: reader.line_number(),
                snippet: line,
            });
        }
        let nsat = nsat.max(0) as usize;
        if self.v2() && nsat > 12 {
            if let Err(e) = self.read_more_sat(reader, &mut line, nsat) {
                return self.absorb(e);
            }
        }

        if let Some(every) = self.reinit_every {
            self.epoch_count += 1;
            if self.epoch_count > every {
                self.initialize_all(1);
            }
        }

        self.ensure_capacity(nsat);
        for slot in 0..nsat {
            if let Err(e) = self.read_record(reader, slot, &mut line, sat_col) {
                return self.absorb(e);
            }
        }

        // terminate the satellite list
        let list_end = sat_col + 3 * nsat;
        line.truncate(list_end);
        while line.len() < list_end {
            line.push(' ');
        }
        let sat_list = line[sat_col..].to_string();
        if sat::find_duplicate(&sat_list).is_some() {
            let err = Error::DuplicatedSatellite {
                line: reader.line_number(),
                snippet: line,
            };
            return self.absorb(err);
        }
        let table = sat::slot_table(&sat_list, &self.prev_sats);

        // epoch line difference, then the clock, then the records
        textdiff::diff(&self.prev_line, &line, &mut self.buf);
        if self.clk_order >= 0 {
            let order = self.clk_order as usize;
            if order > 0 {
                let prev = self.clk_prev;
                self.clk.take_diff(&prev, order);
            } else {
                let _ = write!(self.buf, "{}&", MAX_DIFF_ORDER);
            }
            numdiff::write_delta(
                self.clk.upper[order],
                self.clk.lower[order],
                100_000_000,
                8,
                &mut self.buf,
            );
            self.buf.push('\n');
        } else {
            self.buf.push('\n');
        }
        self.emit_records(&table, nsat);

        output.write_all(self.buf.as_bytes())?;
        self.buf.clear();

        // this epoch becomes the reference for the next one
        self.prev_line = line;
        self.prev_sats = sat_list;
        self.clk_prev = self.clk;
        for i in 0..nsat {
            self.prev_flags[i].clone_from(&self.flags[i]);
            self.prev_data[i].clone_from(&self.data[i]);
        }
        self.summary.epochs += 1;
        Ok(())
    }

    /// Event records (flag > 1) pass through uncompressed, with their
    /// follow-on lines; header-update events refresh the type counts.
    fn put_event_data<R: BufRead, W: Write>(
        &mut self,
        reader: &mut LineReader<R>,
        output: &mut W,
        line: &str,
    ) -> Result<(), Error> {
        if self.v2() {
            if line.as_bytes().get(26) == Some(&b'.') {
                return Err(Error::MalformedEpochLine {
                    line: reader.line_number(),
                    snippet: line.to_string(),
                });
            }
            writeln!(output, "&{}", &line[1..])?;
            if line.len() > 29 {
                let count = parse_prefix_int(&line[29..]).max(0);
                for _ in 0..count {
                    let mut l = reader.require_line()?;
                    chop(&mut l);
                    writeln!(output, "{}", l)?;
                    self.types.scan(&l, reader.line_number())?;
                }
            }
        } else {
            if line.len() < 35 || line.as_bytes()[29] == b'.' {
                return Err(Error::MalformedEpochLine {
                    line: reader.line_number(),
                    snippet: line.to_string(),
                });
            }
            let mut head = line.to_string();
            chop(&mut head);
            writeln!(output, "{}", head)?;
            let count = parse_prefix_int(&line[32..]).max(0);
            for _ in 0..count {
                let mut l = reader.require_line()?;
                chop(&mut l);
                writeln!(output, "{}", l)?;
                self.types.scan(&l, reader.line_number())?;
            }
        }
        Ok(())
    }

    /// RINEX 2 satellite-list continuation lines (more than 12
    /// satellites in one epoch)
    fn read_more_sat<R: BufRead>(
        &mut self,
        reader: &mut LineReader<R>,
        line: &mut String,
        nsat: usize,
    ) -> Result<(), Error> {
        let mut n = nsat as i64;
        let mut offset = 68;
        loop {
            let mut cont = reader.require_line()?;
            chop(&mut cont);
            while line.len() < offset {
                line.push(' ');
            }
            if cont.as_bytes().get(2) == Some(&b' ') {
                line.push_str(cont.get(32..).unwrap_or(""));
            } else {
                // files predating the continuation-line clarification
                // carry the list from the first column
                line.push_str(&cont);
            }
            n -= 12;
            offset += 36;
            if n <= 12 {
                break;
            }
        }
        Ok(())
    }

    /// Reads one satellite's observation lines, loading the fields and
    /// flags. RINEX 2 wraps five fields per line; RINEX 3 prefixes the
    /// record with the satellite id, which joins the epoch descriptor.
    fn read_record<R: BufRead>(
        &mut self,
        reader: &mut LineReader<R>,
        slot: usize,
        epoch_line: &mut String,
        sat_col: usize,
    ) -> Result<(), Error> {
        let mut line = reader.require_line()?;
        chop(&mut line);
        let (per_chunk, ntype, first) = if self.v2() {
            (5, self.types.global, 0)
        } else {
            while line.len() < 3 {
                line.push(' ');
            }
            let letter = line.as_bytes()[0];
            let ntype = self.types.for_system(letter).ok_or(Error::UndefinedSystem {
                line: reader.line_number(),
                snippet: line.clone(),
            })?;
            let pos = sat_col + 3 * slot;
            epoch_line.truncate(pos);
            while epoch_line.len() < pos {
                epoch_line.push(' ');
            }
            let id = line[..3].to_string();
            epoch_line.push_str(&id);
            (ntype, ntype, 3)
        };

        self.rec_types[slot] = ntype;
        self.flags[slot].clear();
        self.data[slot].clear();
        self.data[slot].resize(ntype, FieldDiff::blank());

        let mut done = 0;
        while done < ntype {
            let nfield = (ntype - done).min(per_chunk);
            let pmax = first + 16 * nfield;
            if line.len() > pmax {
                return Err(Error::ObsCountMismatch {
                    line: reader.line_number(),
                    snippet: line,
                });
            }
            while line.len() < pmax {
                line.push(' ');
            }
            for j in 0..nfield {
                let start = first + 16 * j;
                let f = &line.as_bytes()[start..start + 16];
                let idx = done + j;
                if f[10] == b'.' {
                    let (flag1, flag2) = (f[14] as char, f[15] as char);
                    match field::read_value(&f[..14]) {
                        Some((u, l)) => self.data[slot][idx].load(u, l),
                        None => {
                            return Err(Error::AbnormalField {
                                line: reader.line_number(),
                                snippet: line.clone(),
                            })
                        },
                    }
                    self.flags[slot].push(flag1);
                    self.flags[slot].push(flag2);
                } else if f[..14].iter().all(|b| *b == b' ') {
                    if self.v2() && (f[14] != b' ' || f[15] != b' ') {
                        return Err(Error::FlagOnBlankField {
                            line: reader.line_number(),
                            snippet: line.clone(),
                        });
                    }
                    let (flag1, flag2) = (f[14] as char, f[15] as char);
                    self.flags[slot].push(flag1);
                    self.flags[slot].push(flag2);
                    self.data[slot][idx] = FieldDiff::blank();
                } else {
                    return Err(Error::AbnormalField {
                        line: reader.line_number(),
                        snippet: line.clone(),
                    });
                }
            }
            done += nfield;
            if done < ntype {
                line = reader.require_line()?;
                chop(&mut line);
            }
        }
        Ok(())
    }

    /// Differences every live field along its arc and appends the
    /// per-satellite lines to the epoch buffer: deltas, one blank
    /// separator, then the flag difference.
    fn emit_records(&mut self, table: &[Option<usize>], nsat: usize) {
        let v2 = self.rinex_major == 2;
        let Self {
            buf,
            data,
            prev_data,
            prev_flags,
            flags,
            rec_types,
            ..
        } = self;

        for i in 0..nsat {
            let prev_slot = table[i];
            let ntype = rec_types[i];
            for j in 0..ntype {
                let entry = &mut data[i][j];
                if entry.order >= 0 {
                    let prev = prev_slot
                        .and_then(|s| prev_data.get(s))
                        .and_then(|row| row.get(j))
                        .copied()
                        .filter(|p| p.order >= 0);
                    match prev {
                        Some(prev) => {
                            entry.take_diff(&prev);
                            let (du, _) = entry.top();
                            if du.abs() > 100_000 {
                                // cycle slip: restart the arc
                                entry.restart();
                                let _ = write!(buf, "{}&", MAX_DIFF_ORDER);
                            }
                        },
                        None => {
                            entry.restart();
                            let _ = write!(buf, "{}&", MAX_DIFF_ORDER);
                        },
                    }
                    let (du, dl) = entry.top();
                    numdiff::write_delta(du, dl, 100_000, 5, buf);
                } else if v2 {
                    // CRINEX 1 keeps no flags under a blank field
                    if let Some(s) = prev_slot {
                        if let Some(prev_flag) = prev_flags.get_mut(s) {
                            if prev_flag.len() >= 2 * j + 2 {
                                prev_flag.replace_range(2 * j..2 * j + 2, "  ");
                            }
                        }
                    }
                }
                if j + 1 < ntype {
                    buf.push(' ');
                }
            }
            buf.push(' ');
            match prev_slot {
                Some(s) => {
                    let base = prev_flags.get(s).map(|f| f.as_str()).unwrap_or("");
                    textdiff::diff(base, &flags[i], buf);
                },
                None if v2 => textdiff::diff("", &flags[i], buf),
                None => {
                    // CRINEX 3 spells a fresh flag set out in full
                    for c in flags[i].chars() {
                        buf.push(if c == ' ' { '&' } else { c });
                    }
                    buf.push('\n');
                },
            }
        }
    }

    fn ensure_capacity(&mut self, nsat: usize) {
        if self.data.len() < nsat {
            self.data.resize_with(nsat, Vec::new);
            self.prev_data.resize_with(nsat, Vec::new);
            self.flags.resize_with(nsat, String::new);
            self.prev_flags.resize_with(nsat, String::new);
            self.rec_types.resize(nsat, 0);
        }
    }
}
