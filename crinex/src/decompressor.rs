//! CRINEX → RINEX decompression engine (the CRX2RNX operation).
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
    textdiff, Summary, MAX_DIFF_ORDER, MAX_LINE_LEN, MAX_SAT,
};

use log::warn;
use std::fmt::Write as _;
use std::io::{BufRead, Write};

/// Streaming decompression context, the mirror image of
/// [crate::Compressor]: recovered epoch line, satellite table, one
/// difference arc per (satellite, observable) slot, the clock arc.
/// One instance performs one conversion.
pub struct Decompressor {
    /// Warn and resynchronize on damaged input instead of aborting
    skip: bool,
    /// Emit out-of-range values (corrupting the layout) with a warning
    /// instead of aborting
    output_overflow: bool,
    rinex_major: u8,
    crinex_major: u8,
    types: ObsTypes,
    /// Persistent recovered epoch line the differences apply onto
    line: String,
    prev_sats: String,
    prev_flags: Vec<String>,
    prev_data: Vec<Vec<FieldDiff>>,
    flags: Vec<String>,
    data: Vec<Vec<FieldDiff>>,
    rec_types: Vec<usize>,
    clk: ClockDiff,
    clk_prev: ClockDiff,
    clk_order: i8,
    clk_arc_order: i8,
    summary: Summary,
    buf: String,
}

impl Default for Decompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor {
    pub fn new() -> Self {
        Self {
            skip: false,
            output_overflow: false,
            rinex_major: 0,
            crinex_major: 0,
            types: ObsTypes::default(),
            line: String::new(),
            prev_sats: String::new(),
            prev_flags: Vec::new(),
            prev_data: Vec::new(),
            flags: Vec::new(),
            data: Vec::new(),
            rec_types: Vec::new(),
            clk: ClockDiff::default(),
            clk_prev: ClockDiff::default(),
            clk_order: 0,
            clk_arc_order: 0,
            summary: Summary::default(),
            buf: String::with_capacity(1024),
        }
    }

    /// Warn and resynchronize on damaged epochs (default: abort)
    pub fn skip_strange_epochs(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Degrade out-of-range emission to a warning
    pub fn tolerate_output_overflow(mut self, tolerate: bool) -> Self {
        self.output_overflow = tolerate;
        self
    }

    fn v2(&self) -> bool {
        self.rinex_major == 2
    }

    /// First column of an arc-initialization epoch line
    fn ep_top_from(&self) -> char {
        if self.v2() {
            '&'
        } else {
            '>'
        }
    }

    /// What that column decodes to
    fn ep_top_to(&self) -> char {
        if self.v2() {
            ' '
        } else {
            '>'
        }
    }

    fn event_col(&self) -> usize {
        if self.v2() {
            28
        } else {
            31
        }
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

        let mut pending: Option<String> = None;
        'main: loop {
            let mut dline = match pending.take() {
                Some(line) => line,
                None => match reader.next_line()? {
                    None => break,
                    Some(raw) => raw.text,
                },
            };
            // CRINEX 3 escape lines carry out-of-band records
            if self.crinex_major == 3 {
                while dline.starts_with('&') {
                    match reader.next_line()? {
                        None => break 'main,
                        Some(raw) => dline = raw.text,
                    }
                }
            }
            if dline.starts_with('\u{1a}') {
                break; // DOS end of file
            }
            if dline.len() >= MAX_LINE_LEN || dline.contains('\0') {
                let err = Error::OversizedLine {
                    line: reader.line_number(),
                    snippet: dline,
                };
                if !self.skip {
                    return Err(err);
                }
                warn!("{}", err);
                match self.skip_to_next(&mut reader, &mut output)? {
                    Some(next) => pending = Some(next),
                    None => break,
                }
                continue;
            }

            if dline.starts_with(self.ep_top_from()) {
                dline.replace_range(..1, if self.v2() { " " } else { ">" });
                let flag = dline.as_bytes().get(self.event_col()).copied();
                if !matches!(flag, Some(b'0') | Some(b'1')) {
                    match self.put_event_data(&mut reader, &mut output, dline) {
                        Ok(Some(next)) => {
                            pending = Some(next);
                            continue;
                        },
                        Ok(None) => break,
                        Err(e) => {
                            if !(self.skip && e.recoverable()) {
                                return Err(e);
                            }
                            warn!("{}", e);
                            match self.skip_to_next(&mut reader, &mut output)? {
                                Some(next) => pending = Some(next),
                                None => break,
                            }
                            continue;
                        },
                    }
                }
                // initialization epoch: every arc restarts
                self.line.clear();
                self.prev_sats.clear();
            }

            textdiff::merge(&mut self.line, &dline);
            if !self.valid_epoch_line() {
                match self.skip_to_next(&mut reader, &mut output)? {
                    Some(next) => pending = Some(next),
                    None => break,
                }
                continue;
            }
            chop(&mut self.line);

            let nsat_col = if self.v2() { 29 } else { 32 };
            let sat_col = if self.v2() { 32 } else { 41 };
            let nsat = parse_prefix_int(self.line.get(nsat_col..).unwrap_or(""));
            if nsat > MAX_SAT as i64 {
                return Err(Error::TooManySatellites {
                    line: reader.line_number(),
                    snippet: self.line.clone(),
                });
            }
            let nsat = nsat.max(0) as usize;

            let mut sat_list = self
                .line
                .get(sat_col..(sat_col + 3 * nsat).min(self.line.len()))
                .unwrap_or("")
                .to_string();
            while sat_list.len() < 3 * nsat {
                sat_list.push(' ');
            }
            self.rec_types =
                self.types
                    .record_types(self.rinex_major, &sat_list, reader.line_number())?;
            let table = sat::slot_table(&sat_list, &self.prev_sats);

            // clock difference line
            let cline = match reader.require_line() {
                Ok(line) => line,
                Err(e @ Error::OversizedLine { .. }) => {
                    if !self.skip {
                        return Err(e);
                    }
                    warn!("{}", e);
                    match self.skip_to_next(&mut reader, &mut output)? {
                        Some(next) => pending = Some(next),
                        None => break,
                    }
                    continue;
                },
                Err(e) => return Err(e),
            };
            self.read_clock_line(&cline, reader.line_number())?;

            self.ensure_capacity(nsat);
            for slot in 0..nsat {
                if let Err(e) = self.read_diff_record(&mut reader, slot, table[slot]) {
                    if !(self.skip && e.recoverable()) {
                        return Err(e);
                    }
                    warn!("{}", e);
                    match self.skip_to_next(&mut reader, &mut output)? {
                        Some(next) => pending = Some(next),
                        None => break 'main,
                    }
                    continue 'main;
                }
            }

            // recover and emit
            if !cline.is_empty() {
                self.process_clock();
            }
            self.buf.clear();
            self.emit_epoch_line(nsat, reader.line_number())?;
            self.emit_records(&sat_list, &table, nsat, reader.line_number())?;
            output.write_all(self.buf.as_bytes())?;

            // this epoch becomes the reference for the next one
            self.prev_sats = sat_list;
            self.clk_prev = self.clk;
            for i in 0..nsat {
                self.prev_flags[i].clone_from(&self.flags[i]);
                self.prev_data[i].clone_from(&self.data[i]);
            }
            self.summary.epochs += 1;
        }
        output.flush()?;
        Ok(self.summary)
    }

    /// Strips the CRINEX prelude, passes the RINEX header through and
    /// collects the observation-type counts.
    fn header<R: BufRead, W: Write>(
        &mut self,
        reader: &mut LineReader<R>,
        output: &mut W,
    ) -> Result<(), Error> {
        let vers = reader.require_line()?;
        self.crinex_major = Crinex::parse_prelude(&vers).ok_or(Error::NotCrinex)?;
        let _prog_date = reader.require_line()?;

        let mut line = reader.require_line()?;
        chop(&mut line);
        writeln!(output, "{}", line)?;
        let major = line.as_bytes().get(5).copied();
        if !has_label(&line, "RINEX VERSION / TYPE") || !matches!(major, Some(b'2') | Some(b'3')) {
            return Err(Error::NotObservationRinex { snippet: line });
        }
        self.rinex_major = if major == Some(b'2') { 2 } else { 3 };

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

    /// The recovered epoch line must look like a timestamped record
    /// before anything is decoded against it.
    fn valid_epoch_line(&self) -> bool {
        let off = if self.v2() { 3 } else { 6 };
        let b = self.line.as_bytes();
        self.line.len() >= 26 + off
            && self.line.starts_with(self.ep_top_to())
            && b[off + 23] == b' '
            && b[off + 24] == b' '
            && b[off + 25].is_ascii_digit()
    }

    /// Event records (flag > 1) pass through uncompressed; chained
    /// event blocks are handled in one sweep. Returns the following
    /// epoch line, or None when input ends there.
    fn put_event_data<R: BufRead, W: Write>(
        &mut self,
        reader: &mut LineReader<R>,
        output: &mut W,
        mut dline: String,
    ) -> Result<Option<String>, Error> {
        let event_col = self.event_col();
        loop {
            chop(&mut dline);
            writeln!(output, "{}", dline)?;
            if dline.len() > 29 {
                let count = parse_prefix_int(dline.get(event_col + 1..).unwrap_or("")).max(0);
                for _ in 0..count {
                    let mut line = reader.require_line()?;
                    chop(&mut line);
                    writeln!(output, "{}", line)?;
                    self.types.scan(&line, reader.line_number())?;
                }
            }
            let mut next = loop {
                match reader.next_line()? {
                    None => return Ok(None),
                    Some(raw) => {
                        if self.crinex_major == 3 && raw.text.starts_with('&') {
                            continue;
                        }
                        break raw.text;
                    },
                }
            };
            let flag = next.as_bytes().get(event_col).copied();
            if !next.starts_with(self.ep_top_from())
                || next.len() < 29
                || !flag.map_or(false, |b| b.is_ascii_digit())
            {
                return Err(Error::EpochNotInitialized {
                    line: reader.line_number(),
                    snippet: next,
                });
            }
            if matches!(flag, Some(b'0') | Some(b'1')) {
                return Ok(Some(next));
            }
            next.replace_range(..1, if self.v2() { " " } else { ">" });
            dline = next;
        }
    }

    /// Scans forward for the next initialization epoch, bracketing the
    /// gap with the synthetic skip comment. None when input ends first.
    fn skip_to_next<R: BufRead, W: Write>(
        &mut self,
        reader: &mut LineReader<R>,
        output: &mut W,
    ) -> Result<Option<String>, Error> {
        self.summary.warnings += 1;
        warn!(
            "line {}: skipping until an initialized epoch is found",
            reader.line_number()
        );
        let off = if self.v2() { 3 } else { 6 };
        loop {
            let text = match reader.next_line()? {
                None => {
                    warn!("next epoch not found before end of input");
                    self.emit_skip_comment(output)?;
                    return Ok(None);
                },
                Some(raw) => raw.text,
            };
            let b = text.as_bytes();
            let found = text.starts_with(self.ep_top_from())
                && text.len() > off + 25
                && b[off] == b' '
                && b[off + 3] == b' '
                && b[off + 6] == b' '
                && b[off + 9] == b' '
                && b[off + 12] == b' '
                && b[off + 23] == b' '
                && b[off + 24] == b' '
                && b[off + 25].is_ascii_digit();
            if found {
                warn!("next epoch found at line {}", reader.line_number());
                self.emit_skip_comment(output)?;
                return Ok(Some(text));
            }
        }
    }

    fn emit_skip_comment<W: Write>(&self, output: &mut W) -> Result<(), Error> {
        if self.v2() {
            writeln!(output, "{:>29}{:>3}", 4, 1)?;
        } else {
            writeln!(output, ">{:>31}{:>3}", 4, 1)?;
        }
        writeln!(
            output,
            "{:<60}COMMENT",
            "  *** Some epochs are skipped by CRX2RNX ***"
        )?;
        Ok(())
    }

    /// One clock line per epoch: empty (no clock), `N&` initialization,
    /// or a plain delta.
    fn read_clock_line(&mut self, cline: &str, line_number: u64) -> Result<(), Error> {
        if cline.is_empty() {
            self.clk_order = -1;
            return Ok(());
        }
        let mut s = cline;
        if s.as_bytes().get(1) == Some(&b'&') {
            let order = parse_prefix_int(&s[..1]);
            if order > MAX_DIFF_ORDER as i64 {
                return Err(Error::OrderTooLarge {
                    line: line_number,
                    snippet: cline.to_string(),
                });
            }
            self.clk_arc_order = order as i8;
            self.clk_order = -1;
            s = &s[2..];
        }
        match numdiff::split_value(s.trim_end(), 8) {
            Some((u, l)) => {
                self.clk.upper[0] = u;
                self.clk.lower[0] = l;
                Ok(())
            },
            None => Err(Error::MalformedClock {
                line: line_number,
                snippet: cline.to_string(),
            }),
        }
    }

    fn process_clock(&mut self) {
        let deepening = self.clk_order < self.clk_arc_order;
        if deepening {
            self.clk_order += 1;
        }
        let order = self.clk_order.max(0) as usize;
        let prev = self.clk_prev;
        self.clk.accumulate(&prev, order, deepening);
    }

    /// One line of differences per satellite: the observable deltas,
    /// blank-separated, then the flag difference.
    fn read_diff_record<R: BufRead>(
        &mut self,
        reader: &mut LineReader<R>,
        slot: usize,
        prev_slot: Option<usize>,
    ) -> Result<(), Error> {
        let line = reader.require_line()?;
        let ntype = self.rec_types[slot];
        self.data[slot].clear();
        self.data[slot].resize(ntype, FieldDiff::blank());

        let mut rest: &str = &line;
        let mut fields: Vec<&str> = Vec::with_capacity(ntype);
        for _ in 0..ntype {
            match rest.find(' ') {
                Some(pos) => {
                    fields.push(&rest[..pos]);
                    rest = &rest[pos + 1..];
                },
                None => {
                    fields.push(rest);
                    rest = "";
                },
            }
        }
        let dflag = rest;

        for (j, f) in fields.iter().enumerate() {
            if f.is_empty() {
                continue; // blank field, no live arc
            }
            if f.as_bytes().get(1) == Some(&b'&') {
                let order = parse_prefix_int(&f[..1]);
                if order > MAX_DIFF_ORDER as i64 {
                    return Err(Error::OrderTooLarge {
                        line: reader.line_number(),
                        snippet: line.clone(),
                    });
                }
                let (u, l) = numdiff::split_value(&f[2..], 5).ok_or_else(|| {
                    Error::AbnormalField {
                        line: reader.line_number(),
                        snippet: line.clone(),
                    }
                })?;
                self.data[slot][j].init_arc(order as i8, u, l);
            } else {
                let prev = match prev_slot {
                    None => {
                        return Err(Error::SatelliteNotInitialized {
                            line: reader.line_number(),
                            snippet: line.clone(),
                        })
                    },
                    Some(s) => self
                        .prev_data
                        .get(s)
                        .and_then(|row| row.get(j))
                        .copied()
                        .unwrap_or_else(FieldDiff::blank),
                };
                if prev.arc_order < 0 {
                    return Err(Error::ArcNotInitialized {
                        line: reader.line_number(),
                        snippet: line.clone(),
                    });
                }
                let (u, l) =
                    numdiff::split_value(f, 5).ok_or_else(|| Error::AbnormalField {
                        line: reader.line_number(),
                        snippet: line.clone(),
                    })?;
                self.data[slot][j].continue_arc(&prev, u, l);
            }
        }

        // flags: the delta applies onto the previous epoch's flags, or
        // onto itself for a fresh satellite
        let width = 2 * ntype;
        self.flags[slot] = match prev_slot {
            None if !self.v2() => String::new(),
            None => format!("{:<w$}", dflag, w = width),
            Some(s) => {
                let mut base = self.prev_flags.get(s).cloned().unwrap_or_default();
                base.truncate(width);
                while base.len() < width {
                    base.push(' ');
                }
                base
            },
        };
        textdiff::merge(&mut self.flags[slot], dflag);
        while self.flags[slot].len() < width {
            self.flags[slot].push(' ');
        }
        Ok(())
    }

    /// Epoch line, clock offset, and (RINEX 2) satellite-list
    /// continuation lines.
    fn emit_epoch_line(&mut self, nsat: usize, line_number: u64) -> Result<(), Error> {
        let mut clock_fits = true;
        {
            let v2 = self.v2();
            let order = self.clk_order.max(0) as usize;
            let (cu, cl) = (self.clk.upper[order], self.clk.lower[order]);
            let has_clock = self.clk_order >= 0;
            let Self { line, buf, .. } = self;
            if v2 {
                let head = &line[..line.len().min(68)];
                if has_clock {
                    let _ = write!(buf, "{:<68}", head);
                    clock_fits = clock::print_clock(cu, cl, 1, buf);
                } else {
                    buf.push_str(head);
                    buf.push('\n');
                }
                let mut start = 68;
                let mut remaining = nsat as i64 - 12;
                while remaining > 0 {
                    let _ = write!(buf, "{:32}", "");
                    if start < line.len() {
                        buf.push_str(&line[start..line.len().min(start + 36)]);
                    }
                    buf.push('\n');
                    start += 36;
                    remaining -= 12;
                }
            } else {
                let head = &line[..line.len().min(41)];
                if has_clock {
                    buf.push_str(head);
                    clock_fits = clock::print_clock(cu, cl, 4, buf);
                } else {
                    let mut head = head.to_string();
                    chop(&mut head);
                    buf.push_str(&head);
                    buf.push('\n');
                }
            }
        }
        if !clock_fits {
            self.tolerate("Clock offset", line_number)?;
        }
        Ok(())
    }

    /// Reconstructs every record of the epoch into the buffer.
    fn emit_records(
        &mut self,
        sat_list: &str,
        table: &[Option<usize>],
        nsat: usize,
        line_number: u64,
    ) -> Result<(), Error> {
        let v2 = self.rinex_major == 2;
        let crinex1 = self.crinex_major == 1;
        let mut overflows = 0_u32;
        {
            let Self {
                buf,
                data,
                prev_data,
                flags,
                rec_types,
                ..
            } = self;
            for i in 0..nsat {
                let ntype = rec_types[i];
                if !v2 {
                    buf.push_str(&sat_list[3 * i..3 * i + 3]);
                }
                for j in 0..ntype {
                    let entry = &mut data[i][j];
                    if entry.arc_order >= 0 {
                        let prev = table[i]
                            .and_then(|s| prev_data.get(s))
                            .and_then(|row| row.get(j))
                            .copied()
                            .unwrap_or_else(FieldDiff::blank);
                        entry.accumulate(&prev);
                        let (u, l) = entry.top();
                        let fb = flags[i].as_bytes();
                        let flag_pair = [
                            fb.get(2 * j).copied().unwrap_or(b' '),
                            fb.get(2 * j + 1).copied().unwrap_or(b' '),
                        ];
                        if !field::put_field(u, l, flag_pair, buf) {
                            overflows += 1;
                        }
                    } else if crinex1 {
                        // CRINEX 1 ties flags to data presence
                        buf.push_str("                ");
                        if flags[i].len() >= 2 * j + 2 {
                            flags[i].replace_range(2 * j..2 * j + 2, "  ");
                        }
                    } else {
                        buf.push_str("              ");
                        let fb = flags[i].as_bytes();
                        buf.push(fb.get(2 * j).copied().unwrap_or(b' ') as char);
                        buf.push(fb.get(2 * j + 1).copied().unwrap_or(b' ') as char);
                    }
                    if j + 1 == ntype || (v2 && (j + 1) % 5 == 0) {
                        while buf.ends_with(' ') {
                            buf.pop();
                        }
                        buf.push('\n');
                    }
                }
            }
        }
        for _ in 0..overflows {
            self.tolerate("Data record", line_number)?;
        }
        Ok(())
    }

    /// Out-of-range emission: fatal, or a warning under the override.
    fn tolerate(&mut self, what: &'static str, line_number: u64) -> Result<(), Error> {
        let err = Error::OutputOverflow {
            line: line_number,
            what,
        };
        if self.output_overflow {
            warn!("{}; the output is corrupted", err);
            self.summary.warnings += 1;
            Ok(())
        } else {
            Err(err)
        }
    }

    fn ensure_capacity(&mut self, nsat: usize) {
        if self.data.len() < nsat {
            self.data.resize_with(nsat, Vec::new);
            self.prev_data.resize_with(nsat, Vec::new);
            self.flags.resize_with(nsat, String::new);
            self.prev_flags.resize_with(nsat, String::new);
        }
    }
}
