//! Buffered reader wrapper with integrated .gz stream decompression,
//! and the line-oriented reader both engines are built on.
#[cfg(feature = "flate2")]
use flate2::bufread::GzDecoder;

use crate::{errors::Error, MAX_LINE_LEN};
use std::io::{BufRead, BufReader, Error as IoError, Read};

/// [BufferedReader] adapts plain and gzip compressed streams behind a
/// single [BufRead] implementation. CRINEX observation files are
/// almost always distributed gzip'ed.
#[derive(Debug)]
pub enum BufferedReader<BR: BufRead> {
    /// Readable data
    Plain(BR),
    /// Gzip compressed data
    #[cfg(feature = "flate2")]
    Gz(BufReader<GzDecoder<BR>>),
}

impl<BR: BufRead> BufferedReader<BR> {
    pub fn plain(r: BR) -> Self {
        Self::Plain(r)
    }
    #[cfg(feature = "flate2")]
    pub fn gzip(r: BR) -> Self {
        Self::Gz(BufReader::new(GzDecoder::new(r)))
    }
}

impl<BR: BufRead> Read for BufferedReader<BR> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        match self {
            Self::Plain(r) => r.read(buf),
            #[cfg(feature = "flate2")]
            Self::Gz(r) => r.read(buf),
        }
    }
}

impl<BR: BufRead> BufRead for BufferedReader<BR> {
    fn fill_buf(&mut self) -> Result<&[u8], IoError> {
        match self {
            Self::Plain(r) => r.fill_buf(),
            #[cfg(feature = "flate2")]
            Self::Gz(r) => r.fill_buf(),
        }
    }
    fn consume(&mut self, s: usize) {
        match self {
            Self::Plain(r) => r.consume(s),
            #[cfg(feature = "flate2")]
            Self::Gz(r) => r.consume(s),
        }
    }
}

/// One logical input line, terminator stripped.
#[derive(Debug, Clone)]
pub struct RawLine {
    pub text: String,
    /// False only for a final line not closed by a newline
    pub terminated: bool,
}

/// Line-oriented reader. Accepts both LF and CR LF termination and
/// maintains the 1-based line count that every diagnostic refers to.
pub struct LineReader<R: BufRead> {
    inner: R,
    count: u64,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }

    /// Number of the line most recently read (1-based)
    pub fn line_number(&self) -> u64 {
        self.count
    }

    /// Next input line, None at end of stream.
    pub fn next_line(&mut self) -> Result<Option<RawLine>, Error> {
        let mut buf = Vec::<u8>::with_capacity(128);
        let read = self.inner.read_until(b'\n', &mut buf)?;
        if read == 0 {
            return Ok(None);
        }
        self.count += 1;
        let terminated = buf.last() == Some(&b'\n');
        if terminated {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        // the engines address columns by byte offset; squashing stray
        // non-ASCII bytes keeps one byte per column
        let text: String = buf
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { '?' })
            .collect();
        Ok(Some(RawLine { text, terminated }))
    }

    /// Next input line, where running out of input means the record
    /// under construction is incomplete. Also polices embedded null
    /// characters and the line length bound.
    pub fn require_line(&mut self) -> Result<String, Error> {
        match self.next_line()? {
            None => Err(Error::TruncatedFile {
                line: self.count,
                snippet: String::new(),
            }),
            Some(raw) => {
                if !raw.terminated {
                    return Err(Error::TruncatedFile {
                        line: self.count,
                        snippet: raw.text,
                    });
                }
                self.police(raw.text)
            },
        }
    }

    /// Applies the length / null-character bound to an accepted line.
    pub fn police(&self, text: String) -> Result<String, Error> {
        if text.len() >= MAX_LINE_LEN || text.contains('\0') {
            return Err(Error::OversizedLine {
                line: self.count,
                snippet: text,
            });
        }
        Ok(text)
    }
}

#[cfg(test)]
mod test {
    use super::LineReader;
    use crate::errors::Error;
    use std::io::Cursor;

    #[test]
    fn line_endings() {
        let data = "first\r\nsecond\nthird";
        let mut reader = LineReader::new(Cursor::new(data));

        let l = reader.next_line().unwrap().unwrap();
        assert_eq!(l.text, "first");
        assert!(l.terminated);
        assert_eq!(reader.line_number(), 1);

        let l = reader.next_line().unwrap().unwrap();
        assert_eq!(l.text, "second");
        assert!(l.terminated);

        let l = reader.next_line().unwrap().unwrap();
        assert_eq!(l.text, "third");
        assert!(!l.terminated);
        assert_eq!(reader.line_number(), 3);

        assert!(reader.next_line().unwrap().is_none());
    }

    #[test]
    fn truncation_is_reported() {
        let mut reader = LineReader::new(Cursor::new("no newline at all"));
        match reader.require_line() {
            Err(Error::TruncatedFile { line: 1, .. }) => {},
            other => panic!("unexpected outcome {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn oversized_lines_are_rejected() {
        let long = format!("{}\n", "x".repeat(4000));
        let mut reader = LineReader::new(Cursor::new(long));
        assert!(matches!(
            reader.require_line(),
            Err(Error::OversizedLine { line: 1, .. })
        ));

        let nul = "bad\0line\n";
        let mut reader = LineReader::new(Cursor::new(nul));
        assert!(matches!(
            reader.require_line(),
            Err(Error::OversizedLine { .. })
        ));
    }
}
