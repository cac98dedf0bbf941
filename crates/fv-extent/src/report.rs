//! `filefrag -e` report parsing.
//!
//! An extent line looks like
//!
//! ```text
//!    1:     2048..   21000:      38912..     57864:  18953:      36864: last,eof
//! ```
//!
//! i.e. `index: logical_start.. logical_end: physical_start.. physical_end:
//! length` followed by optional columns. Only the physical start and the
//! length are kept. Banner, header and summary lines never match and are
//! skipped.

use fv_types::{Extent, ParseError};
use tracing::debug;

/// Parse every extent line of `text`, in report order.
///
/// A report without extent lines yields an empty vector.
#[must_use]
pub fn parse_report(text: &str) -> Vec<Extent> {
    let mut extents = Vec::new();
    for line in text.lines() {
        match parse_extent_line(line) {
            Some(Ok(extent)) => extents.push(extent),
            Some(Err(err)) => debug!(line, error = %err, "skipping unusable extent line"),
            None => {}
        }
    }
    extents
}

/// Parse one line.
///
/// Returns `None` when the line does not have the extent-line shape,
/// `Some(Err(_))` when it has the shape but its fields cannot form an
/// extent (zero length, numbers out of range).
#[must_use]
pub fn parse_extent_line(line: &str) -> Option<Result<Extent, ParseError>> {
    let mut cur = Cursor::new(line);
    cur.skip_ws();
    cur.digits()?; // index
    cur.expect(":")?;
    cur.skip_ws();
    cur.digits()?; // logical start
    cur.expect("..")?;
    cur.skip_ws();
    cur.digits()?; // logical end
    cur.expect(":")?;
    cur.skip_ws();
    let physical_start = cur.digits()?;
    cur.expect("..")?;
    cur.skip_ws();
    cur.digits()?; // physical end
    cur.expect(":")?;
    cur.skip_ws();
    let length = cur.digits()?;

    Some(
        parse_u64("physical_start", physical_start)
            .and_then(|start| Ok((start, parse_u64("length", length)?)))
            .and_then(|(start, length)| Extent::new(start, length)),
    )
}

fn parse_u64(field: &'static str, text: &str) -> Result<u64, ParseError> {
    text.parse().map_err(|_| ParseError::InvalidNumber {
        field,
        text: text.to_owned(),
    })
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a str) -> Self {
        Self { rest: line }
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    /// Consume a non-empty run of ASCII digits.
    fn digits(&mut self) -> Option<&'a str> {
        let end = self
            .rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(self.rest.len());
        if end == 0 {
            return None;
        }
        let (digits, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(digits)
    }

    fn expect(&mut self, token: &str) -> Option<()> {
        self.rest = self.rest.strip_prefix(token)?;
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXT4_REPORT: &str = "\
Filesystem type is: ef53
File size of ./mnt/random is 10752000 (21000 blocks of 512 bytes)
 ext:     logical_offset:        physical_offset: length:   expected: flags:
   0:        0..    2047:      34816..     36863:   2048:
   1:     2048..   21000:      38912..     57864:  18953:      36864: last,eof
./mnt/random: 2 extents found
";

    fn ext(start: u64, length: u64) -> Extent {
        Extent::new(start, length).unwrap()
    }

    #[test]
    fn parses_physical_start_and_length_only() {
        let extents = parse_report(EXT4_REPORT);
        assert_eq!(extents, vec![ext(34816, 2048), ext(38912, 18953)]);
    }

    #[test]
    fn banner_header_and_summary_lines_do_not_match() {
        for line in EXT4_REPORT.lines().filter(|l| !l.contains("..")) {
            assert!(parse_extent_line(line).is_none(), "matched {line:?}");
        }
    }

    #[test]
    fn report_without_extents_is_empty() {
        let text = "Filesystem type is: 9123683e\n./mnt/empty: 0 extents found\n";
        assert!(parse_report(text).is_empty());
        assert!(parse_report("").is_empty());
    }

    #[test]
    fn whitespace_is_tolerated() {
        assert_eq!(parse_extent_line("0:0..9:100..109:10"), Some(Ok(ext(100, 10))));
        assert_eq!(
            parse_extent_line("\t 7:  10..   19:   500..   509:    10:  last"),
            Some(Ok(ext(500, 10)))
        );
    }

    #[test]
    fn malformed_shapes_are_skipped() {
        assert!(parse_extent_line("0: 0..9: 100..109:").is_none());
        assert!(parse_extent_line("x: 0..9: 100..109: 10").is_none());
        assert!(parse_extent_line("0: 0.9: 100..109: 10").is_none());
        assert!(parse_extent_line("0: 0..9: -100..109: 10").is_none());
    }

    #[test]
    fn zero_length_and_overflow_are_unusable() {
        assert!(matches!(
            parse_extent_line("0: 0..0: 100..99: 0"),
            Some(Err(ParseError::InvalidField { field: "length", .. }))
        ));
        assert!(matches!(
            parse_extent_line("0: 0..0: 99999999999999999999999..1: 1"),
            Some(Err(ParseError::InvalidNumber {
                field: "physical_start",
                ..
            }))
        ));

        let text = "0: 0..0: 100..99: 0\n1: 0..9: 300..309: 10\n";
        assert_eq!(parse_report(text), vec![ext(300, 10)]);
    }

    #[test]
    fn report_order_is_preserved() {
        let text = "0: 0..4: 110..114: 5\n1: 5..14: 100..109: 10\n";
        assert_eq!(parse_report(text), vec![ext(110, 5), ext(100, 10)]);
    }
}
