//! Text rendering helpers shared by the codecs.

use std::fmt::{self, Write};

/// Byte buffers longer than this are truncated when rendered.
pub const MAX_FORMATTED_BYTES: usize = 32;

/// Number of leading bytes shown for a truncated buffer.
pub const TRUNCATED_PREFIX: usize = 20;

/// Renders a byte buffer as a quoted, escaped string.
///
/// Buffers longer than [`MAX_FORMATTED_BYTES`] show their first
/// [`TRUNCATED_PREFIX`] bytes followed by the total length.
pub fn format_bytes(w: &mut dyn Write, bytes: &[u8]) -> fmt::Result {
    if bytes.len() > MAX_FORMATTED_BYTES {
        quote(w, &bytes[..TRUNCATED_PREFIX])?;
        write!(w, "... ({} bytes)", bytes.len())
    } else {
        quote(w, bytes)
    }
}

fn quote(w: &mut dyn Write, bytes: &[u8]) -> fmt::Result {
    w.write_char('"')?;
    for &b in bytes {
        for c in std::ascii::escape_default(b) {
            w.write_char(char::from(c))?;
        }
    }
    w.write_char('"')
}

/// Renders a nanosecond tick count as `72h3m0.5s`, `1.5ms`, `0s`...
pub fn format_duration(w: &mut dyn Write, nanos: i64) -> fmt::Result {
    if nanos == 0 {
        return w.write_str("0s");
    }
    if nanos < 0 {
        w.write_char('-')?;
    }
    let u = nanos.unsigned_abs();

    if u < 1_000_000_000 {
        let (unit, scale, digits) = if u < 1_000 {
            ("ns", 1, 0)
        } else if u < 1_000_000 {
            ("µs", 1_000, 3)
        } else {
            ("ms", 1_000_000, 6)
        };
        write!(w, "{}", u / scale)?;
        write_fraction(w, u % scale, digits)?;
        return w.write_str(unit);
    }

    let secs = u / 1_000_000_000;
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if h > 0 {
        write!(w, "{h}h")?;
    }
    if h > 0 || m > 0 {
        write!(w, "{m}m")?;
    }
    write!(w, "{s}")?;
    write_fraction(w, u % 1_000_000_000, 9)?;
    w.write_char('s')
}

fn write_fraction(w: &mut dyn Write, frac: u64, digits: usize) -> fmt::Result {
    if frac == 0 {
        return Ok(());
    }
    let padded = format!("{frac:0digits$}");
    write!(w, ".{}", padded.trim_end_matches('0'))
}

/// Writes `items` separated by `sep`.
pub fn format_list<I, F>(w: &mut dyn Write, sep: &str, items: I, mut each: F) -> fmt::Result
where
    I: IntoIterator,
    F: FnMut(&mut dyn Write, I::Item) -> fmt::Result,
{
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            w.write_str(sep)?;
        }
        each(w, item)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(b: &[u8]) -> String {
        let mut s = String::new();
        format_bytes(&mut s, b).unwrap();
        s
    }

    fn duration(nanos: i64) -> String {
        let mut s = String::new();
        format_duration(&mut s, nanos).unwrap();
        s
    }

    #[test]
    fn test_format_bytes_quotes_and_escapes() {
        assert_eq!(bytes(b"hi\n\"x\""), r#""hi\n\"x\"""#);
        assert_eq!(bytes(&[0, 255]), r#""\x00\xff""#);
    }

    #[test]
    fn test_format_bytes_truncates_long_buffers() {
        let long = [b'a'; 33];
        assert_eq!(bytes(&long), format!("\"{}\"... (33 bytes)", "a".repeat(20)));
        assert_eq!(bytes(&long[..32]), format!("\"{}\"", "a".repeat(32)));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(duration(0), "0s");
        assert_eq!(duration(1_000_000_000), "1s");
        assert_eq!(duration(1_500_000), "1.5ms");
        assert_eq!(duration(999), "999ns");
        assert_eq!(duration(2_000), "2µs");
        assert_eq!(duration(60_000_000_000), "1m0s");
        assert_eq!(duration(3_723_500_000_000), "1h2m3.5s");
        assert_eq!(duration(-1_000_000_000), "-1s");
    }
}
