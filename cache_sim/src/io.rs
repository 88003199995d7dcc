//! Memory images in, cache and memory dumps out.
//!
//! Both directions use one two-digit hex byte per token: an image and a
//! memory dump hold one byte per line in address order, a cache dump holds
//! one line per slot with every data byte followed by a single space.

use std::io::{self, Write};

use thiserror::Error;

use crate::{
    common::{parse_byte, ParseHexError},
    snapshot::{CacheSnapshot, MemorySnapshot},
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ImageError {
    #[error("line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: ParseHexError,
    },
}

/// Parses an image of one byte per line (`0A`, `0x0a`, ...). Blank lines are
/// skipped.
pub fn parse_image(text: &str) -> Result<Vec<u8>, ImageError> {
    let mut image = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let byte = parse_byte(line).map_err(|source| ImageError::Malformed {
            line: i + 1,
            source,
        })?;
        image.push(byte);
    }
    Ok(image)
}

pub fn dump_cache(snapshot: &CacheSnapshot, mut out: impl Write) -> io::Result<()> {
    for line in &snapshot.lines {
        for b in &line.data {
            write!(out, "{b:02X} ")?;
        }
        writeln!(out)?;
    }
    out.flush()
}

pub fn dump_memory(snapshot: &MemorySnapshot, mut out: impl Write) -> io::Result<()> {
    for b in &snapshot.bytes {
        writeln!(out, "{b:02X}")?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::tests::config,
        memory::Addr,
        sim::Simulator,
    };

    #[test]
    fn test_parse_image() {
        let text = "0A\n0b\n  FF \n\n0x10\r\n";
        assert_eq!(Ok(vec![0x0A, 0x0B, 0xFF, 0x10]), parse_image(text));
        assert_eq!(Ok(vec![]), parse_image(""));
    }
    #[test]
    fn test_parse_image_reports_line() {
        assert_eq!(
            Err(ImageError::Malformed {
                line: 3,
                source: ParseHexError::Malformed("zz".to_owned()),
            }),
            parse_image("00\n01\nzz\n")
        );
        assert!(matches!(
            parse_image("100\n"),
            Err(ImageError::Malformed { line: 1, .. })
        ));
    }
    #[test]
    fn test_dump_cold_cache() {
        let sim = Simulator::new(config(256, 32, 8, 1), &[]).unwrap();
        let mut buf = Vec::new();
        dump_cache(&sim.cache_snapshot(), &mut buf).unwrap();
        let line = "00 00 00 00 00 00 00 00 \n";
        assert_eq!(line.repeat(4), String::from_utf8(buf).unwrap());
    }
    #[test]
    fn test_dump_after_requests() {
        let image: Vec<u8> = (0..16).map(|i| i * 0x11).collect();
        let mut sim = Simulator::new(config(16, 8, 4, 1), &image).unwrap();
        sim.read(Addr::new(0x5)).unwrap();
        sim.write(Addr::new(0xe), 0x01).unwrap();

        let mut buf = Vec::new();
        dump_cache(&sim.cache_snapshot(), &mut buf).unwrap();
        assert_eq!(
            "00 00 00 00 \nCC DD 01 FF \n",
            String::from_utf8(buf).unwrap()
        );

        let mut buf = Vec::new();
        dump_memory(&sim.memory_snapshot(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(16, text.lines().count());
        assert!(text.starts_with("00\n11\n22\n"));
        // write-back: 0xe still holds its old value
        assert_eq!(Some("EE"), text.lines().nth(0xe));
        // a dump reads back as an image
        assert_eq!(Ok(image), parse_image(&text));
    }
}
