use flate2::read::GzDecoder;
use std::io::{BufRead, BufReader, Read};

/// Gzip magic bytes (RFC 1952)
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Detect if data is gzipped by checking magic bytes
pub fn is_gzipped(data: &[u8]) -> bool {
    data.len() >= 2 && data[0..2] == GZIP_MAGIC
}

/// Wrap a reader so gzip-compressed input is decompressed on the fly.
///
/// Only the buffered prefix is inspected; nothing is consumed.
pub fn maybe_decompress<R: Read + 'static>(reader: R) -> std::io::Result<Box<dyn BufRead>> {
    let mut buffered = BufReader::new(reader);
    let compressed = is_gzipped(buffered.fill_buf()?);
    if compressed {
        Ok(Box::new(BufReader::new(GzDecoder::new(buffered))))
    } else {
        Ok(Box::new(buffered))
    }
}

/// Decode a C-style quoted path body (without the surrounding quotes).
///
/// Returns `None` on a dangling backslash.
pub fn unquote_c_string(quoted: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(quoted.len());
    let mut i = 0;
    while i < quoted.len() {
        let byte = quoted[i];
        if byte != b'\\' {
            out.push(byte);
            i += 1;
            continue;
        }
        let escaped = *quoted.get(i + 1)?;
        i += 2;
        let decoded = match escaped {
            b'\\' => b'\\',
            b'"' => b'"',
            b'\'' => b'\'',
            b'n' => b'\n',
            b't' => b'\t',
            b'r' => b'\r',
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'v' => 0x0b,
            b'0'..=b'7' => {
                let mut value = u32::from(escaped - b'0');
                let mut digits = 1;
                while digits < 3 {
                    match quoted.get(i) {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            i += 1;
                            digits += 1;
                        },
                        _ => break,
                    }
                }
                (value & 0xff) as u8
            },
            other => {
                // unknown escape, keep it literally
                out.push(b'\\');
                other
            },
        };
        out.push(decoded);
    }
    Some(out)
}

/// Quote a path for the wire, escaping what would break the line grammar
pub fn quote_c_string(path: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(path.len() + 2);
    out.push(b'"');
    for &byte in path {
        match byte {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'"' => out.extend_from_slice(b"\\\""),
            b'\n' => out.extend_from_slice(b"\\n"),
            other => out.push(other),
        }
    }
    out.push(b'"');
    out
}

/// Whether a path must be quoted to survive a round trip.
///
/// `space_sensitive` is set for the first path of a copy or rename, where an
/// unquoted space would end the path early.
pub fn needs_quoting(path: &[u8], space_sensitive: bool) -> bool {
    path.is_empty()
        || path[0] == b'"'
        || path.contains(&b'\n')
        || (space_sensitive && path.contains(&b' '))
}
