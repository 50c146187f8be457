//! Radix-64 armor framing for key blocks.
//!
//! An armored block is a `-----BEGIN <label>-----` line, optional
//! `Key: Value` header lines, a blank line, the base64 payload, a
//! `=XXXX` CRC24 checksum line and the matching `-----END <label>-----`.

use crate::error::DecodeError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub const PUBLIC_KEY_BLOCK: &str = "PGP PUBLIC KEY BLOCK";
pub const PRIVATE_KEY_BLOCK: &str = "PGP PRIVATE KEY BLOCK";

const CRC24_INIT: u32 = 0x00B7_04CE;
const CRC24_POLY: u32 = 0x0186_4CFB;
const LINE_WIDTH: usize = 64;

/// A decoded armor frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Armored {
    pub label: String,
    pub headers: Vec<(String, String)>,
    pub data: Vec<u8>,
}

pub(crate) fn crc24(data: &[u8]) -> u32 {
    let mut crc = CRC24_INIT;
    for &byte in data {
        crc ^= u32::from(byte) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24_POLY;
            }
        }
    }
    crc & 0x00FF_FFFF
}

/// Strips and validates the armor frame, returning the binary payload.
///
/// The checksum line is mandatory and must match the CRC24 of the payload.
pub fn decode(input: &[u8]) -> Result<Armored, DecodeError> {
    let text = String::from_utf8_lossy(input);
    let mut lines = text.lines().map(str::trim_end);

    let label = lines
        .by_ref()
        .find_map(|line| {
            line.strip_prefix("-----BEGIN ")
                .and_then(|rest| rest.strip_suffix("-----"))
        })
        .ok_or(DecodeError::MissingArmorHeader)?
        .to_string();

    let mut headers = Vec::new();
    let mut body = String::new();
    let mut checksum = None;
    let mut in_headers = true;
    let mut closed = false;

    for line in lines {
        if in_headers {
            if line.is_empty() {
                in_headers = false;
                continue;
            }
            if let Some((key, value)) = line.split_once(": ") {
                headers.push((key.to_string(), value.to_string()));
                continue;
            }
            // some writers omit the blank separator when there are no headers
            in_headers = false;
        }

        if let Some(rest) = line.strip_prefix("-----END ") {
            let found = rest.strip_suffix("-----").unwrap_or(rest);
            if found != label {
                return Err(DecodeError::ArmorLabelMismatch {
                    expected: label,
                    found: found.to_string(),
                });
            }
            closed = true;
            break;
        }

        if let Some(sum) = line.strip_prefix('=') {
            checksum = Some(sum.trim().to_string());
        } else {
            body.push_str(line.trim());
        }
    }

    if !closed {
        return Err(DecodeError::MissingArmorFooter(label));
    }

    let data = STANDARD
        .decode(body.as_bytes())
        .map_err(|_| DecodeError::InvalidRadix64)?;

    let checksum = checksum.ok_or(DecodeError::MissingChecksum)?;
    let sum_bytes = STANDARD
        .decode(checksum.as_bytes())
        .map_err(|_| DecodeError::InvalidRadix64)?;
    let expected = match sum_bytes.as_slice() {
        [a, b, c] => u32::from_be_bytes([0, *a, *b, *c]),
        _ => return Err(DecodeError::InvalidRadix64),
    };
    let computed = crc24(&data);
    if expected != computed {
        return Err(DecodeError::ChecksumMismatch { expected, computed });
    }

    Ok(Armored {
        label,
        headers,
        data,
    })
}

/// Wraps `data` in an armor frame with no header lines.
pub fn encode(label: &str, data: &[u8]) -> String {
    let body = STANDARD.encode(data);
    let crc = crc24(data).to_be_bytes();

    let mut out = String::with_capacity(body.len() + body.len() / LINE_WIDTH + 96);
    out.push_str("-----BEGIN ");
    out.push_str(label);
    out.push_str("-----\n\n");
    for start in (0..body.len()).step_by(LINE_WIDTH) {
        let end = (start + LINE_WIDTH).min(body.len());
        out.push_str(&body[start..end]);
        out.push('\n');
    }
    out.push('=');
    out.push_str(&STANDARD.encode(&crc[1..]));
    out.push('\n');
    out.push_str("-----END ");
    out.push_str(label);
    out.push_str("-----\n");
    out
}
