//! # NMEA Checksum
//!
//! NMEA 0183 sentence checksum: XOR of every byte between `$` and `*`,
//! rendered as two uppercase hex digits.

use crate::error::{Result, UplinkError};

/// Calculate the NMEA checksum of a sentence body
///
/// # Arguments
///
/// * `body` - Sentence content between `$` and `*` (e.g. `GPGGA,...`)
///
/// # Examples
///
/// ```
/// use gnss_uplink::gnss::checksum::nmea_checksum;
///
/// assert_eq!(nmea_checksum(b"PMTK101"), 0x32);
/// ```
pub fn nmea_checksum(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |acc, &byte| acc ^ byte)
}

/// Frame a sentence body as `$<body>*HH\r\n`
pub fn frame_sentence(body: &str) -> String {
    format!("${}*{:02X}\r\n", body, nmea_checksum(body.as_bytes()))
}

/// Strip framing from a received sentence and verify its checksum
///
/// Sentences without a `*HH` suffix are accepted unverified, as allowed by
/// NMEA 0183 for some talkers.
///
/// # Returns
///
/// * `Result<&str>` - The sentence body between `$` and `*`
///
/// # Errors
///
/// Returns error if the sentence does not start with `$` or the checksum
/// does not match
pub fn verify_sentence(line: &str) -> Result<&str> {
    let line = line.trim_end_matches(['\r', '\n']);

    let Some(rest) = line.strip_prefix('$') else {
        return Err(UplinkError::Nmea(format!("Missing '$' in {:?}", line)));
    };

    let Some((body, checksum)) = rest.split_once('*') else {
        return Ok(rest);
    };

    let expected = u8::from_str_radix(checksum, 16)
        .map_err(|_| UplinkError::Nmea(format!("Invalid checksum field {:?}", checksum)))?;
    let calculated = nmea_checksum(body.as_bytes());

    if calculated != expected {
        return Err(UplinkError::Nmea(format!(
            "Checksum mismatch: expected 0x{:02X}, got 0x{:02X}",
            expected, calculated
        )));
    }

    Ok(body)
}
