//! # NMEA Sentence Parser
//!
//! Turns `GGA` sentences from a GNSS receiver into [`PositionSample`]s.
//!
//! Only `GGA` carries everything the uplink needs (time, position, fix
//! quality, HDOP, altitude), so every other sentence type is skipped.
//!
//! ## Fix state
//!
//! - Quality `0` or an empty position: no fix
//! - Altitude present: 3D fix
//! - Otherwise: 2D fix

use chrono::{NaiveTime, Timelike};

use super::checksum::verify_sentence;
use super::fix::{FixState, PositionSample, TimeOfDay};
use crate::error::{Result, UplinkError};

/// User equivalent range error used to turn HDOP into centimetres
///
/// A rough estimate; receivers that report real accuracy use other sentences.
const HDOP_TO_ACCURACY_CM: f64 = 500.0;

const MAX_LATITUDE_DEGREES: f64 = 90.0;
const MAX_LONGITUDE_DEGREES: f64 = 180.0;

/// Parse a raw NMEA line
///
/// # Returns
///
/// * `Ok(Some(sample))` - A `GGA` sentence
/// * `Ok(None)` - A valid sentence of another type
///
/// # Errors
///
/// Returns error if the framing, checksum, or a `GGA` field is malformed
///
/// # Examples
///
/// ```
/// use gnss_uplink::gnss::nmea::parse_sentence;
/// use gnss_uplink::gnss::fix::FixState;
///
/// let line = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
/// let sample = parse_sentence(line)?.unwrap();
/// assert_eq!(sample.fix_state, FixState::Fix3D);
/// assert_eq!(sample.latitude, 48_117_300);
/// # Ok::<(), gnss_uplink::error::UplinkError>(())
/// ```
pub fn parse_sentence(line: &str) -> Result<Option<PositionSample>> {
    let body = verify_sentence(line)?;
    let fields: Vec<&str> = body.split(',').collect();

    let kind = fields[0];
    if kind.len() != 5 || !kind.ends_with("GGA") {
        return Ok(None);
    }

    parse_gga(&fields).map(Some)
}

/// Parse the comma-separated fields of a `GGA` sentence
fn parse_gga(fields: &[&str]) -> Result<PositionSample> {
    if fields.len() < 10 {
        return Err(UplinkError::Nmea(format!(
            "GGA sentence too short: {} fields",
            fields.len()
        )));
    }

    let time_of_day = parse_time(fields[1])?;

    let quality: u8 = match fields[6] {
        "" => 0,
        q => q
            .parse()
            .map_err(|_| UplinkError::Nmea(format!("Invalid fix quality {:?}", q)))?,
    };

    if quality == 0 || fields[2].is_empty() || fields[4].is_empty() {
        return Ok(PositionSample { time_of_day, ..PositionSample::no_fix() });
    }

    let latitude = parse_coordinate(fields[2], fields[3], ('N', 'S'), MAX_LATITUDE_DEGREES)?;
    let longitude = parse_coordinate(fields[4], fields[5], ('E', 'W'), MAX_LONGITUDE_DEGREES)?;

    let horizontal_accuracy = match fields[8] {
        "" => 0,
        hdop => {
            let hdop: f64 = hdop
                .parse()
                .ok()
                .filter(|h: &f64| h.is_finite() && *h >= 0.0)
                .ok_or_else(|| UplinkError::Nmea(format!("Invalid HDOP {:?}", hdop)))?;
            (hdop * HDOP_TO_ACCURACY_CM).round() as i32
        }
    };

    let (fix_state, altitude) = match fields[9] {
        "" => (FixState::Fix2D, 0),
        alt => {
            let metres: f64 = alt
                .parse()
                .ok()
                .filter(|m: &f64| m.is_finite())
                .ok_or_else(|| UplinkError::Nmea(format!("Invalid altitude {:?}", alt)))?;
            (FixState::Fix3D, (metres * 1000.0).round() as i32)
        }
    };

    Ok(PositionSample {
        fix_state,
        latitude,
        longitude,
        altitude,
        horizontal_accuracy,
        time_of_day,
    })
}

/// Parse `hhmmss[.sss]` into a time of day
///
/// An empty field means the receiver has no time yet.
fn parse_time(field: &str) -> Result<Option<TimeOfDay>> {
    if field.is_empty() {
        return Ok(None);
    }

    let (whole, fraction) = field.split_once('.').unwrap_or((field, ""));

    let time = NaiveTime::parse_from_str(whole, "%H%M%S")
        .map_err(|e| UplinkError::Nmea(format!("Invalid time {:?}: {}", field, e)))?;

    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(UplinkError::Nmea(format!("Invalid time fraction {:?}", field)));
    }

    // Left-align to three digits: ".5" is 500 ms, ".25" is 250 ms
    let milliseconds = fraction
        .bytes()
        .chain(std::iter::repeat(b'0'))
        .take(3)
        .fold(0u16, |acc, digit| acc * 10 + u16::from(digit - b'0'));

    Ok(Some(TimeOfDay::new(
        time.hour() as u16,
        time.minute() as u16,
        time.second() as u16,
        milliseconds,
    )))
}

/// Parse `(d)ddmm.mmmm` plus hemisphere into signed microdegrees
///
/// Only digits and a single decimal point are accepted, so signs, exponents,
/// `nan` and `inf` are rejected before conversion.
fn parse_coordinate(
    value: &str,
    hemisphere: &str,
    (positive, negative): (char, char),
    max_degrees: f64,
) -> Result<i32> {
    let well_formed = !value.is_empty()
        && value.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        && value.bytes().filter(|&b| b == b'.').count() <= 1;
    if !well_formed {
        return Err(UplinkError::Nmea(format!("Invalid coordinate {:?}", value)));
    }

    let raw: f64 = value
        .parse()
        .map_err(|_| UplinkError::Nmea(format!("Invalid coordinate {:?}", value)))?;

    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    if minutes >= 60.0 {
        return Err(UplinkError::Nmea(format!("Minutes out of range in {:?}", value)));
    }

    let total = degrees + minutes / 60.0;
    if !total.is_finite() || total > max_degrees {
        return Err(UplinkError::Nmea(format!("Coordinate out of range in {:?}", value)));
    }

    let microdegrees = (total * 1_000_000.0).round() as i32;

    match hemisphere.chars().next() {
        Some(c) if c == positive => Ok(microdegrees),
        Some(c) if c == negative => Ok(-microdegrees),
        _ => Err(UplinkError::Nmea(format!("Invalid hemisphere {:?}", hemisphere))),
    }
}
