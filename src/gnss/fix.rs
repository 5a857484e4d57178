//! # Position Fix Types
//!
//! The latest-fix record shared between the acquisition worker and the
//! upload cycle, and the samples it is built from.
//!
//! Coordinates are fixed-point microdegrees (degrees × 1e6) so that the
//! decimal rendering in the telemetry URL is exact.

use std::fmt;

/// Microdegrees per degree
pub const MICRODEGREES_PER_DEGREE: i32 = 1_000_000;

/// Validity of a position measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FixState {
    /// No position available
    #[default]
    NoFix,
    /// Horizontal position only
    Fix2D,
    /// Horizontal position and altitude
    Fix3D,
}

impl FixState {
    /// Whether a sample in this state may update the latest fix
    pub fn is_valid(self) -> bool {
        !matches!(self, FixState::NoFix)
    }
}

impl fmt::Display for FixState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixState::NoFix => write!(f, "No Fix"),
            FixState::Fix2D => write!(f, "2D Fix"),
            FixState::Fix3D => write!(f, "3D Fix"),
        }
    }
}

/// UTC time of day of a fix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeOfDay {
    pub hours: u16,
    pub minutes: u16,
    pub seconds: u16,
    pub milliseconds: u16,
}

impl TimeOfDay {
    pub fn new(hours: u16, minutes: u16, seconds: u16, milliseconds: u16) -> Self {
        Self { hours, minutes, seconds, milliseconds }
    }
}

/// Renders as `HH:MM:SS:mmm`
impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:03}",
            self.hours, self.minutes, self.seconds, self.milliseconds
        )
    }
}

/// A single position notification from the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionSample {
    pub fix_state: FixState,
    /// Latitude in microdegrees, north positive
    pub latitude: i32,
    /// Longitude in microdegrees, east positive
    pub longitude: i32,
    /// Altitude above mean sea level in millimetres
    pub altitude: i32,
    /// Estimated horizontal accuracy in centimetres
    pub horizontal_accuracy: i32,
    /// UTC time of day, when the receiver reported one
    pub time_of_day: Option<TimeOfDay>,
}

impl PositionSample {
    /// A sample carrying no position
    pub fn no_fix() -> Self {
        Self {
            fix_state: FixState::NoFix,
            latitude: 0,
            longitude: 0,
            altitude: 0,
            horizontal_accuracy: 0,
            time_of_day: None,
        }
    }
}

/// Most recent valid fix
///
/// All zero with [`FixState::NoFix`] until the first valid sample arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LatestFix {
    pub latitude: i32,
    pub longitude: i32,
    pub altitude: i32,
    pub horizontal_accuracy: i32,
    pub time_of_day: TimeOfDay,
    pub fix_state: FixState,
}

impl LatestFix {
    /// Fold a sample into the record
    ///
    /// Returns `false` and leaves the record untouched for no-fix samples.
    /// A valid sample without a time of day keeps the previous time.
    pub fn apply(&mut self, sample: &PositionSample) -> bool {
        if !sample.fix_state.is_valid() {
            return false;
        }

        self.latitude = sample.latitude;
        self.longitude = sample.longitude;
        self.altitude = sample.altitude;
        self.horizontal_accuracy = sample.horizontal_accuracy;
        self.fix_state = sample.fix_state;
        if let Some(time) = sample.time_of_day {
            self.time_of_day = time;
        }
        true
    }

    /// Latitude as decimal degrees with six fractional digits
    pub fn latitude_degrees(&self) -> String {
        format_microdegrees(self.latitude)
    }

    /// Longitude as decimal degrees with six fractional digits
    pub fn longitude_degrees(&self) -> String {
        format_microdegrees(self.longitude)
    }
}

/// Format microdegrees as decimal degrees without going through floats
///
/// # Examples
///
/// ```
/// use gnss_uplink::gnss::fix::format_microdegrees;
///
/// assert_eq!(format_microdegrees(-122_123_456), "-122.123456");
/// assert_eq!(format_microdegrees(0), "0.000000");
/// ```
pub fn format_microdegrees(value: i32) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = value.unsigned_abs();
    let scale = MICRODEGREES_PER_DEGREE as u32;
    format!("{}{}.{:06}", sign, magnitude / scale, magnitude % scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(fix_state: FixState, latitude: i32, longitude: i32) -> PositionSample {
        PositionSample {
            fix_state,
            latitude,
            longitude,
            altitude: 12_500,
            horizontal_accuracy: 350,
            time_of_day: Some(TimeOfDay::new(14, 5, 9, 250)),
        }
    }

    #[test]
    fn test_default_is_zero_no_fix() {
        let fix = LatestFix::default();
        assert_eq!(fix.latitude, 0);
        assert_eq!(fix.longitude, 0);
        assert_eq!(fix.altitude, 0);
        assert_eq!(fix.horizontal_accuracy, 0);
        assert_eq!(fix.time_of_day, TimeOfDay::default());
        assert_eq!(fix.fix_state, FixState::NoFix);
    }

    #[test]
    fn test_apply_valid_sample() {
        let mut fix = LatestFix::default();
        assert!(fix.apply(&sample(FixState::Fix3D, 37_123_456, -122_123_456)));
        assert_eq!(fix.latitude, 37_123_456);
        assert_eq!(fix.longitude, -122_123_456);
        assert_eq!(fix.altitude, 12_500);
        assert_eq!(fix.horizontal_accuracy, 350);
        assert_eq!(fix.fix_state, FixState::Fix3D);
        assert_eq!(fix.time_of_day, TimeOfDay::new(14, 5, 9, 250));
    }

    #[test]
    fn test_no_fix_sample_does_not_mutate() {
        let mut fix = LatestFix::default();
        fix.apply(&sample(FixState::Fix2D, 1, 2));
        let before = fix;

        assert!(!fix.apply(&sample(FixState::NoFix, 99, 99)));
        assert_eq!(fix, before);
    }

    #[test]
    fn test_missing_time_keeps_previous_time() {
        let mut fix = LatestFix::default();
        fix.apply(&sample(FixState::Fix3D, 1, 2));

        let mut untimed = sample(FixState::Fix2D, 3, 4);
        untimed.time_of_day = None;
        assert!(fix.apply(&untimed));

        assert_eq!(fix.latitude, 3);
        assert_eq!(fix.longitude, 4);
        assert_eq!(fix.time_of_day, TimeOfDay::new(14, 5, 9, 250));
    }

    #[test]
    fn test_last_valid_sample_wins() {
        let samples = [
            sample(FixState::Fix2D, 10, 20),
            sample(FixState::NoFix, 0, 0),
            sample(FixState::Fix3D, 30, 40),
            PositionSample::no_fix(),
        ];

        let mut fix = LatestFix::default();
        for s in &samples {
            fix.apply(s);
        }

        assert_eq!(fix.latitude, 30);
        assert_eq!(fix.longitude, 40);
        assert_eq!(fix.fix_state, FixState::Fix3D);
    }

    #[test]
    fn test_format_microdegrees() {
        assert_eq!(format_microdegrees(37_123_456), "37.123456");
        assert_eq!(format_microdegrees(-122_123_456), "-122.123456");
        assert_eq!(format_microdegrees(0), "0.000000");
        assert_eq!(format_microdegrees(-500_000), "-0.500000");
        assert_eq!(format_microdegrees(7), "0.000007");
        assert_eq!(format_microdegrees(i32::MIN), "-2147.483648");
    }

    #[test]
    fn test_time_of_day_display() {
        assert_eq!(TimeOfDay::new(14, 5, 9, 250).to_string(), "14:05:09:250");
        assert_eq!(TimeOfDay::new(0, 0, 0, 7).to_string(), "00:00:00:007");
        assert_eq!(TimeOfDay::default().to_string(), "00:00:00:000");
    }

    #[test]
    fn test_fix_state_display() {
        assert_eq!(FixState::NoFix.to_string(), "No Fix");
        assert_eq!(FixState::Fix2D.to_string(), "2D Fix");
        assert_eq!(FixState::Fix3D.to_string(), "3D Fix");
        assert!(!FixState::NoFix.is_valid());
        assert!(FixState::Fix2D.is_valid());
    }
}
