//! Capture identifiers and acquisition times from filenames.
//!
//! Filenames written by the flight software and loggers carry their
//! acquisition time as a fixed-width substring (e.g.
//! `DL222_20210324_115832.txt`). The wall-clock value in the filename is
//! local time, so attaching a zone annotates it without shifting the clock;
//! only the fixed-offset policy converts between zones.

use crate::types::{OrthoError, OrthoResult};
use chrono::{DateTime, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

lazy_static! {
    static ref CAPTURE_TOKEN: Regex = Regex::new(r"[0-9]\w+").unwrap();
    static ref ZONE_FINDER: tzf_rs::DefaultFinder = tzf_rs::DefaultFinder::new();
}

/// How a naive timestamp gets its timezone
#[derive(Debug, Clone, PartialEq)]
pub enum TzPolicy {
    /// Localise the wall clock in a named IANA zone
    Named(Tz),
    /// Localise in the zone containing a (lat, lon) location
    Coordinates { lat: f64, lon: f64 },
    /// Attach a fixed UTC offset (hours), then convert to `output`
    FixedOffset { hours: f64, output: Tz },
}

impl TzPolicy {
    pub fn named(name: &str) -> OrthoResult<Self> {
        Ok(TzPolicy::Named(parse_timezone(name)?))
    }
}

/// Fixed-width timestamp layout inside a filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampLayout {
    pub skip_chars: usize,
    pub end_chars: usize,
    pub format: String,
}

impl TimestampLayout {
    pub fn new(skip_chars: usize, end_chars: usize, format: impl Into<String>) -> Self {
        Self {
            skip_chars,
            end_chars,
            format: format.into(),
        }
    }

    /// Campbell DL222 logger files: `DL222_YYYYmmdd_HHMMSS.txt`
    pub fn dl222() -> Self {
        Self::new(6, 0, "%Y%m%d_%H%M%S")
    }

    /// Capture id of a MicaSense orthomosaic: `YYYYmmdd_HHMMSS`
    pub fn micasense_ortho() -> Self {
        Self::new(0, 0, "%Y%m%d_%H%M%S")
    }

    pub fn resolve(&self, filename: &str, policy: &TzPolicy) -> OrthoResult<DateTime<Tz>> {
        filename_to_timestamp(filename, self.skip_chars, self.end_chars, &self.format, policy)
    }
}

/// Parse an IANA timezone name
pub fn parse_timezone(name: &str) -> OrthoResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| OrthoError::InvalidTimezone(name.to_string()))
}

/// Timezone containing a geographic location
pub fn zone_at(lat: f64, lon: f64) -> OrthoResult<Tz> {
    let name = ZONE_FINDER.get_tz_name(lon, lat);
    if name.is_empty() {
        return Err(OrthoError::InvalidTimezone(format!(
            "no timezone found at lat={}, lon={}",
            lat, lon
        )));
    }
    log::debug!("Resolved ({}, {}) to timezone {}", lat, lon, name);
    parse_timezone(name)
}

/// First digit-initiated word token of a name (`[0-9]\w+`)
pub fn extract_capture_id(name: &str) -> OrthoResult<String> {
    CAPTURE_TOKEN
        .find(name)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| OrthoError::InvalidFilename(name.to_string()))
}

/// Filename without directories or extension
pub fn file_base_name(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Convert a filename to a timezone-aware timestamp.
///
/// `skip_chars` and `end_chars` trim characters from the start and end of
/// the base name (extension excluded) before parsing with `format`.
pub fn filename_to_timestamp(
    filename: &str,
    skip_chars: usize,
    end_chars: usize,
    format: &str,
    policy: &TzPolicy,
) -> OrthoResult<DateTime<Tz>> {
    let base = file_base_name(filename);
    let chars: Vec<char> = base.chars().collect();

    if skip_chars + end_chars > chars.len() {
        return Err(OrthoError::TimestampParse {
            input: base.clone(),
            format: format.to_string(),
            reason: format!(
                "cannot skip {} leading and {} trailing characters of a {}-character name",
                skip_chars,
                end_chars,
                chars.len()
            ),
        });
    }

    let slice: String = chars[skip_chars..chars.len() - end_chars].iter().collect();
    let naive = parse_naive(&slice, format)?;
    make_tz_aware(naive, policy)
}

fn parse_naive(input: &str, format: &str) -> OrthoResult<NaiveDateTime> {
    match NaiveDateTime::parse_from_str(input, format) {
        Ok(dt) => Ok(dt),
        Err(e) => {
            // Date-only formats resolve to midnight
            if let Ok(date) = NaiveDate::parse_from_str(input, format) {
                if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                    return Ok(dt);
                }
            }
            Err(OrthoError::TimestampParse {
                input: input.to_string(),
                format: format.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

/// Attach a timezone to a naive timestamp according to `policy`
pub fn make_tz_aware(naive: NaiveDateTime, policy: &TzPolicy) -> OrthoResult<DateTime<Tz>> {
    match policy {
        TzPolicy::Named(tz) => localize(naive, tz),
        TzPolicy::Coordinates { lat, lon } => {
            let tz = zone_at(*lat, *lon)?;
            localize(naive, &tz)
        }
        TzPolicy::FixedOffset { hours, output } => {
            let seconds = (hours * 3600.0).round() as i32;
            let offset = FixedOffset::east_opt(seconds).ok_or_else(|| {
                OrthoError::InvalidTimezone(format!("UTC offset out of range: {} h", hours))
            })?;
            let fixed = offset.from_local_datetime(&naive).single().ok_or_else(|| {
                OrthoError::TimestampParse {
                    input: naive.to_string(),
                    format: format!("UTC{:+}", hours),
                    reason: "cannot attach fixed offset".to_string(),
                }
            })?;
            Ok(fixed.with_timezone(output))
        }
    }
}

fn localize(naive: NaiveDateTime, tz: &Tz) -> OrthoResult<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        // Repeated hour when DST ends: the later reading is standard time
        LocalResult::Ambiguous(_, standard) => {
            log::warn!("Ambiguous local time {} in {}, using standard time", naive, tz);
            Ok(standard)
        }
        // Skipped hour when DST starts: keep the offset in effect before the jump
        LocalResult::None => {
            let before = naive - Duration::hours(1);
            let offset = tz
                .offset_from_local_datetime(&before)
                .earliest()
                .map(|o| o.fix())
                .ok_or_else(|| OrthoError::InvalidTimezone(format!("no offset for {} in {}", naive, tz)))?;
            log::warn!("Local time {} does not exist in {}, using offset {}", naive, tz, offset);
            let fixed = offset.from_local_datetime(&naive).single().ok_or_else(|| {
                OrthoError::InvalidTimezone(format!("cannot attach offset {} to {}", offset, naive))
            })?;
            Ok(fixed.with_timezone(tz))
        }
    }
}

/// Degrees, minutes, seconds to decimal degrees
pub fn dms_to_dd(dms: [f64; 3]) -> f64 {
    dms[0] + dms[1] / 60.0 + dms[2] / 3600.0
}

/// Round a timestamp to the nearest tenth of a second, keeping its zone
pub fn round_to_decisecond<T: TimeZone>(dt: &DateTime<T>) -> DateTime<T> {
    const STEP_MICROS: i64 = 100_000;
    let micros = dt.timestamp() * 1_000_000 + i64::from(dt.timestamp_subsec_micros());
    let rounded = (micros + STEP_MICROS / 2).div_euclid(STEP_MICROS) * STEP_MICROS;
    let secs = rounded.div_euclid(1_000_000);
    let nanos = (rounded.rem_euclid(1_000_000) * 1_000) as u32;
    match Utc.timestamp_opt(secs, nanos).single() {
        Some(utc) => utc.with_timezone(&dt.timezone()),
        None => dt.clone(),
    }
}
