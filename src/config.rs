//! Per-capture configuration

use crate::timestamp::{parse_timezone, TimestampLayout, TzPolicy};
use crate::types::{OrthoError, OrthoResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default no-data sentinel of MicaSense orthomosaics
pub const DEFAULT_NODATA: f64 = 65535.0;

/// Orthoimage configuration.
///
/// Only the timestamp fields and the no-data fallback are consumed; the
/// timezone policy is chosen by precedence: `coords`, then `utc_offset`,
/// then the named zone `tz`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrthoConfig {
    /// strftime-style format of the capture id (`%.f` for fractional seconds)
    pub dt_format: String,
    /// IANA timezone name; output zone when `utc_offset` is set
    pub tz: String,
    pub skip_chars: usize,
    pub end_chars: usize,
    /// Fixed UTC offset in hours of the filename clock
    pub utc_offset: Option<f64>,
    /// (lat, lon) used to look up the timezone
    pub coords: Option<(f64, f64)>,
    /// No-data value used when the raster does not record one
    pub nodata: f64,
}

impl Default for OrthoConfig {
    fn default() -> Self {
        Self {
            dt_format: "%Y-%m-%d %H:%M:%S%.f".to_string(),
            tz: "America/Los_Angeles".to_string(),
            skip_chars: 0,
            end_chars: 0,
            utc_offset: None,
            coords: None,
            nodata: DEFAULT_NODATA,
        }
    }
}

impl OrthoConfig {
    /// Config for `YYYYmmdd_HHMMSS` capture ids in the given zone
    pub fn micasense(tz: impl Into<String>) -> Self {
        let layout = TimestampLayout::micasense_ortho();
        Self {
            dt_format: layout.format,
            tz: tz.into(),
            skip_chars: layout.skip_chars,
            end_chars: layout.end_chars,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> OrthoResult<Self> {
        serde_json::from_str(json).map_err(|e| OrthoError::Config(e.to_string()))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> OrthoResult<Self> {
        log::debug!("Reading ortho config from: {}", path.as_ref().display());
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn layout(&self) -> TimestampLayout {
        TimestampLayout::new(self.skip_chars, self.end_chars, self.dt_format.clone())
    }

    pub fn tz_policy(&self) -> OrthoResult<TzPolicy> {
        if let Some((lat, lon)) = self.coords {
            return Ok(TzPolicy::Coordinates { lat, lon });
        }
        let tz = parse_timezone(&self.tz)?;
        match self.utc_offset {
            Some(hours) => Ok(TzPolicy::FixedOffset { hours, output: tz }),
            None => Ok(TzPolicy::Named(tz)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_take_defaults() {
        let config = OrthoConfig::from_json_str(r#"{"dt_format": "%Y%m%d_%H%M%S"}"#).unwrap();
        assert_eq!(config.dt_format, "%Y%m%d_%H%M%S");
        assert_eq!(config.tz, "America/Los_Angeles");
        assert_eq!(config.nodata, DEFAULT_NODATA);
        assert_eq!(config.skip_chars, 0);
    }

    #[test]
    fn test_policy_precedence() {
        let mut config = OrthoConfig::micasense("America/Los_Angeles");
        assert!(matches!(config.tz_policy().unwrap(), TzPolicy::Named(_)));

        config.utc_offset = Some(-8.0);
        assert!(matches!(config.tz_policy().unwrap(), TzPolicy::FixedOffset { .. }));

        config.coords = Some((34.0, -120.0));
        assert!(matches!(config.tz_policy().unwrap(), TzPolicy::Coordinates { .. }));
    }

    #[test]
    fn test_invalid_zone_name() {
        let config = OrthoConfig::micasense("Mars/Olympus_Mons");
        assert!(matches!(config.tz_policy(), Err(OrthoError::InvalidTimezone(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            OrthoConfig::from_json_str("{dt_format"),
            Err(OrthoError::Config(_))
        ));
    }
}
