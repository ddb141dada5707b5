//! Device answer payloads.
//!
//! These are the bodies the firmware writes back over the serial line. The
//! bridge itself forwards answers verbatim; the types here are used by the
//! firmware emulator and by anything that wants a structured view.
//!
//! | Answer | Body |
//! |--------|------|
//! | Actuator | `{"opstatus":"ok","id":3}` |
//! | Accelerometer | `{"opstatus":"ok","measure":[x,y,z],"type":"accelerometer"}` |
//! | Temperature | `{"opstatus":"ok","measure":25.0625,"type":"temperature"}` |
//! | Unknown command | `{"opstatus":"err","code":1}` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// Temperature Constants
// ============================================================================

/// ADC reference voltage in millivolts.
pub const ADC_REFERENCE_MV: f64 = 3300.0;

/// Full-scale value of the 12-bit ADC.
pub const ADC_FULL_SCALE: f64 = 4095.0;

/// Sensor output at 25 °C, in volts.
pub const SENSOR_V25: f64 = 0.760;

/// Sensor slope, in volts per °C.
pub const SENSOR_SLOPE: f64 = 0.0025;

/// Temperature the reference voltage corresponds to.
pub const SENSOR_REFERENCE_C: f64 = 25.0;

/// Error code the firmware reports for an unknown command.
pub const DEVICE_ERROR_UNKNOWN_COMMAND: i32 = 1;

// ============================================================================
// Temperature
// ============================================================================

/// Converts a raw ADC sample from the internal sensor to °C.
#[must_use]
pub fn temperature_from_sample(sample: u16) -> f64 {
    let millivolts = f64::from(sample) * ADC_REFERENCE_MV / ADC_FULL_SCALE;
    let volts = millivolts / 1000.0;
    (volts - SENSOR_V25) / SENSOR_SLOPE + SENSOR_REFERENCE_C
}

/// Formats a measure as `<integer>.<four fractional digits>`.
///
/// Both parts are truncated, not rounded; the fractional part keeps its
/// leading zeros (`3.0039`, not `3.39`).
#[must_use]
pub fn format_measure(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let magnitude = value.abs();
    let integer = magnitude.trunc();
    let fraction = ((magnitude - integer) * 10_000.0).trunc();
    format!("{sign}{integer:.0}.{fraction:04.0}")
}

// ============================================================================
// DevicePayload
// ============================================================================

/// A structured device answer.
#[derive(Debug, Clone, PartialEq)]
pub enum DevicePayload {
    /// An actuator command was applied.
    Actuator {
        /// Actuator the command addressed.
        id: i32,
    },
    /// Accelerometer sample.
    Accelerometer {
        /// X, Y and Z axes.
        measure: [i16; 3],
    },
    /// Temperature reading in °C.
    Temperature {
        /// Converted reading.
        celsius: f64,
    },
    /// The firmware rejected the command.
    Failure {
        /// Firmware error code.
        code: i32,
    },
}

impl DevicePayload {
    /// Returns `true` for success payloads.
    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Failure { .. })
    }
}

impl fmt::Display for DevicePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actuator { id } => write!(f, r#"{{"opstatus":"ok","id":{id}}}"#),
            Self::Accelerometer { measure: [x, y, z] } => write!(
                f,
                r#"{{"opstatus":"ok","measure":[{x},{y},{z}],"type":"accelerometer"}}"#
            ),
            Self::Temperature { celsius } => write!(
                f,
                r#"{{"opstatus":"ok","measure":{},"type":"temperature"}}"#,
                format_measure(*celsius)
            ),
            Self::Failure { code } => write!(f, r#"{{"opstatus":"err","code":{code}}}"#),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::Value;

    #[test]
    fn test_temperature_reference_point() {
        // 0.760 V is 943.06 counts: sample 943 sits just under 25 °C.
        let celsius = temperature_from_sample(943);
        assert!((celsius - 25.0).abs() < 0.05, "{celsius}");
    }

    #[test]
    fn test_temperature_full_scale() {
        let celsius = temperature_from_sample(4095);
        assert!((celsius - 1041.0).abs() < 1e-6, "{celsius}");
    }

    #[test]
    fn test_temperature_zero_sample_is_negative() {
        let celsius = temperature_from_sample(0);
        assert!((celsius + 279.0).abs() < 1e-6, "{celsius}");
    }

    #[test]
    fn test_format_measure_keeps_leading_zeros() {
        assert_eq!(format_measure(3.003_906_25), "3.0039");
        assert_eq!(format_measure(25.0625), "25.0625");
        assert_eq!(format_measure(678.5), "678.5000");
        assert_eq!(format_measure(12.0), "12.0000");
    }

    #[test]
    fn test_format_measure_negative() {
        assert_eq!(format_measure(-0.5), "-0.5000");
        assert_eq!(format_measure(-279.0), "-279.0000");
    }

    #[test]
    fn test_payload_shapes() {
        assert_eq!(
            DevicePayload::Actuator { id: 3 }.to_string(),
            r#"{"opstatus":"ok","id":3}"#
        );
        assert_eq!(
            DevicePayload::Accelerometer { measure: [-12, 40, 1000] }.to_string(),
            r#"{"opstatus":"ok","measure":[-12,40,1000],"type":"accelerometer"}"#
        );
        assert_eq!(
            DevicePayload::Failure { code: 1 }.to_string(),
            r#"{"opstatus":"err","code":1}"#
        );
    }

    #[test]
    fn test_temperature_payload_is_valid_json() {
        let payload = DevicePayload::Temperature { celsius: 25.0625 };
        let value: Value = serde_json::from_str(&payload.to_string()).expect("json");
        assert_eq!(value["type"], "temperature");
        assert_eq!(value["measure"].as_f64(), Some(25.0625));
    }

    #[test]
    fn test_is_ok() {
        assert!(DevicePayload::Actuator { id: 4 }.is_ok());
        assert!(!DevicePayload::Failure { code: 1 }.is_ok());
    }
}
