use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Type K reference curve (NIST ITS-90 inverse polynomials)
// ---------------------------------------------------------------------------

/// One inverse-polynomial segment: valid for `min_mv..=max_mv`, giving °C.
struct Segment {
    min_mv: f64,
    max_mv: f64,
    coefficients: &'static [f64],
}

const TYPE_K_INVERSE: [Segment; 3] = [
    // -200 °C .. 0 °C
    Segment {
        min_mv: -5.891,
        max_mv: 0.0,
        coefficients: &[
            0.0,
            2.517_346_2e1,
            -1.166_287_8,
            -1.083_363_8,
            -8.977_354_0e-1,
            -3.734_237_7e-1,
            -8.663_264_3e-2,
            -1.045_059_8e-2,
            -5.192_057_7e-4,
        ],
    },
    // 0 °C .. 500 °C
    Segment {
        min_mv: 0.0,
        max_mv: 20.644,
        coefficients: &[
            0.0,
            2.508_355e1,
            7.860_106e-2,
            -2.503_131e-1,
            8.315_270e-2,
            -1.228_034e-2,
            9.804_036e-4,
            -4.413_030e-5,
            1.057_734e-6,
            -1.052_755e-8,
        ],
    },
    // 500 °C .. 1372 °C
    Segment {
        min_mv: 20.644,
        max_mv: 54.886,
        coefficients: &[
            -1.318_058e2,
            4.830_222e1,
            -1.646_031,
            5.464_731e-2,
            -9.650_715e-4,
            8.802_193e-6,
            -3.110_810e-8,
        ],
    },
];

/// Type K thermocouple EMF (mV, 0 °C reference junction) to temperature (°C).
///
/// Returns `None` outside the tabulated range.
pub fn type_k_inverse(millivolts: f64) -> Option<f64> {
    if !millivolts.is_finite() {
        return None;
    }
    if millivolts < TYPE_K_INVERSE[0].min_mv {
        return solve_cryogenic(millivolts);
    }
    let segment = TYPE_K_INVERSE
        .iter()
        .find(|s| millivolts >= s.min_mv && millivolts <= s.max_mv)?;
    Some(horner(segment.coefficients, millivolts))
}

/// Highest order first.
fn horner(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// ITS-90 type K reference function for -270 °C .. 0 °C (°C → mV).
const TYPE_K_FORWARD_LOW: [f64; 11] = [
    0.0,
    3.945_012_802_5e-2,
    2.362_237_359_8e-5,
    -3.285_890_678_4e-7,
    -4.990_482_877_7e-9,
    -6.750_905_917_3e-11,
    -5.741_032_742_8e-13,
    -3.108_887_289_4e-15,
    -1.045_160_936_5e-17,
    -1.988_926_687_8e-20,
    -1.632_269_748_6e-23,
];

const TYPE_K_MIN_CELSIUS: f64 = -270.0;
const INVERSE_MIN_CELSIUS: f64 = -200.0;

/// No inverse polynomial covers -270 °C .. -200 °C; bisect the forward
/// function there instead. It is monotonic over that interval.
fn solve_cryogenic(millivolts: f64) -> Option<f64> {
    let (mut lo, mut hi) = (TYPE_K_MIN_CELSIUS, INVERSE_MIN_CELSIUS);
    if millivolts < horner(&TYPE_K_FORWARD_LOW, lo) {
        return None;
    }
    for _ in 0..60 {
        let mid = 0.5 * (lo + hi);
        if horner(&TYPE_K_FORWARD_LOW, mid) < millivolts {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Some(0.5 * (lo + hi))
}

// ---------------------------------------------------------------------------
// Calibration – the instrument-level conversion
// ---------------------------------------------------------------------------

/// Voltage-to-temperature conversion for the simulator board.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Readings below this voltage have no physical temperature.
    pub lower_bound_volts: f64,
    /// Scale from board volts to thermocouple millivolts.
    pub millivolts_per_volt: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            lower_bound_volts: -7.45,
            millivolts_per_volt: 100.0,
        }
    }
}

impl Calibration {
    /// Convert a board voltage to °C. `None` is the invalid-conversion
    /// marker, never a placeholder temperature.
    pub fn to_temperature(&self, volts: f64) -> Option<f64> {
        if !volts.is_finite() || volts < self.lower_bound_volts {
            return None;
        }
        type_k_inverse(volts * self.millivolts_per_volt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn reference_points_match_type_k_table() {
        assert_eq!(type_k_inverse(0.0), Some(0.0));
        // ITS-90 table: 100 °C = 4.096 mV, 500 °C = 20.644 mV, 1000 °C = 41.276 mV,
        // -100 °C = -3.554 mV.
        assert!(close(type_k_inverse(4.096).unwrap(), 100.0, 0.1));
        assert!(close(type_k_inverse(20.644).unwrap(), 500.0, 0.1));
        assert!(close(type_k_inverse(41.276).unwrap(), 1000.0, 0.1));
        assert!(close(type_k_inverse(-3.554).unwrap(), -100.0, 0.1));
    }

    #[test]
    fn outside_table_is_none() {
        assert_eq!(type_k_inverse(-6.5), None);
        assert_eq!(type_k_inverse(60.0), None);
        assert_eq!(type_k_inverse(f64::NAN), None);
    }

    #[test]
    fn cryogenic_range_reaches_minus_270() {
        // ITS-90 table: -240 °C = -6.344 mV, -270 °C = -6.458 mV.
        assert!(close(type_k_inverse(-6.344).unwrap(), -240.0, 0.2));
        assert!(close(type_k_inverse(-6.4577).unwrap(), -270.0, 0.5));
        // Joins the inverse polynomial near -200 °C.
        assert!(close(type_k_inverse(-5.8915).unwrap(), -200.0, 0.1));
        assert!(close(type_k_inverse(-5.891).unwrap(), -200.0, 0.1));

        let t = Calibration::default().to_temperature(-0.062).unwrap();
        assert!(close(t, -223.8, 0.2), "got {t}");
    }

    #[test]
    fn below_lower_bound_is_invalid() {
        let cal = Calibration::default();
        assert_eq!(cal.to_temperature(-10.0), None);
        assert_eq!(cal.to_temperature(-7.46), None);
        for v in [-100.0, -8.0, -7.450_001] {
            assert!(cal.to_temperature(v).is_none(), "{v} should be invalid");
        }
    }

    #[test]
    fn in_range_voltage_uses_gain() {
        let cal = Calibration::default();
        let t = cal.to_temperature(0.04096).unwrap();
        assert!(close(t, 100.0, 0.1), "got {t}");
    }

    #[test]
    fn lookup_failure_is_soft() {
        // Above the lower bound but beyond the reference curve.
        let cal = Calibration::default();
        assert_eq!(cal.to_temperature(5.0), None);
    }
}
