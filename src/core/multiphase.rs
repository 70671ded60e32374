//! Simplified density-based multiphase property estimation and the
//! process quality alarms derived from it.

pub use crate::domain::model::PhaseFractions;
use serde::{Deserialize, Serialize};
use std::fmt;

/// kg/m³
pub const OIL_DENSITY: f64 = 850.0;
/// kg/m³
pub const WATER_DENSITY: f64 = 1000.0;

/// 由混合密度估算氣體體積分率、含水率與水中含油
pub fn calculate_phase_fractions(measured_density: f64) -> PhaseFractions {
    let gas_volume_fraction = if measured_density < OIL_DENSITY {
        (OIL_DENSITY - measured_density) / OIL_DENSITY * 100.0
    } else {
        0.0
    };

    let liquid_density = measured_density * (1.0 - gas_volume_fraction / 100.0);
    let water_cut = if liquid_density > OIL_DENSITY {
        (liquid_density - OIL_DENSITY) / (WATER_DENSITY - OIL_DENSITY) * 100.0
    } else {
        0.0
    };

    let oil_in_water_ppm = if water_cut > 50.0 {
        (100.0 - water_cut) * 10_000.0
    } else {
        0.0
    };

    PhaseFractions {
        gas_volume_fraction,
        water_cut,
        oil_in_water_ppm,
    }
}

/// 反推：由 GVF 與含水率求混合密度 (用於回放生產數據)
pub fn density_from_fractions(gas_volume_fraction: f64, water_cut: f64) -> f64 {
    let liquid_density = OIL_DENSITY + water_cut / 100.0 * (WATER_DENSITY - OIL_DENSITY);
    liquid_density * (1.0 - gas_volume_fraction / 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmThresholds {
    /// 環保上限 (ppm)
    pub max_oil_in_water: f64,
    /// %
    pub max_gas_volume_fraction: f64,
    /// %
    pub max_water_cut: f64,
}

impl Default for AlarmThresholds {
    fn default() -> Self {
        Self {
            max_oil_in_water: 1000.0,
            max_gas_volume_fraction: 95.0,
            max_water_cut: 90.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessAlarm {
    HighOilInWater,
    HighGasContent,
    HighWaterCut,
}

impl fmt::Display for ProcessAlarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessAlarm::HighOilInWater => "HIGH_OIL_IN_WATER",
            ProcessAlarm::HighGasContent => "HIGH_GAS_CONTENT",
            ProcessAlarm::HighWaterCut => "HIGH_WATER_CUT",
        };
        f.write_str(name)
    }
}

pub fn evaluate_alarms(fractions: &PhaseFractions, thresholds: &AlarmThresholds) -> Vec<ProcessAlarm> {
    let mut alarms = Vec::new();
    if fractions.oil_in_water_ppm > thresholds.max_oil_in_water {
        alarms.push(ProcessAlarm::HighOilInWater);
    }
    if fractions.gas_volume_fraction > thresholds.max_gas_volume_fraction {
        alarms.push(ProcessAlarm::HighGasContent);
    }
    if fractions.water_cut > thresholds.max_water_cut {
        alarms.push(ProcessAlarm::HighWaterCut);
    }
    alarms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_pure_oil_density() {
        let f = calculate_phase_fractions(850.0);
        assert_eq!(f.gas_volume_fraction, 0.0);
        assert_eq!(f.water_cut, 0.0);
        assert_eq!(f.oil_in_water_ppm, 0.0);
    }

    #[test]
    fn test_light_mixture_is_gas() {
        let f = calculate_phase_fractions(425.0);
        assert!(approx(f.gas_volume_fraction, 50.0));
        // 液相密度 212.5 < 850，不計含水
        assert_eq!(f.water_cut, 0.0);
    }

    #[test]
    fn test_heavy_mixture_is_water() {
        let f = calculate_phase_fractions(925.0);
        assert_eq!(f.gas_volume_fraction, 0.0);
        assert!(approx(f.water_cut, 50.0));
        assert_eq!(f.oil_in_water_ppm, 0.0);

        let f = calculate_phase_fractions(985.0);
        assert!(approx(f.water_cut, 90.0));
        assert!((f.oil_in_water_ppm - 100_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_density_round_trip_without_gas() {
        let density = density_from_fractions(0.0, 40.0);
        let f = calculate_phase_fractions(density);
        assert!(approx(f.water_cut, 40.0));
    }

    #[test]
    fn test_alarm_evaluation() {
        let thresholds = AlarmThresholds::default();
        let calm = PhaseFractions {
            gas_volume_fraction: 10.0,
            water_cut: 30.0,
            oil_in_water_ppm: 0.0,
        };
        assert!(evaluate_alarms(&calm, &thresholds).is_empty());

        let bad = PhaseFractions {
            gas_volume_fraction: 96.0,
            water_cut: 95.0,
            oil_in_water_ppm: 50_000.0,
        };
        let alarms = evaluate_alarms(&bad, &thresholds);
        assert_eq!(
            alarms,
            vec![
                ProcessAlarm::HighOilInWater,
                ProcessAlarm::HighGasContent,
                ProcessAlarm::HighWaterCut
            ]
        );
        assert_eq!(alarms[0].to_string(), "HIGH_OIL_IN_WATER");
    }
}
