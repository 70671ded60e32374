use crate::domain::model::ProcessVariables;
use serde::{Deserialize, Serialize};

/// 安全聯鎖上下限
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyLimits {
    /// bar
    pub max_pressure: f64,
    /// bar
    pub min_pressure: f64,
    /// °C
    pub max_temperature: f64,
    /// m³/h
    pub max_flow_rate: f64,
    /// ppm
    pub max_oil_in_water: f64,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_pressure: 35.0,
            min_pressure: 5.0,
            max_temperature: 80.0,
            max_flow_rate: 200.0,
            max_oil_in_water: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyStatus {
    pub trip_active: bool,
    pub violations: Vec<String>,
    pub limits: SafetyLimits,
}

#[derive(Debug, Clone)]
pub struct SafetySystem {
    limits: SafetyLimits,
    violations: Vec<String>,
    trip_active: bool,
}

impl SafetySystem {
    pub fn new(limits: SafetyLimits) -> Self {
        tracing::debug!("Safety system initialized: {:?}", limits);
        Self {
            limits,
            violations: Vec::new(),
            trip_active: false,
        }
    }

    pub fn limits(&self) -> &SafetyLimits {
        &self.limits
    }

    /// 檢查所有安全條件；回傳 false 代表跳脫
    pub fn check_safety(&mut self, pv: &ProcessVariables) -> bool {
        let limits = &self.limits;
        let mut violations = Vec::new();

        if pv.pressure_inlet > limits.max_pressure {
            violations.push(format!("High inlet pressure: {:.1} bar", pv.pressure_inlet));
        }
        if pv.pressure_inlet < limits.min_pressure {
            violations.push(format!("Low inlet pressure: {:.1} bar", pv.pressure_inlet));
        }
        if pv.temperature > limits.max_temperature {
            violations.push(format!("High temperature: {:.1}°C", pv.temperature));
        }
        if pv.flow_rate > limits.max_flow_rate {
            violations.push(format!("High flow rate: {:.1} m³/h", pv.flow_rate));
        }
        if pv.oil_in_water_ppm > limits.max_oil_in_water {
            violations.push(format!("High oil in water: {:.1} ppm", pv.oil_in_water_ppm));
        }

        if violations.is_empty() {
            self.violations.clear();
            self.trip_active = false;
            true
        } else {
            tracing::error!("🚨 SAFETY TRIP: {}", violations.join("; "));
            self.violations = violations;
            self.trip_active = true;
            false
        }
    }

    /// 操作員確認後重置
    pub fn reset(&mut self) {
        self.violations.clear();
        self.trip_active = false;
        tracing::info!("Safety system reset");
    }

    pub fn trip_active(&self) -> bool {
        self.trip_active
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn status(&self) -> SafetyStatus {
        SafetyStatus {
            trip_active: self.trip_active,
            violations: self.violations.clone(),
            limits: self.limits.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normal_process() -> ProcessVariables {
        ProcessVariables {
            flow_rate: 90.0,
            pressure_inlet: 25.0,
            temperature: 60.0,
            oil_in_water_ppm: 0.0,
            ..ProcessVariables::default()
        }
    }

    #[test]
    fn test_normal_conditions_pass() {
        let mut safety = SafetySystem::new(SafetyLimits::default());
        assert!(safety.check_safety(&normal_process()));
        assert!(!safety.trip_active());
        assert!(safety.violations().is_empty());
    }

    #[test]
    fn test_each_limit_trips() {
        let cases = [
            (ProcessVariables { pressure_inlet: 36.0, ..normal_process() }, "High inlet pressure"),
            (ProcessVariables { pressure_inlet: 4.0, ..normal_process() }, "Low inlet pressure"),
            (ProcessVariables { temperature: 81.0, ..normal_process() }, "High temperature"),
            (ProcessVariables { flow_rate: 201.0, ..normal_process() }, "High flow rate"),
            (ProcessVariables { oil_in_water_ppm: 1500.0, ..normal_process() }, "High oil in water"),
        ];

        for (pv, expected) in cases {
            let mut safety = SafetySystem::new(SafetyLimits::default());
            assert!(!safety.check_safety(&pv));
            assert!(safety.trip_active());
            assert_eq!(safety.violations().len(), 1);
            assert!(safety.violations()[0].starts_with(expected));
        }
    }

    #[test]
    fn test_violation_message_format() {
        let mut safety = SafetySystem::new(SafetyLimits::default());
        let pv = ProcessVariables {
            pressure_inlet: 40.04,
            ..normal_process()
        };
        safety.check_safety(&pv);
        assert_eq!(safety.violations()[0], "High inlet pressure: 40.0 bar");
    }

    #[test]
    fn test_trip_clears_when_conditions_recover() {
        let mut safety = SafetySystem::new(SafetyLimits::default());
        let tripped = ProcessVariables {
            temperature: 95.0,
            ..normal_process()
        };
        assert!(!safety.check_safety(&tripped));
        assert!(safety.check_safety(&normal_process()));
        assert!(!safety.trip_active());
    }

    #[test]
    fn test_reset_and_status() {
        let mut safety = SafetySystem::new(SafetyLimits::default());
        safety.check_safety(&ProcessVariables {
            flow_rate: 250.0,
            ..normal_process()
        });
        assert!(safety.status().trip_active);
        safety.reset();
        let status = safety.status();
        assert!(!status.trip_active);
        assert!(status.violations.is_empty());
        assert_eq!(status.limits.max_flow_rate, 200.0);
    }
}
