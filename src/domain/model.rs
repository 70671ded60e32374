use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// PLC 記憶體映射：現場輸入、計算值、輸出、設定值與系統狀態
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessVariables {
    // 現場感測器輸入
    pub flow_rate: f64,
    pub pressure_inlet: f64,
    pub pressure_outlet: f64,
    pub temperature: f64,
    pub density_measurement: f64,

    // 計算值
    pub gas_volume_fraction: f64,
    pub water_cut: f64,
    pub oil_in_water_ppm: f64,

    // 輸出至現場設備
    pub inlet_valve_position: f64,
    pub outlet_valve_position: f64,
    pub sample_valve_open: bool,
    pub pump_speed: f64,

    // 控制設定值
    pub flow_setpoint: f64,
    pub pressure_setpoint: f64,
    pub temperature_setpoint: f64,

    // 系統狀態
    pub system_running: bool,
    pub emergency_stop: bool,
    pub maintenance_mode: bool,
    pub alarm_active: bool,

    pub last_update: DateTime<Utc>,
}

impl Default for ProcessVariables {
    fn default() -> Self {
        Self {
            flow_rate: 0.0,
            pressure_inlet: 0.0,
            pressure_outlet: 0.0,
            temperature: 20.0,
            density_measurement: 850.0,
            gas_volume_fraction: 0.0,
            water_cut: 0.0,
            oil_in_water_ppm: 0.0,
            inlet_valve_position: 0.0,
            outlet_valve_position: 0.0,
            sample_valve_open: false,
            pump_speed: 0.0,
            flow_setpoint: 100.0,
            pressure_setpoint: 25.0,
            temperature_setpoint: 60.0,
            system_running: false,
            emergency_stop: false,
            maintenance_mode: false,
            alarm_active: false,
            last_update: Utc::now(),
        }
    }
}

impl ProcessVariables {
    pub fn apply_inputs(&mut self, inputs: &FieldInputs) {
        self.flow_rate = inputs.flow_rate;
        self.pressure_inlet = inputs.pressure_inlet;
        self.pressure_outlet = inputs.pressure_outlet;
        self.temperature = inputs.temperature;
        self.density_measurement = inputs.density;
    }

    pub fn apply_fractions(&mut self, fractions: &PhaseFractions) {
        self.gas_volume_fraction = fractions.gas_volume_fraction;
        self.water_cut = fractions.water_cut;
        self.oil_in_water_ppm = fractions.oil_in_water_ppm;
    }

    pub fn phase_fractions(&self) -> PhaseFractions {
        PhaseFractions {
            gas_volume_fraction: self.gas_volume_fraction,
            water_cut: self.water_cut,
            oil_in_water_ppm: self.oil_in_water_ppm,
        }
    }

    pub fn outputs(&self) -> FieldOutputs {
        FieldOutputs {
            pump_speed: self.pump_speed,
            inlet_valve_position: self.inlet_valve_position,
            outlet_valve_position: self.outlet_valve_position,
            sample_valve_open: self.sample_valve_open,
        }
    }

    /// Modbus / OPC-UA 發布的標籤集合，順序固定
    pub fn communication_tags(&self) -> Vec<(&'static str, TagValue)> {
        vec![
            ("flow_rate", TagValue::Float(self.flow_rate)),
            ("pressure_inlet", TagValue::Float(self.pressure_inlet)),
            ("temperature", TagValue::Float(self.temperature)),
            ("gas_volume_fraction", TagValue::Float(self.gas_volume_fraction)),
            ("water_cut", TagValue::Float(self.water_cut)),
            ("oil_in_water_ppm", TagValue::Float(self.oil_in_water_ppm)),
            ("system_running", TagValue::Bool(self.system_running)),
            ("alarm_active", TagValue::Bool(self.alarm_active)),
        ]
    }
}

/// 多相分率
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseFractions {
    /// %
    pub gas_volume_fraction: f64,
    /// %
    pub water_cut: f64,
    pub oil_in_water_ppm: f64,
}

/// 輸入掃描讀到的現場數值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldInputs {
    pub flow_rate: f64,
    pub pressure_inlet: f64,
    pub pressure_outlet: f64,
    pub temperature: f64,
    pub density: f64,
    /// 線上多相流量計直接量測的分率；None 時由密度推算
    pub phase_fractions: Option<PhaseFractions>,
}

/// 輸出掃描寫往現場的數值
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldOutputs {
    pub pump_speed: f64,
    pub inlet_valve_position: f64,
    pub outlet_valve_position: f64,
    pub sample_valve_open: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Float(f64),
    Bool(bool),
}

impl TagValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Float(v) => Some(*v),
            TagValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TagValue::Bool(v) => Some(*v),
            TagValue::Float(_) => None,
        }
    }
}

/// HMI 使用的程序數據快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub flow_rate: f64,
    pub pressure_inlet: f64,
    pub pressure_outlet: f64,
    pub temperature: f64,
    pub gas_volume_fraction: f64,
    pub water_cut: f64,
    pub oil_in_water_ppm: f64,
    pub pump_speed: f64,
    pub inlet_valve_position: f64,
    pub sample_valve_open: bool,
    pub system_running: bool,
    pub emergency_stop: bool,
    pub alarm_active: bool,
    /// 通訊伺服器運行中
    pub plc_online: bool,
    pub active_alarms: Vec<String>,
    pub safety_violations: Vec<String>,
    pub last_update: String,
}

impl ProcessSnapshot {
    pub fn capture(
        pv: &ProcessVariables,
        active_alarms: Vec<String>,
        safety_violations: Vec<String>,
    ) -> Self {
        Self {
            flow_rate: pv.flow_rate,
            pressure_inlet: pv.pressure_inlet,
            pressure_outlet: pv.pressure_outlet,
            temperature: pv.temperature,
            gas_volume_fraction: pv.gas_volume_fraction,
            water_cut: pv.water_cut,
            oil_in_water_ppm: pv.oil_in_water_ppm,
            pump_speed: pv.pump_speed,
            inlet_valve_position: pv.inlet_valve_position,
            sample_valve_open: pv.sample_valve_open,
            system_running: pv.system_running,
            emergency_stop: pv.emergency_stop,
            alarm_active: pv.alarm_active,
            plc_online: false,
            active_alarms,
            safety_violations,
            last_update: pv.last_update.to_rfc3339(),
        }
    }

    /// 單行 JSON，供無頭部署的 HMI 輸出
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Default for ProcessSnapshot {
    fn default() -> Self {
        Self::capture(&ProcessVariables::default(), Vec::new(), Vec::new())
    }
}
