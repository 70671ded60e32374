//! Console HMI: status board, production summary panel and trend series
//! for the multiphase separation process.

use crate::adapters::production_data::{LiveDataPoint, ProductionRecord, ProductionSummary};
use crate::domain::model::ProcessSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;

pub const HMI_TITLE: &str = "Multiphase Flow Analyzer - HMI";

/// 主控台狀態面板
#[derive(Debug, Clone)]
pub struct StatusBoard {
    title: String,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new(HMI_TITLE)
    }
}

impl StatusBoard {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    pub fn render(&self, snapshot: &ProcessSnapshot) -> String {
        let mut out = String::new();
        let rule = "=".repeat(60);

        // String 的 fmt::Write 不會失敗
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "🏭 {}", self.title);
        let _ = writeln!(out, "{}", rule);

        let _ = writeln!(
            out,
            "🔄 System: {}   📡 PLC: {}   🚨 Alarms: {}   🛑 E-Stop: {}",
            if snapshot.system_running { "RUNNING" } else { "STOPPED" },
            if snapshot.plc_online { "ONLINE" } else { "OFFLINE" },
            if snapshot.alarm_active { "ACTIVE" } else { "NORMAL" },
            if snapshot.emergency_stop { "ACTIVATED" } else { "NORMAL" },
        );
        let _ = writeln!(out, "{}", "-".repeat(60));

        let _ = writeln!(out, "Flow Rate            {:>10.1} m³/h", snapshot.flow_rate);
        let _ = writeln!(out, "Inlet Pressure       {:>10.1} bar", snapshot.pressure_inlet);
        let _ = writeln!(out, "Outlet Pressure      {:>10.1} bar", snapshot.pressure_outlet);
        let _ = writeln!(out, "Temperature          {:>10.1} °C", snapshot.temperature);
        let _ = writeln!(out, "Gas Volume Fraction  {:>10.1} %", snapshot.gas_volume_fraction);
        let _ = writeln!(out, "Water Cut            {:>10.1} %", snapshot.water_cut);
        let _ = writeln!(out, "Oil in Water         {:>10.0} ppm", snapshot.oil_in_water_ppm);
        let _ = writeln!(out, "Pump Speed           {:>10.1} %", snapshot.pump_speed);
        let _ = writeln!(out, "Inlet Valve          {:>10.1} %", snapshot.inlet_valve_position);
        let _ = writeln!(
            out,
            "Sample Valve         {:>10}",
            if snapshot.sample_valve_open { "OPEN" } else { "CLOSED" }
        );

        if !snapshot.active_alarms.is_empty() || !snapshot.safety_violations.is_empty() {
            let _ = writeln!(out, "{}", "-".repeat(60));
            for alarm in &snapshot.active_alarms {
                let _ = writeln!(out, "⚠️  ALARM: {}", alarm);
            }
            for violation in &snapshot.safety_violations {
                let _ = writeln!(out, "🚨 SAFETY: {}", violation);
            }
        }

        let _ = writeln!(out, "Last update: {}", snapshot.last_update);
        out
    }

    pub fn render_summary(&self, summary: &ProductionSummary) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "📋 Production Summary ({} samples)", summary.samples);
        let _ = writeln!(
            out,
            "Daily Oil Production {:>10.0} bbl/day",
            summary.daily_oil_production_bbl
        );
        let _ = writeln!(
            out,
            "Daily Gas Production {:>10.0} Mcf/day",
            summary.daily_gas_production_mcf
        );
        let _ = writeln!(out, "Average Flow Rate    {:>10.1} m³/h", summary.average_flow_rate_m3h);
        let _ = writeln!(out, "Average Pressure     {:>10.1} bar", summary.average_pressure_bar);
        let _ = writeln!(out, "Average Temperature  {:>10.1} °C", summary.average_temperature_c);
        let _ = writeln!(out, "Water Cut            {:>10.1} %", summary.average_water_cut_pct);
        out
    }
}

/// PLC 離線時以回放數據建立面板快照
pub fn live_snapshot(point: &LiveDataPoint) -> ProcessSnapshot {
    let mut active_alarms = Vec::new();
    if point.alarm_active {
        active_alarms.push(format!("{} @ {}", point.data_source, point.well_id));
    }

    ProcessSnapshot {
        flow_rate: point.flow_rate,
        pressure_inlet: point.pressure_inlet,
        pressure_outlet: point.pressure_outlet,
        temperature: point.temperature,
        gas_volume_fraction: point.gas_volume_fraction,
        water_cut: point.water_cut,
        oil_in_water_ppm: point.oil_in_water_ppm,
        system_running: point.system_running,
        emergency_stop: point.emergency_stop,
        alarm_active: point.alarm_active,
        active_alarms,
        last_update: point.timestamp.to_rfc3339(),
        ..ProcessSnapshot::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub name: &'static str,
    pub unit: &'static str,
    pub points: Vec<(DateTime<Utc>, f64)>,
}

impl TrendSeries {
    pub fn latest(&self) -> Option<f64> {
        self.points.last().map(|(_, v)| *v)
    }

    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.points.iter().map(|(_, v)| *v).fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

/// 趨勢圖資料：每個序列對應一張圖
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendFrame {
    pub series: Vec<TrendSeries>,
}

type Extractor = fn(&ProductionRecord) -> f64;

fn trend_columns() -> [(&'static str, &'static str, Extractor); 6] {
    [
        ("flow_rate", "m³/h", |r: &ProductionRecord| r.flow_rate),
        ("pressure", "bar", |r: &ProductionRecord| r.pressure_inlet),
        ("temperature", "°C", |r: &ProductionRecord| r.temperature),
        ("gas_fraction", "%", |r: &ProductionRecord| r.gas_volume_fraction),
        ("water_cut", "%", |r: &ProductionRecord| r.water_cut),
        ("oil_in_water", "ppm", |r: &ProductionRecord| r.oil_in_water_ppm),
    ]
}

impl TrendFrame {
    pub fn from_history(records: &[ProductionRecord]) -> Self {
        let series = trend_columns()
            .into_iter()
            .map(|(name, unit, extract)| TrendSeries {
                name,
                unit,
                points: records.iter().map(|r| (r.timestamp, extract(r))).collect(),
            })
            .collect();
        Self { series }
    }

    pub fn series(&self, name: &str) -> Option<&TrendSeries> {
        self.series.iter().find(|s| s.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.points.is_empty())
    }

    /// 每個序列一行：最新值與區間
    pub fn render(&self) -> String {
        if self.is_empty() {
            return "No historical data available\n".to_string();
        }
        let mut out = String::from("📈 Process Trends\n");
        for s in &self.series {
            if let (Some(latest), Some((lo, hi))) = (s.latest(), s.min_max()) {
                let _ = writeln!(
                    out,
                    "{:<14} {:>9.1} {:<5} [{:.1} .. {:.1}]",
                    s.name, latest, s.unit, lo, hi
                );
            }
        }
        out
    }
}
