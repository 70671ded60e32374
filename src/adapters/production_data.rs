//! Synthetic offshore production history and live replay.
//!
//! Generates 24 hours of 5-minute production data following typical
//! offshore well behavior (decline curves, rising water cut, daily
//! temperature cycle) and replays it as a live data feed.

use crate::core::multiphase::density_from_fractions;
use crate::domain::model::{FieldInputs, FieldOutputs, PhaseFractions};
use crate::domain::ports::FieldIo;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::f64::consts::PI;

/// 每小時 12 筆 (5 分鐘間隔)
pub const SAMPLES_PER_HOUR: usize = 12;
pub const HISTORY_HOURS: usize = 24;
const BBL_PER_DAY_TO_M3_PER_HOUR: f64 = 0.159 / 24.0;
const LIVE_VARIATION: f64 = 0.02;
pub const DATA_SOURCE_LABEL: &str = "Real Production Data (Simulated)";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionRecord {
    pub timestamp: DateTime<Utc>,
    pub flow_rate: f64,
    pub pressure_inlet: f64,
    pub pressure_outlet: f64,
    pub temperature: f64,
    pub gas_volume_fraction: f64,
    pub water_cut: f64,
    pub oil_in_water_ppm: f64,
    pub oil_production_bbl_day: f64,
    pub gas_production_mcf_day: f64,
    pub well_id: String,
    pub platform_id: String,
}

/// HMI 即時數據點
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveDataPoint {
    pub flow_rate: f64,
    pub pressure_inlet: f64,
    pub pressure_outlet: f64,
    pub temperature: f64,
    pub gas_volume_fraction: f64,
    pub water_cut: f64,
    pub oil_in_water_ppm: f64,
    pub timestamp: DateTime<Utc>,
    pub well_id: String,
    pub platform_id: String,
    pub data_source: String,
    pub system_running: bool,
    pub emergency_stop: bool,
    pub alarm_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionSummary {
    pub daily_oil_production_bbl: f64,
    pub daily_gas_production_mcf: f64,
    pub average_flow_rate_m3h: f64,
    pub average_pressure_bar: f64,
    pub average_temperature_c: f64,
    pub average_water_cut_pct: f64,
    pub samples: usize,
    pub last_update: String,
}

pub struct ProductionDataProvider {
    records: Vec<ProductionRecord>,
    current_index: usize,
    rng: StdRng,
}

impl ProductionDataProvider {
    pub fn new(seed: Option<u64>) -> Self {
        Self::with_end_time(Utc::now(), seed)
    }

    /// 產生以 `end` 為結尾的 24 小時數據
    pub fn with_end_time(end: DateTime<Utc>, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let records = generate_history(end, &mut rng);
        tracing::info!("Generated {} production data points", records.len());
        Self {
            records,
            current_index: 0,
            rng,
        }
    }

    pub fn records(&self) -> &[ProductionRecord] {
        &self.records
    }

    /// 循環回放，並加入 ±2% 即時變動
    pub fn current_data_point(&mut self) -> LiveDataPoint {
        if self.current_index >= self.records.len() {
            self.current_index = 0;
        }
        let row = self.records[self.current_index].clone();
        self.current_index += 1;

        let mut vary = |value: f64| {
            value * (1.0 + self.rng.random_range(-LIVE_VARIATION..=LIVE_VARIATION))
        };

        let flow_rate = vary(row.flow_rate).clamp(0.0, 200.0);
        let pressure_inlet = vary(row.pressure_inlet).clamp(0.0, 50.0);
        let pressure_outlet = vary(row.pressure_outlet).clamp(0.0, 45.0);
        let temperature = vary(row.temperature).clamp(20.0, 100.0);
        let gas_volume_fraction = vary(row.gas_volume_fraction).clamp(0.0, 100.0);
        let water_cut = vary(row.water_cut).clamp(0.0, 100.0);
        let oil_in_water_ppm = vary(row.oil_in_water_ppm).clamp(0.0, 2000.0);

        // 業界常見限值
        let alarm_active =
            oil_in_water_ppm > 1000.0 || gas_volume_fraction > 90.0 || pressure_inlet < 10.0;

        LiveDataPoint {
            flow_rate,
            pressure_inlet,
            pressure_outlet,
            temperature,
            gas_volume_fraction,
            water_cut,
            oil_in_water_ppm,
            timestamp: Utc::now(),
            well_id: row.well_id,
            platform_id: row.platform_id,
            data_source: DATA_SOURCE_LABEL.to_string(),
            system_running: true,
            emergency_stop: false,
            alarm_active,
        }
    }

    /// 最近 `hours` 小時 (最多 24) 的歷史數據
    pub fn historical(&self, hours: usize) -> &[ProductionRecord] {
        let rows = hours.min(HISTORY_HOURS) * SAMPLES_PER_HOUR;
        let start = self.records.len().saturating_sub(rows);
        &self.records[start..]
    }

    /// 最近一小時的平均值
    pub fn production_summary(&self) -> ProductionSummary {
        let recent = self.historical(1);
        let n = recent.len().max(1) as f64;
        let mean = |f: fn(&ProductionRecord) -> f64| recent.iter().map(f).sum::<f64>() / n;

        ProductionSummary {
            daily_oil_production_bbl: mean(|r| r.oil_production_bbl_day),
            daily_gas_production_mcf: mean(|r| r.gas_production_mcf_day),
            average_flow_rate_m3h: mean(|r| r.flow_rate),
            average_pressure_bar: mean(|r| r.pressure_inlet),
            average_temperature_c: mean(|r| r.temperature),
            average_water_cut_pct: mean(|r| r.water_cut),
            samples: recent.len(),
            last_update: Utc::now().to_rfc3339(),
        }
    }
}

#[async_trait]
impl FieldIo for ProductionDataProvider {
    async fn read_inputs(&mut self) -> Result<FieldInputs> {
        let point = self.current_data_point();
        Ok(FieldInputs {
            flow_rate: point.flow_rate,
            pressure_inlet: point.pressure_inlet,
            pressure_outlet: point.pressure_outlet,
            temperature: point.temperature,
            density: density_from_fractions(point.gas_volume_fraction, point.water_cut),
            phase_fractions: Some(PhaseFractions {
                gas_volume_fraction: point.gas_volume_fraction,
                water_cut: point.water_cut,
                oil_in_water_ppm: point.oil_in_water_ppm,
            }),
        })
    }

    async fn write_outputs(&mut self, outputs: &FieldOutputs) -> Result<()> {
        // 回放數據不受控制輸出影響
        tracing::trace!("Replay source ignores outputs: {:?}", outputs);
        Ok(())
    }
}

/// 平均為 0、標準差為 `std_dev` 的均勻噪聲
fn noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    let half_width = std_dev * 3f64.sqrt();
    rng.random_range(-half_width..=half_width)
}

fn generate_history(end: DateTime<Utc>, rng: &mut StdRng) -> Vec<ProductionRecord> {
    let points = HISTORY_HOURS * SAMPLES_PER_HOUR + 1;
    let start = end - ChronoDuration::hours(HISTORY_HOURS as i64);

    (0..points)
        .map(|i| {
            let t = i as f64;
            let timestamp = start + ChronoDuration::minutes(5 * i as i64);

            let oil_production = (850.0 * (-t * 0.00001).exp() + noise(rng, 15.0)).max(100.0);
            let flow_rate = oil_production * BBL_PER_DAY_TO_M3_PER_HOUR;

            let gas_production = (2500.0 * (-t * 0.00002).exp() + noise(rng, 50.0)).max(200.0);
            let gor = gas_production / oil_production;
            let gas_volume_fraction = ((gor * 0.178) / (1.0 + gor * 0.178) * 100.0).clamp(5.0, 95.0);

            let water_cut = (25.0 + t * 0.001 + noise(rng, 2.0)).clamp(10.0, 80.0);

            let pressure_inlet = (28.0 * (-t * 0.000005).exp() + noise(rng, 0.8)).clamp(15.0, 45.0);
            let pressure_outlet = (pressure_inlet * 0.75 + noise(rng, 0.5)).clamp(10.0, 35.0);

            let daily_cycle = 3.0 * (2.0 * PI * t / (HISTORY_HOURS * SAMPLES_PER_HOUR) as f64).sin();
            let temperature = (65.0 + daily_cycle + noise(rng, 1.5)).clamp(45.0, 85.0);

            let oil_in_water_ppm = (750.0 + t * 0.02 + noise(rng, 80.0)).clamp(200.0, 2000.0);

            ProductionRecord {
                timestamp,
                flow_rate,
                pressure_inlet,
                pressure_outlet,
                temperature,
                gas_volume_fraction,
                water_cut,
                oil_in_water_ppm,
                oil_production_bbl_day: oil_production,
                gas_production_mcf_day: gas_production,
                well_id: "OFFSHORE-001".to_string(),
                platform_id: "MIRMORAX-ALPHA".to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn provider() -> ProductionDataProvider {
        let end = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        ProductionDataProvider::with_end_time(end, Some(11))
    }

    #[test]
    fn test_history_covers_24_hours_at_5_minutes() {
        let provider = provider();
        let records = provider.records();
        assert_eq!(records.len(), 289);
        assert_eq!(
            records[1].timestamp - records[0].timestamp,
            ChronoDuration::minutes(5)
        );
        assert_eq!(
            records.last().unwrap().timestamp,
            Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_generated_values_respect_clipping() {
        let provider = provider();
        for r in provider.records() {
            assert!((5.0..=95.0).contains(&r.gas_volume_fraction));
            assert!((10.0..=80.0).contains(&r.water_cut));
            assert!((15.0..=45.0).contains(&r.pressure_inlet));
            assert!((10.0..=35.0).contains(&r.pressure_outlet));
            assert!((45.0..=85.0).contains(&r.temperature));
            assert!((200.0..=2000.0).contains(&r.oil_in_water_ppm));
            assert!(r.oil_production_bbl_day >= 100.0);
            // 約 850 bbl/d → 5.6 m³/h
            assert!(r.flow_rate > 2.0 && r.flow_rate < 10.0);
        }
    }

    #[test]
    fn test_historical_window() {
        let provider = provider();
        assert_eq!(provider.historical(1).len(), 12);
        assert_eq!(provider.historical(6).len(), 72);
        // 超過 24 小時以 24 小時計
        assert_eq!(provider.historical(48).len(), 288);
        assert_eq!(
            provider.historical(1).last(),
            provider.records().last()
        );
    }

    #[test]
    fn test_current_data_point_cycles() {
        let mut provider = provider();
        let total = provider.records().len();
        let first = provider.current_data_point();
        for _ in 1..total {
            provider.current_data_point();
        }
        let wrapped = provider.current_data_point();
        assert_eq!(first.well_id, "OFFSHORE-001");
        assert_eq!(wrapped.data_source, DATA_SOURCE_LABEL);
        // 回到第一筆，變動在 ±2% 內
        let base = provider.records()[0].flow_rate;
        assert!((wrapped.flow_rate - base).abs() <= base * 0.02 + 1e-9);
    }

    #[test]
    fn test_production_summary_averages_last_hour() {
        let provider = provider();
        let summary = provider.production_summary();
        assert_eq!(summary.samples, 12);
        let expected = provider
            .historical(1)
            .iter()
            .map(|r| r.water_cut)
            .sum::<f64>()
            / 12.0;
        assert!((summary.average_water_cut_pct - expected).abs() < 1e-9);
        assert!(summary.daily_oil_production_bbl > 700.0);
    }

    #[tokio::test]
    async fn test_replay_as_field_source() {
        let mut provider = provider();
        let inputs = provider.read_inputs().await.unwrap();
        let fractions = inputs.phase_fractions.unwrap();
        assert!(fractions.gas_volume_fraction > 0.0);
        assert!(inputs.density > 0.0 && inputs.density < 1000.0);
        assert!(provider.write_outputs(&FieldOutputs::default()).await.is_ok());
    }
}
