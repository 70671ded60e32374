use crate::domain::model::ProcessVariables;
use crate::domain::ports::ProcessDataLogger;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// CSV 中的一列程序數據，欄位順序與 HEADER 一致
#[derive(Debug, Serialize)]
struct ProcessRecord {
    timestamp: String,
    flow_rate: f64,
    pressure_inlet: f64,
    pressure_outlet: f64,
    temperature: f64,
    density_measurement: f64,
    gas_volume_fraction: f64,
    water_cut: f64,
    oil_in_water_ppm: f64,
    inlet_valve_position: f64,
    outlet_valve_position: f64,
    sample_valve_open: bool,
    pump_speed: f64,
    flow_setpoint: f64,
    pressure_setpoint: f64,
    system_running: bool,
    emergency_stop: bool,
    alarm_active: bool,
}

impl From<&ProcessVariables> for ProcessRecord {
    fn from(pv: &ProcessVariables) -> Self {
        Self {
            timestamp: pv.last_update.to_rfc3339(),
            flow_rate: pv.flow_rate,
            pressure_inlet: pv.pressure_inlet,
            pressure_outlet: pv.pressure_outlet,
            temperature: pv.temperature,
            density_measurement: pv.density_measurement,
            gas_volume_fraction: pv.gas_volume_fraction,
            water_cut: pv.water_cut,
            oil_in_water_ppm: pv.oil_in_water_ppm,
            inlet_valve_position: pv.inlet_valve_position,
            outlet_valve_position: pv.outlet_valve_position,
            sample_valve_open: pv.sample_valve_open,
            pump_speed: pv.pump_speed,
            flow_setpoint: pv.flow_setpoint,
            pressure_setpoint: pv.pressure_setpoint,
            system_running: pv.system_running,
            emergency_stop: pv.emergency_stop,
            alarm_active: pv.alarm_active,
        }
    }
}

const HEADER: [&str; 18] = [
    "timestamp",
    "flow_rate",
    "pressure_inlet",
    "pressure_outlet",
    "temperature",
    "density_measurement",
    "gas_volume_fraction",
    "water_cut",
    "oil_in_water_ppm",
    "inlet_valve_position",
    "outlet_valve_position",
    "sample_valve_open",
    "pump_speed",
    "flow_setpoint",
    "pressure_setpoint",
    "system_running",
    "emergency_stop",
    "alarm_active",
];

/// 每個掃描週期寫一列 CSV
pub struct CsvDataLogger {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    flush_every: u64,
    pending: u64,
    rows_written: u64,
}

impl CsvDataLogger {
    pub fn open<P: AsRef<Path>>(path: P, flush_every: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let is_new = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

        if is_new {
            writer.write_record(HEADER)?;
            writer.flush()?;
        }

        tracing::info!("🗄️ Process data logging to {}", path.display());

        Ok(Self {
            path,
            writer: Some(writer),
            flush_every: flush_every.max(1),
            pending: 0,
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

#[async_trait]
impl ProcessDataLogger for CsvDataLogger {
    async fn log_process_data(&mut self, pv: &ProcessVariables) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            tracing::debug!("Data logger closed, dropping sample");
            return Ok(());
        };

        writer.serialize(ProcessRecord::from(pv))?;

        self.rows_written += 1;
        self.pending += 1;
        if self.pending >= self.flush_every {
            writer.flush()?;
            self.pending = 0;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            tracing::info!(
                "Data logger closed after {} rows ({})",
                self.rows_written,
                self.path.display()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data/process_log.csv");

        let mut logger = CsvDataLogger::open(&path, 2).unwrap();
        let pv = ProcessVariables {
            flow_rate: 85.2,
            system_running: true,
            ..ProcessVariables::default()
        };
        logger.log_process_data(&pv).await.unwrap();
        logger.log_process_data(&pv).await.unwrap();
        logger.log_process_data(&pv).await.unwrap();
        logger.close().await.unwrap();
        assert_eq!(logger.rows_written(), 3);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), HEADER.len());
        assert_eq!(&headers[1], "flow_rate");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][1], "85.2");
        assert_eq!(&rows[0][15], "true");
    }

    #[tokio::test]
    async fn test_reopen_appends_without_second_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        let pv = ProcessVariables::default();

        let mut first = CsvDataLogger::open(&path, 1).unwrap();
        first.log_process_data(&pv).await.unwrap();
        first.close().await.unwrap();

        let mut second = CsvDataLogger::open(&path, 1).unwrap();
        second.log_process_data(&pv).await.unwrap();
        second.close().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("timestamp").count(), 1);
        assert_eq!(content.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_logging_after_close_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mut logger = CsvDataLogger::open(dir.path().join("log.csv"), 10).unwrap();
        logger.close().await.unwrap();
        assert!(logger.log_process_data(&ProcessVariables::default()).await.is_ok());
        assert_eq!(logger.rows_written(), 0);
    }
}
