use crate::core::multiphase::AlarmThresholds;
use crate::core::pid::PidParameters;
use crate::core::safety::SafetyLimits;
use crate::core::sampling::SamplingConfig;
use crate::utils::error::{AnalyzerError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub controller: ControllerSection,
    pub controllers: ControllersConfig,
    pub safety: SafetyLimits,
    pub alarms: AlarmThresholds,
    pub sampling: SamplingConfig,
    pub communication: CommunicationConfig,
    pub data_log: DataLogConfig,
    pub simulation: SimulationConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSection {
    /// PLC 掃描週期 (毫秒)
    pub scan_time_ms: u64,
    /// logs / data / backups / reports 的根目錄
    pub workspace: String,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            scan_time_ms: 100,
            workspace: ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllersConfig {
    pub flow: LoopGains,
    pub pressure: LoopGains,
}

impl Default for ControllersConfig {
    fn default() -> Self {
        Self {
            flow: LoopGains {
                kp: 1.5,
                ki: 0.3,
                kd: 0.1,
            },
            pressure: LoopGains {
                kp: 2.0,
                ki: 0.5,
                kd: 0.2,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunicationConfig {
    pub modbus_port: u16,
    pub opcua_port: u16,
}

impl Default for CommunicationConfig {
    fn default() -> Self {
        Self {
            modbus_port: 502,
            opcua_port: 4840,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataLogConfig {
    pub enabled: bool,
    /// 相對於 workspace 的路徑
    pub path: String,
    pub flush_every: u64,
}

impl Default for DataLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "data/process_log.csv".to_string(),
            flush_every: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: Option<u64>,
    /// 一階製程對泵浦/閥門的響應係數，0 表示純隨機漫步
    pub process_response: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            process_response: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    /// 每隔幾個掃描週期記錄一次資源使用
    pub interval_scans: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_scans: 100,
        }
    }
}

impl AnalyzerConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(AnalyzerError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 檔案不存在時使用預設值
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| AnalyzerError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${MODBUS_PORT})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| AnalyzerError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn scan_time(&self) -> Duration {
        Duration::from_millis(self.controller.scan_time_ms)
    }

    pub fn workspace(&self) -> PathBuf {
        PathBuf::from(&self.controller.workspace)
    }

    pub fn data_log_path(&self) -> PathBuf {
        self.workspace().join(&self.data_log.path)
    }

    /// 控制迴路的 PID 參數，輸出限制 0-100%
    pub fn flow_pid(&self) -> PidParameters {
        self.loop_parameters(self.controllers.flow)
    }

    pub fn pressure_pid(&self) -> PidParameters {
        self.loop_parameters(self.controllers.pressure)
    }

    fn loop_parameters(&self, gains: LoopGains) -> PidParameters {
        PidParameters {
            kp: gains.kp,
            ki: gains.ki,
            kd: gains.kd,
            output_min: 0.0,
            output_max: 100.0,
            sample_time: self.scan_time().as_secs_f64(),
            ..PidParameters::default()
        }
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_positive_number(
            "controller.scan_time_ms",
            self.controller.scan_time_ms,
            1,
        )?;
        validation::validate_non_empty_string("controller.workspace", &self.controller.workspace)?;
        validation::validate_path("controller.workspace", &self.controller.workspace)?;

        for (name, gains) in [
            ("controllers.flow", self.controllers.flow),
            ("controllers.pressure", self.controllers.pressure),
        ] {
            validation::validate_range(&format!("{}.kp", name), gains.kp, 0.0, 1000.0)?;
            validation::validate_range(&format!("{}.ki", name), gains.ki, 0.0, 1000.0)?;
            validation::validate_range(&format!("{}.kd", name), gains.kd, 0.0, 1000.0)?;
        }

        validation::validate_ordered_limits(
            "safety.min_pressure",
            self.safety.min_pressure,
            self.safety.max_pressure,
        )?;
        validation::validate_range(
            "safety.max_temperature",
            self.safety.max_temperature,
            -50.0,
            500.0,
        )?;
        validation::validate_range("safety.max_flow_rate", self.safety.max_flow_rate, 0.0, 10_000.0)?;

        validation::validate_range(
            "alarms.max_gas_volume_fraction",
            self.alarms.max_gas_volume_fraction,
            0.0,
            100.0,
        )?;
        validation::validate_range("alarms.max_water_cut", self.alarms.max_water_cut, 0.0, 100.0)?;

        validation::validate_positive_number("sampling.duration_secs", self.sampling.duration_secs, 1)?;
        if self.sampling.duration_secs > self.sampling.interval_secs {
            return Err(AnalyzerError::ConfigValidationError {
                field: "sampling.duration_secs".to_string(),
                message: format!(
                    "Sample duration {}s exceeds sampling interval {}s",
                    self.sampling.duration_secs, self.sampling.interval_secs
                ),
            });
        }

        validation::validate_positive_number(
            "communication.modbus_port",
            u64::from(self.communication.modbus_port),
            1,
        )?;
        validation::validate_positive_number(
            "communication.opcua_port",
            u64::from(self.communication.opcua_port),
            1,
        )?;

        if self.data_log.enabled {
            validation::validate_path("data_log.path", &self.data_log.path)?;
            validation::validate_positive_number("data_log.flush_every", self.data_log.flush_every, 1)?;
        }

        validation::validate_range(
            "simulation.process_response",
            self.simulation.process_response,
            0.0,
            1.0,
        )?;
        validation::validate_positive_number(
            "monitoring.interval_scans",
            self.monitoring.interval_scans,
            1,
        )?;

        Ok(())
    }
}

impl Validate for AnalyzerConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
