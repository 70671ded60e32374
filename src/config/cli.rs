use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    /// PLC 控制器掃描迴路
    Plc,
    /// 生產數據分析引擎
    Analysis,
    /// 主控台 HMI 狀態面板
    Hmi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    /// 隨機漫步現場模擬
    Simulated,
    /// 回放 24 小時生產數據
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "multiphase-analyzer")]
#[command(about = "Automated Multiphase Flow Analyzer System launcher")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/process_config.toml")]
    pub config: String,

    /// Components to start
    #[arg(long, value_enum, num_args = 1.., default_values_t = [Component::Plc, Component::Analysis, Component::Hmi])]
    pub components: Vec<Component>,

    /// Start only the PLC controller
    #[arg(long, conflicts_with = "hmi_only")]
    pub plc_only: bool,

    /// Start only the HMI status board
    #[arg(long)]
    pub hmi_only: bool,

    /// Field input source for the PLC
    #[arg(long, value_enum, default_value_t = FieldSource::Simulated)]
    pub source: FieldSource,

    /// Run a fixed number of scan cycles and exit
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Start the process immediately after the controller comes up
    #[arg(long)]
    pub auto_start: bool,

    /// Validate configuration and show what would run, without running it
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Override resource monitoring setting from config
    #[arg(long)]
    pub monitor: bool,
}

impl CliConfig {
    /// 套用 --plc-only / --hmi-only 後實際要啟動的元件
    pub fn selected_components(&self) -> Vec<Component> {
        if self.plc_only {
            vec![Component::Plc]
        } else if self.hmi_only {
            vec![Component::Hmi]
        } else {
            let mut components = self.components.clone();
            components.dedup();
            components
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_start_everything() {
        let cli = CliConfig::parse_from(["multiphase-analyzer"]);
        assert_eq!(
            cli.selected_components(),
            vec![Component::Plc, Component::Analysis, Component::Hmi]
        );
        assert_eq!(cli.source, FieldSource::Simulated);
        assert!(cli.cycles.is_none());
    }

    #[test]
    fn test_only_flags_override_components() {
        let cli = CliConfig::parse_from(["multiphase-analyzer", "--plc-only"]);
        assert_eq!(cli.selected_components(), vec![Component::Plc]);

        let cli = CliConfig::parse_from(["multiphase-analyzer", "--hmi-only"]);
        assert_eq!(cli.selected_components(), vec![Component::Hmi]);
    }

    #[test]
    fn test_component_list_and_source() {
        let cli = CliConfig::parse_from([
            "multiphase-analyzer",
            "--components",
            "plc",
            "analysis",
            "--source",
            "production",
            "--cycles",
            "20",
        ]);
        assert_eq!(
            cli.selected_components(),
            vec![Component::Plc, Component::Analysis]
        );
        assert_eq!(cli.source, FieldSource::Production);
        assert_eq!(cli.cycles, Some(20));
    }
}
