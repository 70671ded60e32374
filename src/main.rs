use clap::Parser;
use multiphase_analyzer::adapters::production_data::ProductionDataProvider;
use multiphase_analyzer::config::{CliConfig, Component, FieldSource, LogFormat};
use multiphase_analyzer::domain::ports::{FieldIo, ProcessDataLogger};
use multiphase_analyzer::hmi::{self, StatusBoard, TrendFrame};
use multiphase_analyzer::utils::error::{AnalyzerError, ErrorSeverity};
use multiphase_analyzer::utils::{logger, validation::Validate};
use multiphase_analyzer::{
    AnalyzerConfig, CsvDataLogger, PlcController, ProcessSnapshot, Result, SimulatedField,
};
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;

const WORKSPACE_DIRS: [&str; 4] = ["logs", "data", "backups", "reports"];
const ANALYSIS_INTERVAL: Duration = Duration::from_secs(5);
const HMI_REFRESH: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    match cli.log_format {
        LogFormat::Compact => logger::init_cli_logger(cli.verbose),
        LogFormat::Json => logger::init_json_logger(cli.verbose),
    }

    tracing::info!("🚀 Starting Automated Multiphase Flow Analyzer System");
    tracing::info!("📁 Loading configuration from: {}", cli.config);
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let mut config = match AnalyzerConfig::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => exit_with_error("Failed to load configuration", &e),
    };

    // 應用命令列覆蓋設定
    if cli.monitor {
        config.monitoring.enabled = true;
        tracing::info!("🔍 System monitoring enabled");
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        exit_with_error("Configuration validation failed", &e);
    }
    tracing::info!("✅ Configuration loaded and validated successfully");

    let components = cli.selected_components();
    display_config_summary(&config, &cli, &components);

    if cli.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No components will be started");
        return Ok(());
    }

    if let Err(e) = prepare_workspace(&config.workspace()) {
        exit_with_error("Failed to prepare workspace", &e);
    }

    match launch(&cli, &config, &components).await {
        Ok(()) => {
            tracing::info!("✅ System shutdown complete");
            println!("✅ System shutdown complete");
        }
        Err(e) => exit_with_error("System stopped with an error", &e),
    }

    Ok(())
}

fn exit_with_error(context: &str, e: &AnalyzerError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ {}: {} (Category: {:?}, Severity: {:?})",
        context,
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    std::process::exit(exit_code(e.severity()));
}

/// 根據錯誤嚴重程度決定退出碼
fn exit_code(severity: ErrorSeverity) -> i32 {
    match severity {
        ErrorSeverity::Low => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn display_config_summary(config: &AnalyzerConfig, cli: &CliConfig, components: &[Component]) {
    println!("📋 Configuration Summary:");
    println!(
        "  Components: {}",
        components
            .iter()
            .map(|c| format!("{:?}", c).to_lowercase())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Field source: {:?}", cli.source);
    println!("  Scan time: {} ms", config.controller.scan_time_ms);
    println!(
        "  Flow PID: Kp={} Ki={} Kd={}",
        config.controllers.flow.kp, config.controllers.flow.ki, config.controllers.flow.kd
    );
    println!(
        "  Pressure PID: Kp={} Ki={} Kd={}",
        config.controllers.pressure.kp,
        config.controllers.pressure.ki,
        config.controllers.pressure.kd
    );
    println!(
        "  Safety: {:.1}-{:.1} bar, max {:.1}°C, max {:.1} m³/h",
        config.safety.min_pressure,
        config.safety.max_pressure,
        config.safety.max_temperature,
        config.safety.max_flow_rate
    );
    println!(
        "  Modbus TCP port: {}, OPC-UA port: {}",
        config.communication.modbus_port, config.communication.opcua_port
    );
    if config.data_log.enabled {
        println!("  Data log: {}", config.data_log_path().display());
    }
    if let Some(cycles) = cli.cycles {
        println!("  Cycles: {}", cycles);
    }
    if cli.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }
    println!();
}

fn prepare_workspace(workspace: &Path) -> Result<()> {
    for dir in WORKSPACE_DIRS {
        let path = workspace.join(dir);
        std::fs::create_dir_all(&path)?;
        tracing::debug!("📁 Directory ready: {}", path.display());
    }
    Ok(())
}

async fn launch(cli: &CliConfig, config: &AnalyzerConfig, components: &[Component]) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks: JoinSet<Result<()>> = JoinSet::new();
    let mut snapshots = None;

    if components.contains(&Component::Plc) {
        let data_logger = if config.data_log.enabled {
            Some(CsvDataLogger::open(
                config.data_log_path(),
                config.data_log.flush_every,
            )?)
        } else {
            None
        };

        match cli.source {
            FieldSource::Simulated => {
                let field = SimulatedField::new(
                    config.simulation.seed,
                    config.simulation.process_response,
                );
                let plc = PlcController::new(config, field, data_logger);
                snapshots = Some(plc.subscribe());
                tasks.spawn(run_plc(plc, cli.cycles, cli.auto_start, shutdown_rx.clone()));
            }
            FieldSource::Production => {
                let field = ProductionDataProvider::new(config.simulation.seed);
                let plc = PlcController::new(config, field, data_logger);
                snapshots = Some(plc.subscribe());
                tasks.spawn(run_plc(plc, cli.cycles, cli.auto_start, shutdown_rx.clone()));
            }
        }
        tracing::info!("✅ PLC controller started");
    }

    if components.contains(&Component::Analysis) {
        tasks.spawn(run_analysis(config.simulation.seed, shutdown_rx.clone()));
        tracing::info!("✅ Analysis engine started");
    }

    if components.contains(&Component::Hmi) {
        let json_output = cli.log_format == LogFormat::Json;
        tasks.spawn(run_hmi(
            snapshots,
            config.simulation.seed,
            json_output,
            shutdown_rx.clone(),
        ));
        tracing::info!("✅ HMI status board started");
    }

    let mut first_error: Option<AnalyzerError> = None;
    let mut record = |joined: std::result::Result<Result<()>, tokio::task::JoinError>| {
        let outcome = joined.unwrap_or_else(|e| {
            Err(AnalyzerError::ControlError {
                message: format!("component task failed: {}", e),
            })
        });
        if let Err(e) = outcome {
            tracing::error!("❌ Component stopped with error: {}", e);
            first_error.get_or_insert(e);
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("🛑 Ctrl-C received, stopping all components");
        }
        Some(joined) = tasks.join_next() => {
            record(joined);
            tracing::info!("Component finished, stopping the remaining components");
        }
    }

    let _ = shutdown_tx.send(true);
    while let Some(joined) = tasks.join_next().await {
        record(joined);
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn run_plc<F, L>(
    mut plc: PlcController<F, L>,
    cycles: Option<u64>,
    auto_start: bool,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    F: FieldIo + 'static,
    L: ProcessDataLogger + 'static,
{
    if auto_start {
        plc.start_system()?;
    }

    match cycles {
        Some(cycles) => {
            plc.run_cycles(cycles).await?;
            plc.shutdown().await?;
        }
        None => {
            plc.run(async move {
                let _ = shutdown.changed().await;
            })
            .await?;
        }
    }

    if plc.safety().trip_active() {
        return Err(AnalyzerError::SafetyTrip {
            violations: plc.safety().violations().to_vec(),
        });
    }
    Ok(())
}

async fn run_analysis(seed: Option<u64>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let mut provider = ProductionDataProvider::new(seed);
    let board = StatusBoard::default();
    let mut ticker = tokio::time::interval(ANALYSIS_INTERVAL);

    println!("{}", board.render_summary(&provider.production_summary()));
    println!("{}", TrendFrame::from_history(provider.historical(24)).render());

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let point = provider.current_data_point();
                tracing::info!(
                    "📊 {} {}: {:.1} m³/h, {:.1} bar, GVF {:.1}%, WC {:.1}%, OiW {:.0} ppm",
                    point.platform_id,
                    point.well_id,
                    point.flow_rate,
                    point.pressure_inlet,
                    point.gas_volume_fraction,
                    point.water_cut,
                    point.oil_in_water_ppm
                );
                if point.alarm_active {
                    tracing::warn!("🚨 Production data outside operating limits");
                }
            }
        }
    }

    tracing::info!("Analysis engine stopped");
    Ok(())
}

async fn run_hmi(
    snapshots: Option<watch::Receiver<ProcessSnapshot>>,
    seed: Option<u64>,
    json_output: bool,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let board = StatusBoard::default();
    let mut ticker = tokio::time::interval(HMI_REFRESH);
    let show = |snapshot: &ProcessSnapshot| -> Result<()> {
        if json_output {
            println!("{}", snapshot.to_json()?);
        } else {
            println!("{}", board.render(snapshot));
        }
        Ok(())
    };

    match snapshots {
        Some(mut snapshots) => {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        if snapshots.has_changed().unwrap_or(false) {
                            let snapshot = snapshots.borrow_and_update().clone();
                            show(&snapshot)?;
                        }
                    }
                }
            }
            let last = snapshots.borrow().clone();
            show(&last)?;
        }
        None => {
            // 沒有 PLC 時以生產數據回放顯示
            tracing::info!("PLC not running, HMI showing production data replay");
            let mut provider = ProductionDataProvider::new(seed);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        let point = provider.current_data_point();
                        show(&hmi::live_snapshot(&point))?;
                    }
                }
            }
        }
    }

    tracing::info!("HMI stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(workspace: &TempDir) -> AnalyzerConfig {
        let mut config = AnalyzerConfig::default();
        config.controller.workspace = workspace.path().to_string_lossy().to_string();
        config.simulation.seed = Some(7);
        config
    }

    #[test]
    fn test_exit_code_by_severity() {
        assert_eq!(exit_code(ErrorSeverity::Low), 1);
        assert_eq!(exit_code(ErrorSeverity::Medium), 2);
        assert_eq!(exit_code(ErrorSeverity::High), 1);
        assert_eq!(exit_code(ErrorSeverity::Critical), 3);
    }

    #[test]
    fn test_prepare_workspace_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        prepare_workspace(temp_dir.path()).unwrap();
        for dir in WORKSPACE_DIRS {
            assert!(temp_dir.path().join(dir).is_dir());
        }
    }

    #[tokio::test]
    async fn test_run_plc_fixed_cycles_then_shutdown() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        let field = SimulatedField::new(config.simulation.seed, 0.0);
        let plc: PlcController<SimulatedField, CsvDataLogger> =
            PlcController::new(&config, field, None);
        let snapshots = plc.subscribe();
        let (_tx, rx) = watch::channel(false);

        run_plc(plc, Some(5), true, rx).await.unwrap();
        let last = snapshots.borrow().clone();
        assert!(last.system_running);
        // shutdown 後通訊伺服器已停止
        assert!(!last.plc_online);
    }

    #[tokio::test]
    async fn test_run_plc_safety_trip_maps_to_critical_exit() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);
        // 模擬入口壓力約 24.8 bar，必定超過上限
        config.safety.max_pressure = 10.0;
        let field = SimulatedField::new(config.simulation.seed, 0.0);
        let plc: PlcController<SimulatedField, CsvDataLogger> =
            PlcController::new(&config, field, None);
        let (_tx, rx) = watch::channel(false);

        let err = run_plc(plc, Some(3), true, rx).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::SafetyTrip { .. }));
        assert_eq!(exit_code(err.severity()), 3);
    }

    #[tokio::test]
    async fn test_run_plc_stops_on_shutdown_signal() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);
        config.controller.scan_time_ms = 10;
        let field = ProductionDataProvider::new(config.simulation.seed);
        let plc: PlcController<ProductionDataProvider, CsvDataLogger> =
            PlcController::new(&config, field, None);
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(run_plc(plc, None, false, rx));
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_hmi_falls_back_to_replay_without_plc() {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(run_hmi(None, Some(3), true, rx));
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }
}
