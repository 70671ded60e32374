use crate::adapters::communication::{ModbusServer, OpcUaServer};
use crate::config::toml_config::AnalyzerConfig;
use crate::core::multiphase::{calculate_phase_fractions, evaluate_alarms, AlarmThresholds, ProcessAlarm};
use crate::core::pid::PidController;
use crate::core::safety::SafetySystem;
use crate::core::sampling::{SamplingConditions, SamplingSequencer};
use crate::domain::model::{ProcessSnapshot, ProcessVariables};
use crate::domain::ports::{FieldIo, ProcessDataLogger, TagPublisher};
use crate::utils::error::{AnalyzerError, Result};
use crate::utils::monitor::ScanMonitor;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlLoop {
    Flow,
    Pressure,
}

/// 操作員指令 (HMI / 遠端)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    Start,
    Stop,
    EmergencyStop,
    ResetEmergencyStop,
    ResetSafety,
    SetMaintenanceMode { enabled: bool },
    SetFlowSetpoint { value: f64 },
    SetPressureSetpoint { value: f64 },
    SetTemperatureSetpoint { value: f64 },
    TunePid {
        control_loop: ControlLoop,
        kp: Option<f64>,
        ki: Option<f64>,
        kd: Option<f64>,
    },
}

/// PLC 風格的掃描控制器
///
/// 每個掃描週期依序執行：指令處理、輸入掃描、製程邏輯、輸出掃描、
/// 通訊更新、數據記錄、快照發布。
pub struct PlcController<F: FieldIo, L: ProcessDataLogger> {
    pv: ProcessVariables,
    field: F,
    logger: Option<L>,
    flow_controller: PidController,
    pressure_controller: PidController,
    safety: SafetySystem,
    sampler: SamplingSequencer,
    alarm_thresholds: AlarmThresholds,
    active_alarms: Vec<ProcessAlarm>,
    modbus: ModbusServer,
    opcua: OpcUaServer,
    command_tx: mpsc::UnboundedSender<ControlCommand>,
    command_rx: mpsc::UnboundedReceiver<ControlCommand>,
    snapshot_tx: watch::Sender<ProcessSnapshot>,
    scan_time: Duration,
    /// 程序時鐘：每次掃描前進一個 scan_time
    clock: Duration,
    scan_count: u64,
    monitor: ScanMonitor,
    monitor_interval: u64,
}

impl<F: FieldIo, L: ProcessDataLogger> PlcController<F, L> {
    pub fn new(config: &AnalyzerConfig, field: F, logger: Option<L>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(ProcessSnapshot::default());

        tracing::info!(
            "PLC controller initialized (scan time {} ms)",
            config.controller.scan_time_ms
        );

        Self {
            pv: ProcessVariables::default(),
            field,
            logger,
            flow_controller: PidController::with_parameters(config.flow_pid()),
            pressure_controller: PidController::with_parameters(config.pressure_pid()),
            safety: SafetySystem::new(config.safety.clone()),
            sampler: SamplingSequencer::new(config.sampling.clone()),
            alarm_thresholds: config.alarms.clone(),
            active_alarms: Vec::new(),
            modbus: ModbusServer::new(config.communication.modbus_port),
            opcua: OpcUaServer::new(config.communication.opcua_port),
            command_tx,
            command_rx,
            snapshot_tx,
            scan_time: config.scan_time(),
            clock: Duration::ZERO,
            scan_count: 0,
            monitor: ScanMonitor::new(config.monitoring.enabled),
            monitor_interval: config.monitoring.interval_scans.max(1),
        }
    }

    pub fn command_sender(&self) -> mpsc::UnboundedSender<ControlCommand> {
        self.command_tx.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn pv(&self) -> &ProcessVariables {
        &self.pv
    }

    pub fn safety(&self) -> &SafetySystem {
        &self.safety
    }

    pub fn sampler(&self) -> &SamplingSequencer {
        &self.sampler
    }

    pub fn modbus(&self) -> &ModbusServer {
        &self.modbus
    }

    pub fn opcua(&self) -> &OpcUaServer {
        &self.opcua
    }

    pub fn field(&self) -> &F {
        &self.field
    }

    pub fn scan_count(&self) -> u64 {
        self.scan_count
    }

    pub fn active_alarms(&self) -> &[ProcessAlarm] {
        &self.active_alarms
    }

    pub fn pid(&self, control_loop: ControlLoop) -> &PidController {
        match control_loop {
            ControlLoop::Flow => &self.flow_controller,
            ControlLoop::Pressure => &self.pressure_controller,
        }
    }

    pub fn pid_mut(&mut self, control_loop: ControlLoop) -> &mut PidController {
        match control_loop {
            ControlLoop::Flow => &mut self.flow_controller,
            ControlLoop::Pressure => &mut self.pressure_controller,
        }
    }

    /// HMI 使用的當前程序數據
    pub fn process_data(&self) -> ProcessSnapshot {
        let mut snapshot = ProcessSnapshot::capture(
            &self.pv,
            self.active_alarms.iter().map(ToString::to_string).collect(),
            self.safety.violations().to_vec(),
        );
        snapshot.plc_online = self.modbus.is_running();
        snapshot
    }

    pub async fn start_servers(&mut self) -> Result<()> {
        if !self.modbus.is_running() {
            self.modbus.start().await?;
        }
        if !self.opcua.is_running() {
            self.opcua.start().await?;
        }
        Ok(())
    }

    /// 執行一個完整的掃描週期；任何錯誤都會觸發緊急停機
    pub async fn scan(&mut self) -> Result<()> {
        self.clock += self.scan_time;
        self.scan_count += 1;

        let started = Instant::now();
        let result = self.execute_scan().await;
        self.monitor.record_scan(started.elapsed(), self.scan_time);
        if let Err(e) = &result {
            tracing::error!("❌ PLC scan error: {}", e);
            self.emergency_shutdown();
            if let Err(write_err) = self.field.write_outputs(&self.pv.outputs()).await {
                tracing::error!("Failed to write shutdown outputs: {}", write_err);
            }
            self.publish_snapshot();
        }

        if self.monitor.is_enabled() && self.scan_count % self.monitor_interval == 0 {
            self.monitor.log_stats(&format!("Scan #{}", self.scan_count));
        }
        result
    }

    async fn execute_scan(&mut self) -> Result<()> {
        self.process_commands();

        // Input scan
        self.input_scan().await?;

        // Process logic
        self.process_logic();

        // Output scan
        self.output_scan().await?;

        // Communication
        self.update_communication().await?;

        // Data logging
        if let Some(logger) = self.logger.as_mut() {
            logger.log_process_data(&self.pv).await?;
        }

        self.publish_snapshot();
        Ok(())
    }

    fn process_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            if let Err(e) = self.apply_command(command) {
                tracing::warn!("⚠️ Command rejected: {}", e);
            }
        }
    }

    pub fn apply_command(&mut self, command: ControlCommand) -> Result<()> {
        tracing::debug!("Operator command: {:?}", command);
        match command {
            ControlCommand::Start => self.start_system(),
            ControlCommand::Stop => {
                self.stop_system();
                Ok(())
            }
            ControlCommand::EmergencyStop => {
                self.emergency_stop();
                Ok(())
            }
            ControlCommand::ResetEmergencyStop => {
                self.reset_emergency_stop();
                Ok(())
            }
            ControlCommand::ResetSafety => {
                self.reset_safety();
                Ok(())
            }
            ControlCommand::SetMaintenanceMode { enabled } => {
                self.set_maintenance_mode(enabled);
                Ok(())
            }
            ControlCommand::SetFlowSetpoint { value } => self.set_flow_setpoint(value),
            ControlCommand::SetPressureSetpoint { value } => self.set_pressure_setpoint(value),
            ControlCommand::SetTemperatureSetpoint { value } => {
                self.set_temperature_setpoint(value)
            }
            ControlCommand::TunePid {
                control_loop,
                kp,
                ki,
                kd,
            } => self.tune_pid(control_loop, kp, ki, kd),
        }
    }

    async fn input_scan(&mut self) -> Result<()> {
        if self.pv.system_running {
            let inputs = self.field.read_inputs().await?;
            self.pv.apply_inputs(&inputs);

            // 線上量測優先，否則由密度推算
            let fractions = inputs
                .phase_fractions
                .unwrap_or_else(|| calculate_phase_fractions(inputs.density));
            self.pv.apply_fractions(&fractions);
        }
        self.pv.last_update = Utc::now();
        Ok(())
    }

    fn process_logic(&mut self) {
        if self.pv.emergency_stop {
            self.emergency_shutdown();
            return;
        }

        if !self.pv.system_running {
            return;
        }

        if !self.safety.check_safety(&self.pv) {
            self.emergency_shutdown();
            return;
        }

        if self.pv.maintenance_mode {
            // 維護中輸出保持，但進行中的取樣仍需按時關閥
            self.pv.sample_valve_open = self.sampler.finish(self.clock);
            return;
        }

        let dt = Some(self.scan_time.as_secs_f64());

        let flow_error = self.pv.flow_setpoint - self.pv.flow_rate;
        self.pv.pump_speed = self.flow_controller.update(flow_error, dt);

        let pressure_error = self.pv.pressure_setpoint - self.pv.pressure_inlet;
        self.pv.inlet_valve_position = self.pressure_controller.update(pressure_error, dt);

        let conditions = SamplingConditions {
            flow_rate: self.pv.flow_rate,
            flow_setpoint: self.pv.flow_setpoint,
            pressure_inlet: self.pv.pressure_inlet,
            pressure_setpoint: self.pv.pressure_setpoint,
        };
        self.pv.sample_valve_open = self.sampler.step(self.clock, &conditions);

        self.check_process_alarms();
    }

    fn check_process_alarms(&mut self) {
        let alarms = evaluate_alarms(&self.pv.phase_fractions(), &self.alarm_thresholds);
        for alarm in alarms.iter().filter(|a| !self.active_alarms.contains(a)) {
            tracing::warn!("🚨 Process alarm raised: {}", alarm);
        }
        if alarms.is_empty() && !self.active_alarms.is_empty() {
            tracing::info!("✅ Process alarms cleared");
        }
        self.pv.alarm_active = !alarms.is_empty();
        self.active_alarms = alarms;
    }

    async fn output_scan(&mut self) -> Result<()> {
        self.pv.pump_speed = self.pv.pump_speed.clamp(0.0, 100.0);
        self.pv.inlet_valve_position = self.pv.inlet_valve_position.clamp(0.0, 100.0);
        self.pv.outlet_valve_position = self.pv.outlet_valve_position.clamp(0.0, 100.0);
        self.field.write_outputs(&self.pv.outputs()).await
    }

    async fn update_communication(&mut self) -> Result<()> {
        let tags = self.pv.communication_tags();
        self.modbus.publish(&tags).await?;
        self.opcua.publish(&tags).await?;
        Ok(())
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(self.process_data());
    }

    /// 緊急停機：停泵、關取樣閥與入口閥、全開出口閥洩壓
    fn emergency_shutdown(&mut self) {
        if self.pv.system_running {
            tracing::error!("🚨 EMERGENCY SHUTDOWN INITIATED");
        }
        self.pv.system_running = false;
        self.pv.pump_speed = 0.0;
        self.pv.sample_valve_open = false;
        self.pv.inlet_valve_position = 0.0;
        self.pv.outlet_valve_position = 100.0;
        self.sampler.abort();
    }

    pub fn start_system(&mut self) -> Result<()> {
        if self.pv.emergency_stop {
            return Err(AnalyzerError::ControlError {
                message: "cannot start while emergency stop is active".to_string(),
            });
        }
        if self.pv.maintenance_mode {
            return Err(AnalyzerError::ControlError {
                message: "cannot start while in maintenance mode".to_string(),
            });
        }
        if !self.pv.system_running {
            // 重新啟動時清除積分，避免舊誤差造成衝擊
            self.flow_controller.reset();
            self.pressure_controller.reset();
            self.pv.outlet_valve_position = 0.0;
            self.pv.system_running = true;
            tracing::info!("✅ System started");
        }
        Ok(())
    }

    pub fn stop_system(&mut self) {
        if self.pv.system_running {
            tracing::info!("System stopped");
        }
        self.pv.system_running = false;
        self.pv.pump_speed = 0.0;
        self.pv.sample_valve_open = false;
        self.sampler.abort();
    }

    pub fn emergency_stop(&mut self) {
        tracing::warn!("🚨 Emergency stop activated");
        self.pv.emergency_stop = true;
        self.emergency_shutdown();
    }

    pub fn reset_emergency_stop(&mut self) {
        if self.pv.emergency_stop {
            tracing::info!("Emergency stop reset");
        }
        self.pv.emergency_stop = false;
    }

    pub fn reset_safety(&mut self) {
        self.safety.reset();
    }

    pub fn set_maintenance_mode(&mut self, enabled: bool) {
        self.pv.maintenance_mode = enabled;
        tracing::info!(
            "Maintenance mode {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub fn set_flow_setpoint(&mut self, value: f64) -> Result<()> {
        self.pv.flow_setpoint = checked_setpoint("flow_setpoint", value)?;
        tracing::info!("Flow setpoint changed to {:.1} m³/h", value);
        Ok(())
    }

    pub fn set_pressure_setpoint(&mut self, value: f64) -> Result<()> {
        self.pv.pressure_setpoint = checked_setpoint("pressure_setpoint", value)?;
        tracing::info!("Pressure setpoint changed to {:.1} bar", value);
        Ok(())
    }

    pub fn set_temperature_setpoint(&mut self, value: f64) -> Result<()> {
        self.pv.temperature_setpoint = checked_setpoint("temperature_setpoint", value)?;
        tracing::info!("Temperature setpoint changed to {:.1}°C", value);
        Ok(())
    }

    pub fn tune_pid(
        &mut self,
        control_loop: ControlLoop,
        kp: Option<f64>,
        ki: Option<f64>,
        kd: Option<f64>,
    ) -> Result<()> {
        for (name, gain) in [("kp", kp), ("ki", ki), ("kd", kd)] {
            if let Some(gain) = gain {
                if !gain.is_finite() || gain < 0.0 {
                    return Err(AnalyzerError::ControlError {
                        message: format!("invalid {} gain {} for {:?} loop", name, gain, control_loop),
                    });
                }
            }
        }
        self.pid_mut(control_loop).set_parameters(kp, ki, kd);
        Ok(())
    }

    /// 固定掃描次數 (--cycles 與測試使用)
    pub async fn run_cycles(&mut self, cycles: u64) -> Result<()> {
        self.start_servers().await?;
        for _ in 0..cycles {
            if let Err(e) = self.scan().await {
                tracing::warn!("Scan #{} ended in fault: {}", self.scan_count, e);
            }
        }
        Ok(())
    }

    /// 依掃描週期持續運行，直到 `shutdown` 完成
    pub async fn run<S>(&mut self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        self.start_servers().await?;
        tracing::info!("🚀 PLC scan loop running every {:?}", self.scan_time);

        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(self.scan_time);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let started = Instant::now();
                    // 錯誤已在 scan 中處理並停機
                    let _ = self.scan().await;
                    let elapsed = started.elapsed();
                    if elapsed > self.scan_time {
                        tracing::warn!(
                            "⚠️ Scan overrun: {:?} (scan time {:?})",
                            elapsed,
                            self.scan_time
                        );
                    }
                }
            }
        }

        self.shutdown().await
    }

    /// 停止通訊伺服器並關閉數據記錄
    pub async fn shutdown(&mut self) -> Result<()> {
        self.modbus.stop().await?;
        self.opcua.stop().await?;
        if let Some(logger) = self.logger.as_mut() {
            logger.close().await?;
        }
        self.publish_snapshot();
        self.monitor.log_final_stats();
        tracing::info!("PLC controller stopped after {} scans", self.scan_count);
        Ok(())
    }
}

fn checked_setpoint(field: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(AnalyzerError::ControlError {
            message: format!("{} must be a non-negative number, got {}", field, value),
        })
    }
}
