//! 掃描週期監控：掃描耗時統計，以及 (cli feature) 程序 CPU/記憶體用量。

use std::time::Duration;
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// 掃描耗時統計
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanTiming {
    pub scans: u64,
    pub overruns: u64,
    pub total: Duration,
    pub max: Duration,
}

impl ScanTiming {
    pub fn record(&mut self, elapsed: Duration, budget: Duration) {
        self.scans += 1;
        self.total += elapsed;
        self.max = self.max.max(elapsed);
        if elapsed > budget {
            self.overruns += 1;
        }
    }

    pub fn average(&self) -> Duration {
        match u32::try_from(self.scans) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total / n,
            Err(_) => Duration::from_secs_f64(self.total.as_secs_f64() / self.scans as f64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessUsage {
    pub cpu_percent: f32,
    pub memory_mb: u64,
    pub peak_memory_mb: u64,
}

#[cfg(feature = "cli")]
struct ProcessProbe {
    system: System,
    pid: Pid,
    peak_memory_mb: u64,
}

#[cfg(feature = "cli")]
impl ProcessProbe {
    fn new() -> Option<Self> {
        match sysinfo::get_current_pid() {
            Ok(pid) => Some(Self {
                system: System::new(),
                pid,
                peak_memory_mb: 0,
            }),
            Err(e) => {
                tracing::warn!("Process usage unavailable: {}", e);
                None
            }
        }
    }

    fn sample(&mut self) -> Option<ProcessUsage> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );
        let process = self.system.process(self.pid)?;
        let memory_mb = process.memory() / 1024 / 1024;
        self.peak_memory_mb = self.peak_memory_mb.max(memory_mb);
        Some(ProcessUsage {
            cpu_percent: process.cpu_usage(),
            memory_mb,
            peak_memory_mb: self.peak_memory_mb,
        })
    }
}

/// 控制器掃描監控；停用時不記錄任何統計
pub struct ScanMonitor {
    enabled: bool,
    timing: ScanTiming,
    #[cfg(feature = "cli")]
    probe: Option<ProcessProbe>,
}

impl Default for ScanMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ScanMonitor {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            timing: ScanTiming::default(),
            #[cfg(feature = "cli")]
            probe: if enabled { ProcessProbe::new() } else { None },
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record_scan(&mut self, elapsed: Duration, budget: Duration) {
        if self.enabled {
            self.timing.record(elapsed, budget);
        }
    }

    pub fn timing(&self) -> &ScanTiming {
        &self.timing
    }

    #[cfg(feature = "cli")]
    pub fn process_usage(&mut self) -> Option<ProcessUsage> {
        self.probe.as_mut()?.sample()
    }

    // 非 CLI 環境沒有 sysinfo
    #[cfg(not(feature = "cli"))]
    pub fn process_usage(&mut self) -> Option<ProcessUsage> {
        None
    }

    pub fn log_stats(&mut self, label: &str) {
        if !self.enabled {
            return;
        }
        let timing = self.timing.clone();
        match self.process_usage() {
            Some(usage) => tracing::info!(
                "📊 {} - avg scan {:?}, max {:?}, overruns {}, CPU {:.1}%, Memory {}MB (peak {}MB)",
                label,
                timing.average(),
                timing.max,
                timing.overruns,
                usage.cpu_percent,
                usage.memory_mb,
                usage.peak_memory_mb
            ),
            None => tracing::info!(
                "📊 {} - avg scan {:?}, max {:?}, overruns {}",
                label,
                timing.average(),
                timing.max,
                timing.overruns
            ),
        }
    }

    pub fn log_final_stats(&mut self) {
        if self.enabled {
            self.log_stats(&format!("Final ({} scans)", self.timing.scans));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_timing_statistics() {
        let budget = Duration::from_millis(100);
        let mut timing = ScanTiming::default();
        assert_eq!(timing.average(), Duration::ZERO);

        timing.record(Duration::from_millis(40), budget);
        timing.record(Duration::from_millis(60), budget);
        timing.record(Duration::from_millis(140), budget);

        assert_eq!(timing.scans, 3);
        assert_eq!(timing.overruns, 1);
        assert_eq!(timing.max, Duration::from_millis(140));
        assert_eq!(timing.average(), Duration::from_millis(80));
    }

    #[test]
    fn test_disabled_monitor_records_nothing() {
        let mut monitor = ScanMonitor::default();
        assert!(!monitor.is_enabled());
        monitor.record_scan(Duration::from_millis(5), Duration::from_millis(1));
        assert_eq!(monitor.timing().scans, 0);
        monitor.log_final_stats();
    }

    #[test]
    fn test_enabled_monitor_counts_overruns() {
        let mut monitor = ScanMonitor::new(true);
        monitor.record_scan(Duration::from_millis(5), Duration::from_millis(1));
        monitor.record_scan(Duration::from_micros(500), Duration::from_millis(1));
        assert_eq!(monitor.timing().scans, 2);
        assert_eq!(monitor.timing().overruns, 1);
        monitor.log_stats("test");
    }
}
