use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub interval_secs: u64,
    pub duration_secs: u64,
    /// m³/h
    pub flow_tolerance: f64,
    /// bar
    pub pressure_tolerance: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            duration_secs: 5,
            flow_tolerance: 5.0,
            pressure_tolerance: 2.0,
        }
    }
}

/// 取樣判斷所需的程序狀態
#[derive(Debug, Clone, Copy)]
pub struct SamplingConditions {
    pub flow_rate: f64,
    pub flow_setpoint: f64,
    pub pressure_inlet: f64,
    pub pressure_setpoint: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingState {
    Idle,
    Sampling { started_at: Duration },
}

/// 自動取樣序列：以控制器的程序時鐘推進，不阻塞掃描週期
#[derive(Debug, Clone)]
pub struct SamplingSequencer {
    config: SamplingConfig,
    state: SamplingState,
    last_sample_start: Option<Duration>,
    samples_taken: u64,
}

impl SamplingSequencer {
    pub fn new(config: SamplingConfig) -> Self {
        Self {
            config,
            state: SamplingState::Idle,
            last_sample_start: None,
            samples_taken: 0,
        }
    }

    pub fn state(&self) -> SamplingState {
        self.state
    }

    pub fn samples_taken(&self) -> u64 {
        self.samples_taken
    }

    /// 推進序列並回傳取樣閥應有的狀態
    pub fn step(&mut self, now: Duration, conditions: &SamplingConditions) -> bool {
        if let SamplingState::Sampling { .. } = self.state {
            return self.finish(now);
        }

        if let Some(last) = self.last_sample_start {
            if now.saturating_sub(last) < Duration::from_secs(self.config.interval_secs) {
                return false;
            }
        }

        if self.is_stable(conditions) {
            tracing::info!("🧪 Starting automatic sampling sequence");
            self.state = SamplingState::Sampling { started_at: now };
            self.last_sample_start = Some(now);
            self.samples_taken += 1;
            true
        } else {
            false
        }
    }

    /// 只推進進行中的取樣直到結束，不會開始新的取樣 (維護模式使用)
    pub fn finish(&mut self, now: Duration) -> bool {
        match self.state {
            SamplingState::Idle => false,
            SamplingState::Sampling { started_at } => {
                if now.saturating_sub(started_at) >= Duration::from_secs(self.config.duration_secs) {
                    self.state = SamplingState::Idle;
                    tracing::info!("🧪 Sampling sequence complete (sample #{})", self.samples_taken);
                    false
                } else {
                    true
                }
            }
        }
    }

    fn is_stable(&self, c: &SamplingConditions) -> bool {
        let flow_stable = (c.flow_rate - c.flow_setpoint).abs() < self.config.flow_tolerance;
        let pressure_stable =
            (c.pressure_inlet - c.pressure_setpoint).abs() < self.config.pressure_tolerance;
        flow_stable && pressure_stable
    }

    /// 緊急停機時立即關閉取樣閥
    pub fn abort(&mut self) {
        if let SamplingState::Sampling { .. } = self.state {
            tracing::warn!("Sampling sequence aborted");
        }
        self.state = SamplingState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stable() -> SamplingConditions {
        SamplingConditions {
            flow_rate: 98.0,
            flow_setpoint: 100.0,
            pressure_inlet: 24.5,
            pressure_setpoint: 25.0,
        }
    }

    fn unstable() -> SamplingConditions {
        SamplingConditions {
            flow_rate: 80.0,
            ..stable()
        }
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_first_sample_starts_immediately_when_stable() {
        let mut seq = SamplingSequencer::new(SamplingConfig::default());
        assert!(seq.step(secs(0), &stable()));
        assert_eq!(seq.state(), SamplingState::Sampling { started_at: secs(0) });
        assert_eq!(seq.samples_taken(), 1);
    }

    #[test]
    fn test_unstable_process_does_not_sample() {
        let mut seq = SamplingSequencer::new(SamplingConfig::default());
        assert!(!seq.step(secs(0), &unstable()));
        assert_eq!(seq.state(), SamplingState::Idle);
    }

    #[test]
    fn test_valve_closes_after_duration() {
        let mut seq = SamplingSequencer::new(SamplingConfig::default());
        assert!(seq.step(secs(0), &stable()));
        assert!(seq.step(secs(4), &unstable()));
        assert!(!seq.step(secs(5), &stable()));
        assert_eq!(seq.state(), SamplingState::Idle);
    }

    #[test]
    fn test_interval_measured_from_sample_start() {
        let mut seq = SamplingSequencer::new(SamplingConfig::default());
        seq.step(secs(0), &stable());
        seq.step(secs(5), &stable());
        assert!(!seq.step(secs(29), &stable()));
        assert!(seq.step(secs(30), &stable()));
        assert_eq!(seq.samples_taken(), 2);
    }

    #[test]
    fn test_abort_closes_valve() {
        let mut seq = SamplingSequencer::new(SamplingConfig::default());
        seq.step(secs(0), &stable());
        seq.abort();
        assert_eq!(seq.state(), SamplingState::Idle);
        // 中止不重設取樣間隔
        assert!(!seq.step(secs(10), &stable()));
    }

    #[test]
    fn test_finish_closes_running_sample_without_starting_new_one() {
        let mut seq = SamplingSequencer::new(SamplingConfig::default());
        assert!(!seq.finish(secs(0)));
        assert_eq!(seq.samples_taken(), 0);

        seq.step(secs(0), &stable());
        assert!(seq.finish(secs(3)));
        assert!(!seq.finish(secs(5)));
        assert_eq!(seq.state(), SamplingState::Idle);
        // 間隔已到也不會開始新取樣
        assert!(!seq.finish(secs(60)));
        assert_eq!(seq.samples_taken(), 1);
    }
}
