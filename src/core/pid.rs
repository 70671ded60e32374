//! Industrial PID controller with anti-windup, derivative filtering,
//! output limiting, deadband and bumpless manual/auto transfer.

use crate::utils::error::{AnalyzerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Instant;

const MAX_HISTORY: usize = 1000;
const METRICS_WINDOW: usize = 100;
const SETTLING_TOLERANCE: f64 = 0.02;
const SETTLING_RUN: usize = 10;
const OSCILLATION_CV_THRESHOLD: f64 = 0.1;
const MAX_TUNING_GAIN: f64 = 100.0;
const TUNING_GAIN_STEP: f64 = 1.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidParameters {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub output_min: f64,
    pub output_max: f64,
    /// 積分項上下限 (anti-windup)
    pub integral_limit: f64,
    /// 微分一階濾波時間常數 (秒)
    pub derivative_filter_time: f64,
    pub deadband: f64,
    /// 取樣時間 (秒)
    pub sample_time: f64,
}

impl Default for PidParameters {
    fn default() -> Self {
        Self {
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
            output_min: 0.0,
            output_max: 100.0,
            integral_limit: 100.0,
            derivative_filter_time: 0.1,
            deadband: 0.0,
            sample_time: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PidComponents {
    pub proportional: f64,
    pub integral: f64,
    pub derivative: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub mean_error: f64,
    pub std_error: f64,
    pub max_error: f64,
    pub min_error: f64,
    pub rms_error: f64,
    pub settling_time: Option<f64>,
    pub overshoot: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PidStatus {
    pub auto_mode: bool,
    pub manual_output: f64,
    pub parameters: PidParameters,
    pub components: PidComponents,
    pub integral_value: f64,
    pub last_error: f64,
    pub initialized: bool,
}

/// Ziegler-Nichols 自動整定結果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TuningResult {
    pub ultimate_gain: f64,
    pub ultimate_period: f64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

#[derive(Debug, Clone)]
pub struct PidController {
    params: PidParameters,
    last_error: f64,
    integral: f64,
    last_derivative: f64,
    last_time: Option<Instant>,
    auto_mode: bool,
    manual_output: f64,
    initialized: bool,
    error_history: VecDeque<f64>,
    output_history: VecDeque<f64>,
}

impl PidController {
    pub fn new(kp: f64, ki: f64, kd: f64, output_limits: (f64, f64), sample_time: f64) -> Self {
        Self::with_parameters(PidParameters {
            kp,
            ki,
            kd,
            output_min: output_limits.0,
            output_max: output_limits.1,
            sample_time,
            ..PidParameters::default()
        })
    }

    pub fn with_parameters(params: PidParameters) -> Self {
        tracing::debug!(
            "PID controller initialized: Kp={}, Ki={}, Kd={}",
            params.kp,
            params.ki,
            params.kd
        );
        Self {
            params,
            last_error: 0.0,
            integral: 0.0,
            last_derivative: 0.0,
            last_time: None,
            auto_mode: true,
            manual_output: 0.0,
            initialized: false,
            error_history: VecDeque::with_capacity(MAX_HISTORY),
            output_history: VecDeque::with_capacity(MAX_HISTORY),
        }
    }

    pub fn parameters(&self) -> &PidParameters {
        &self.params
    }

    pub fn is_auto(&self) -> bool {
        self.auto_mode
    }

    /// 以新的誤差 (setpoint - pv) 更新控制器；`dt` 為 None 時使用牆鐘時間
    pub fn update(&mut self, error: f64, dt: Option<f64>) -> f64 {
        let now = Instant::now();
        let dt = match (dt, self.last_time) {
            (Some(dt), _) => dt,
            (None, Some(last)) => now.duration_since(last).as_secs_f64(),
            (None, None) => self.params.sample_time,
        };
        self.last_time = Some(now);

        // 第一次呼叫只做初始化
        if !self.initialized {
            self.last_error = error;
            self.initialized = true;
            return if self.auto_mode { 0.0 } else { self.manual_output };
        }

        if !self.auto_mode {
            return self.manual_output;
        }

        let error = if error.abs() < self.params.deadband {
            0.0
        } else {
            error
        };

        let proportional = self.params.kp * error;

        if dt > 0.0 {
            self.integral += error * dt;
            let limit = self.params.integral_limit;
            if self.integral > limit {
                self.integral = limit;
            } else if self.integral < -limit {
                self.integral = -limit;
            }
        }
        let integral = self.params.ki * self.integral;

        let derivative_filtered = if dt > 0.0 {
            let raw = (error - self.last_error) / dt;
            let filtered = if self.params.derivative_filter_time > 0.0 {
                let alpha = dt / (self.params.derivative_filter_time + dt);
                alpha * raw + (1.0 - alpha) * self.last_derivative
            } else {
                raw
            };
            self.last_derivative = filtered;
            filtered
        } else {
            0.0
        };
        let derivative = self.params.kd * derivative_filtered;

        let output = proportional + integral + derivative;
        let output_limited = self.apply_output_limits(output);

        // back-calculation：輸出飽和時回推積分項
        if output != output_limited && self.params.ki != 0.0 {
            self.integral += (output_limited - output) / self.params.ki * dt;
        }

        self.last_error = error;
        self.record_history(error, output_limited);

        output_limited
    }

    fn apply_output_limits(&self, output: f64) -> f64 {
        if output > self.params.output_max {
            self.params.output_max
        } else if output < self.params.output_min {
            self.params.output_min
        } else {
            output
        }
    }

    fn record_history(&mut self, error: f64, output: f64) {
        self.error_history.push_back(error);
        self.output_history.push_back(output);
        if self.error_history.len() > MAX_HISTORY {
            self.error_history.pop_front();
            self.output_history.pop_front();
        }
    }

    pub fn set_parameters(&mut self, kp: Option<f64>, ki: Option<f64>, kd: Option<f64>) {
        if let Some(kp) = kp {
            self.params.kp = kp;
        }
        if let Some(ki) = ki {
            self.params.ki = ki;
        }
        if let Some(kd) = kd {
            self.params.kd = kd;
        }
        tracing::info!(
            "PID parameters updated: Kp={}, Ki={}, Kd={}",
            self.params.kp,
            self.params.ki,
            self.params.kd
        );
    }

    pub fn set_output_limits(&mut self, min_output: f64, max_output: f64) -> Result<()> {
        if !(min_output < max_output) {
            return Err(AnalyzerError::ControlError {
                message: format!(
                    "Invalid output limits [{}, {}]: minimum must be below maximum",
                    min_output, max_output
                ),
            });
        }
        self.params.output_min = min_output;
        self.params.output_max = max_output;
        tracing::info!("Output limits set: [{}, {}]", min_output, max_output);
        Ok(())
    }

    /// 切換自動/手動模式；手動切回自動時做無擾切換
    pub fn set_auto_mode(&mut self, auto: bool, manual_output: f64) {
        if auto && !self.auto_mode {
            self.integral = if self.params.ki != 0.0 {
                manual_output / self.params.ki
            } else {
                0.0
            };
            tracing::info!("Switched to AUTO mode");
        } else if !auto && self.auto_mode {
            self.manual_output = manual_output;
            tracing::info!("Switched to MANUAL mode, output={}", manual_output);
        }
        self.auto_mode = auto;
    }

    pub fn reset(&mut self) {
        self.last_error = 0.0;
        self.integral = 0.0;
        self.last_derivative = 0.0;
        self.last_time = None;
        self.initialized = false;
        self.error_history.clear();
        self.output_history.clear();
        tracing::debug!("PID controller reset");
    }

    pub fn components(&self) -> PidComponents {
        PidComponents {
            proportional: self.params.kp * self.last_error,
            integral: self.params.ki * self.integral,
            derivative: self.params.kd * self.last_derivative,
        }
    }

    pub fn output_history(&self) -> impl Iterator<Item = &f64> {
        self.output_history.iter()
    }

    /// 至少 10 筆樣本才計算；統計最近 100 筆誤差
    pub fn performance_metrics(&self) -> Option<PerformanceMetrics> {
        if self.error_history.len() < SETTLING_RUN {
            return None;
        }

        let recent = self.recent_errors();
        let n = recent.len() as f64;
        let mean = recent.iter().sum::<f64>() / n;
        let variance = recent.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let max_error = recent.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min_error = recent.iter().copied().fold(f64::INFINITY, f64::min);
        let rms = (recent.iter().map(|e| e * e).sum::<f64>() / n).sqrt();

        Some(PerformanceMetrics {
            mean_error: mean,
            std_error: variance.sqrt(),
            max_error,
            min_error,
            rms_error: rms,
            settling_time: self.estimate_settling_time(),
            overshoot: self.calculate_overshoot(),
        })
    }

    fn recent_errors(&self) -> Vec<f64> {
        let skip = self.error_history.len().saturating_sub(METRICS_WINDOW);
        self.error_history.iter().skip(skip).copied().collect()
    }

    /// 連續 10 筆誤差都在 2% 以內視為穩定
    fn estimate_settling_time(&self) -> Option<f64> {
        if self.error_history.len() < 2 * SETTLING_RUN {
            return None;
        }

        let recent = self.recent_errors();
        (0..recent.len() - SETTLING_RUN)
            .find(|&i| {
                recent[i..i + SETTLING_RUN]
                    .iter()
                    .all(|e| e.abs() < SETTLING_TOLERANCE)
            })
            .map(|i| (recent.len() - i) as f64 * self.params.sample_time)
    }

    fn calculate_overshoot(&self) -> f64 {
        if self.error_history.len() < SETTLING_RUN {
            return 0.0;
        }
        let min_error = self
            .error_history
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        if min_error < 0.0 {
            min_error.abs()
        } else {
            0.0
        }
    }

    pub fn status(&self) -> PidStatus {
        PidStatus {
            auto_mode: self.auto_mode,
            manual_output: self.manual_output,
            parameters: self.params.clone(),
            components: self.components(),
            integral_value: self.integral,
            last_error: self.last_error,
            initialized: self.initialized,
        }
    }

    /// Ziegler-Nichols 自動整定
    ///
    /// `plant` 接收控制輸出並回傳下一個取樣的過程值，每次試驗執行 `trial_steps` 個取樣。
    /// 失敗時還原原本的增益。
    pub fn auto_tune<P>(&mut self, setpoint: f64, mut plant: P, trial_steps: usize) -> Result<TuningResult>
    where
        P: FnMut(f64) -> f64,
    {
        tracing::info!("Starting PID auto-tuning (setpoint={})", setpoint);
        let original = (self.params.kp, self.params.ki, self.params.kd);

        match self.find_ultimate_parameters(setpoint, &mut plant, trial_steps) {
            Some((ultimate_gain, ultimate_period)) => {
                let kp = 0.6 * ultimate_gain;
                let ki = 2.0 * kp / ultimate_period;
                let kd = kp * ultimate_period / 8.0;
                self.set_parameters(Some(kp), Some(ki), Some(kd));
                self.reset();
                tracing::info!(
                    "Auto-tuning complete: Kp={:.3}, Ki={:.3}, Kd={:.3}",
                    kp,
                    ki,
                    kd
                );
                Ok(TuningResult {
                    ultimate_gain,
                    ultimate_period,
                    kp,
                    ki,
                    kd,
                })
            }
            None => {
                self.set_parameters(Some(original.0), Some(original.1), Some(original.2));
                self.reset();
                tracing::error!("Auto-tuning failed: could not determine ultimate parameters");
                Err(AnalyzerError::ControlError {
                    message: "auto-tuning found no sustained oscillation below gain 100".to_string(),
                })
            }
        }
    }

    fn find_ultimate_parameters<P>(
        &mut self,
        setpoint: f64,
        plant: &mut P,
        trial_steps: usize,
    ) -> Option<(f64, f64)>
    where
        P: FnMut(f64) -> f64,
    {
        self.set_parameters(Some(1.0), Some(0.0), Some(0.0));

        let mut gain = 1.0;
        let mut pv = plant(0.0);
        while gain < MAX_TUNING_GAIN {
            self.params.kp = gain;
            self.reset();

            let mut measurements = Vec::with_capacity(trial_steps);
            for _ in 0..trial_steps {
                let output = self.update(setpoint - pv, Some(self.params.sample_time));
                pv = plant(output);
                measurements.push(pv);
            }

            if is_oscillating(&measurements) {
                let period = self.measure_oscillation_period(&measurements);
                tracing::debug!("Oscillation detected at gain {:.3}, period {:.3}s", gain, period);
                return Some((gain, period));
            }
            gain *= TUNING_GAIN_STEP;
        }
        None
    }

    /// 以穿越平均值的間距估算振盪週期
    fn measure_oscillation_period(&self, measurements: &[f64]) -> f64 {
        let fallback = 2.0 * self.params.sample_time * 50.0;
        if measurements.is_empty() {
            return fallback;
        }
        let mean = measurements.iter().sum::<f64>() / measurements.len() as f64;
        let crossings: Vec<usize> = measurements
            .windows(2)
            .enumerate()
            .filter(|(_, w)| (w[0] - mean) * (w[1] - mean) < 0.0)
            .map(|(i, _)| i + 1)
            .collect();

        match (crossings.first(), crossings.last()) {
            (Some(first), Some(last)) if crossings.len() >= 3 => {
                let spacing = (last - first) as f64 / (crossings.len() - 1) as f64;
                2.0 * spacing * self.params.sample_time
            }
            _ => fallback,
        }
    }
}

/// 變異係數 > 10% 視為振盪
fn is_oscillating(measurements: &[f64]) -> bool {
    if measurements.len() < SETTLING_RUN {
        return false;
    }
    let n = measurements.len() as f64;
    let mean = measurements.iter().sum::<f64>() / n;
    let variance = measurements.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let cv = if mean != 0.0 {
        variance.sqrt() / mean.abs()
    } else {
        0.0
    };
    cv > OSCILLATION_CV_THRESHOLD
}
