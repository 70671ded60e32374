use crate::domain::model::{FieldInputs, FieldOutputs};
use crate::domain::ports::FieldIo;
use crate::utils::error::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TEMPERATURE_BASELINE: f64 = 60.0;
const DENSITY_BASELINE: f64 = 900.0;
/// 泵浦 100% 對應的流量 (m³/h)
const PUMP_FLOW_GAIN: f64 = 2.0;
/// 入口閥 100% 對應的壓力 (bar)
const VALVE_PRESSURE_GAIN: f64 = 0.5;
const OUTLET_PRESSURE_RATIO: f64 = 0.75;

/// 現場模擬：隨機漫步加上可選的一階製程響應
pub struct SimulatedField {
    rng: StdRng,
    state: FieldInputs,
    outputs: FieldOutputs,
    process_response: f64,
}

impl SimulatedField {
    pub fn new(seed: Option<u64>, process_response: f64) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let pressure_inlet = 24.8;
        Self {
            rng,
            state: FieldInputs {
                flow_rate: 85.2,
                pressure_inlet,
                pressure_outlet: pressure_inlet * OUTLET_PRESSURE_RATIO,
                temperature: 58.7,
                density: DENSITY_BASELINE,
                phase_fractions: None,
            },
            outputs: FieldOutputs::default(),
            process_response: process_response.clamp(0.0, 1.0),
        }
    }

    pub fn with_initial_state(mut self, state: FieldInputs) -> Self {
        self.state = state;
        self
    }

    pub fn last_outputs(&self) -> &FieldOutputs {
        &self.outputs
    }

    fn step(&mut self) {
        let k = self.process_response;
        let s = &mut self.state;

        s.flow_rate += self.rng.random_range(-2.0..=2.0);
        s.pressure_inlet += self.rng.random_range(-0.5..=0.5);
        s.temperature += self.rng.random_range(-1.0..=1.0);
        s.density += self.rng.random_range(-3.0..=3.0);

        if k > 0.0 {
            s.flow_rate += (self.outputs.pump_speed * PUMP_FLOW_GAIN - s.flow_rate) * k;
            s.pressure_inlet +=
                (self.outputs.inlet_valve_position * VALVE_PRESSURE_GAIN - s.pressure_inlet) * k;
            s.temperature += (TEMPERATURE_BASELINE - s.temperature) * k;
            s.density += (DENSITY_BASELINE - s.density) * k;
        }

        s.flow_rate = s.flow_rate.clamp(0.0, 300.0);
        s.pressure_inlet = s.pressure_inlet.clamp(0.0, 50.0);
        s.temperature = s.temperature.clamp(10.0, 100.0);
        s.density = s.density.clamp(600.0, 1050.0);
        s.pressure_outlet = s.pressure_inlet * OUTLET_PRESSURE_RATIO;
    }
}

#[async_trait]
impl FieldIo for SimulatedField {
    async fn read_inputs(&mut self) -> Result<FieldInputs> {
        self.step();
        Ok(self.state)
    }

    async fn write_outputs(&mut self, outputs: &FieldOutputs) -> Result<()> {
        self.outputs = *outputs;
        Ok(())
    }
}
