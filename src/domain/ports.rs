use crate::domain::model::{FieldInputs, FieldOutputs, ProcessVariables, TagValue};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 現場 I/O：感測器輸入與執行器輸出
#[async_trait]
pub trait FieldIo: Send + Sync {
    async fn read_inputs(&mut self) -> Result<FieldInputs>;
    async fn write_outputs(&mut self, outputs: &FieldOutputs) -> Result<()>;
}

/// 工業通訊伺服器 (Modbus TCP / OPC-UA)
#[async_trait]
pub trait TagPublisher: Send + Sync {
    fn name(&self) -> &str;
    async fn start(&mut self) -> Result<()>;
    async fn stop(&mut self) -> Result<()>;
    async fn publish(&mut self, tags: &[(&'static str, TagValue)]) -> Result<()>;
    fn is_running(&self) -> bool;
}

#[async_trait]
pub trait ProcessDataLogger: Send + Sync {
    async fn log_process_data(&mut self, pv: &ProcessVariables) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}
