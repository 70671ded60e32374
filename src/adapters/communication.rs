//! In-process Modbus TCP and OPC-UA tag servers.
//!
//! Both servers hold the latest published process tags so that supervisory
//! clients in the same process (HMI, analysis engine) can read them. No wire
//! protocol is spoken.

use crate::domain::model::TagValue;
use crate::domain::ports::TagPublisher;
use crate::utils::error::{AnalyzerError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;

pub const DEFAULT_MODBUS_PORT: u16 = 502;
pub const DEFAULT_OPCUA_PORT: u16 = 4840;
/// OPC-UA 節點命名空間索引
const OPCUA_NAMESPACE: u16 = 2;

fn check_port(server: &str, port: u16) -> Result<()> {
    if port == 0 {
        return Err(AnalyzerError::CommunicationError {
            server: server.to_string(),
            message: "cannot listen on port 0".to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ModbusServer {
    port: u16,
    registers: BTreeMap<String, TagValue>,
    running: bool,
}

impl ModbusServer {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            registers: BTreeMap::new(),
            running: false,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn register(&self, tag: &str) -> Option<TagValue> {
        self.registers.get(tag).copied()
    }

    pub fn registers(&self) -> &BTreeMap<String, TagValue> {
        &self.registers
    }
}

impl Default for ModbusServer {
    fn default() -> Self {
        Self::new(DEFAULT_MODBUS_PORT)
    }
}

#[async_trait]
impl TagPublisher for ModbusServer {
    fn name(&self) -> &str {
        "Modbus TCP"
    }

    async fn start(&mut self) -> Result<()> {
        check_port(self.name(), self.port)?;
        self.running = true;
        tracing::info!("📡 Modbus TCP server started on port {}", self.port);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.running = false;
        tracing::info!("Modbus TCP server stopped");
        Ok(())
    }

    async fn publish(&mut self, tags: &[(&'static str, TagValue)]) -> Result<()> {
        for (name, value) in tags {
            self.registers.insert((*name).to_string(), *value);
        }
        tracing::debug!("Updated Modbus registers: {} values", tags.len());
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

#[derive(Debug, Clone)]
pub struct OpcUaServer {
    port: u16,
    variables: BTreeMap<String, TagValue>,
    running: bool,
}

impl OpcUaServer {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            variables: BTreeMap::new(),
            running: false,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn node_id(tag: &str) -> String {
        format!("ns={};s={}", OPCUA_NAMESPACE, tag)
    }

    pub fn read_node(&self, node_id: &str) -> Option<TagValue> {
        self.variables.get(node_id).copied()
    }

    pub fn variables(&self) -> &BTreeMap<String, TagValue> {
        &self.variables
    }
}

impl Default for OpcUaServer {
    fn default() -> Self {
        Self::new(DEFAULT_OPCUA_PORT)
    }
}

#[async_trait]
impl TagPublisher for OpcUaServer {
    fn name(&self) -> &str {
        "OPC-UA"
    }

    async fn start(&mut self) -> Result<()> {
        check_port(self.name(), self.port)?;
        self.running = true;
        tracing::info!("📡 OPC-UA server started on port {}", self.port);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.running = false;
        tracing::info!("OPC-UA server stopped");
        Ok(())
    }

    async fn publish(&mut self, tags: &[(&'static str, TagValue)]) -> Result<()> {
        for (name, value) in tags {
            self.variables.insert(Self::node_id(name), *value);
        }
        tracing::debug!("Updated OPC-UA variables: {} values", tags.len());
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}
