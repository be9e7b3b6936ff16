use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{PortEngine, PortFlags, PortInfo};
use crate::bundle::DataType;
use crate::portgroup::natural_cmp;

/// Port direction (Input sorts before Output for display)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

/// A port as the engine knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnginePort {
    /// Absolute name, `client:port`.
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub direction: PortDirection,
    #[serde(default)]
    pub physical: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub pretty_name: Option<String>,
}

impl EnginePort {
    pub fn new(name: impl Into<String>, data_type: DataType, direction: PortDirection) -> Self {
        Self {
            name: name.into(),
            data_type,
            direction,
            physical: false,
            hidden: false,
            pretty_name: None,
        }
    }

    pub fn physical(mut self) -> Self {
        self.physical = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn with_pretty_name(mut self, pretty: impl Into<String>) -> Self {
        self.pretty_name = Some(pretty.into());
        self
    }

    pub fn flags(&self) -> PortFlags {
        PortFlags {
            input: self.direction == PortDirection::Input,
            output: self.direction == PortDirection::Output,
            physical: self.physical,
            hidden: self.hidden,
        }
    }
}

/// Engine-side port table.
///
/// Backends register ports from their own thread while the UI
/// thread enumerates, so the table sits behind a lock.
#[derive(Debug, Default)]
pub struct PortRegistry {
    client_name: String,
    ports: RwLock<HashMap<String, EnginePort>>,
}

impl PortRegistry {
    pub fn new(client_name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            client_name: client_name.into(),
            ..Default::default()
        })
    }

    pub fn insert_port(&self, port: EnginePort) {
        self.ports.write().insert(port.name.clone(), port);
    }

    pub fn get_port(&self, name: &str) -> Option<EnginePort> {
        self.ports.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.ports.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.read().is_empty()
    }

    /// Ports of one type and direction, naturally sorted by name.
    pub fn ports_for(&self, data_type: DataType, direction: PortDirection) -> Vec<EnginePort> {
        let mut ports: Vec<EnginePort> = self
            .ports
            .read()
            .values()
            .filter(|p| p.data_type == data_type && p.direction == direction)
            .cloned()
            .collect();
        ports.sort_by(|a, b| natural_cmp(&a.name, &b.name));
        ports
    }
}

impl PortEngine for PortRegistry {
    fn get_ports(&self, data_type: DataType, inputs: bool) -> Vec<String> {
        let direction = if inputs {
            PortDirection::Input
        } else {
            PortDirection::Output
        };
        self.ports_for(data_type, direction)
            .into_iter()
            .map(|p| p.name)
            .collect()
    }

    fn port_info(&self, name: &str) -> Option<PortInfo> {
        self.ports.read().get(name).map(|p| PortInfo {
            data_type: p.data_type,
            flags: p.flags(),
        })
    }

    fn pretty_name(&self, name: &str) -> Option<String> {
        self.ports
            .read()
            .get(name)
            .and_then(|p| p.pretty_name.clone())
            .filter(|n| !n.is_empty())
    }

    fn make_port_name_non_relative(&self, name: &str) -> String {
        if name.contains(':') || self.client_name.is_empty() {
            name.to_string()
        } else {
            format!("{}:{}", self.client_name, name)
        }
    }
}
