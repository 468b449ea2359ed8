//! Static node-type schemas: a `NodeDefinition` pairs metadata (name,
//! category, icon) with a ports/controls interface, kept as a
//! YAML-serializable struct so hosts can seed the catalog from disk.

use crate::types::{ControlDefinition, PortDefinition};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Supported host platforms a node type may declare support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Web,
    Electron,
}

/// A node type's requirement on a connection configuration being present.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConnectionRequirement {
    pub protocol: String,
    pub control_id: String,
    #[serde(default)]
    pub required: bool,
}

/// Static schema for one node type.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NodeDefinition {
    pub node_type: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ports: PortSchema,
    #[serde(default)]
    pub controls: Vec<ControlDefinition>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub connection: Option<ConnectionRequirement>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PortSchema {
    #[serde(default)]
    pub inputs: Vec<PortDefinition>,
    #[serde(default)]
    pub outputs: Vec<PortDefinition>,
}

impl NodeDefinition {
    pub fn supports_platform(&self, platform: Platform) -> bool {
        self.platforms.is_empty() || self.platforms.contains(&platform)
    }

    pub fn input(&self, port_id: &str) -> Option<&PortDefinition> {
        self.ports.inputs.iter().find(|p| p.id == port_id)
    }

    pub fn output(&self, port_id: &str) -> Option<&PortDefinition> {
        self.ports.outputs.iter().find(|p| p.id == port_id)
    }
}
