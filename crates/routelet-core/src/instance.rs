//! Service instance data model

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One concrete, routable endpoint registered under a service name.
///
/// Instances are immutable once constructed; the registry collaborator owns
/// their lifecycle. For blacklisting and selection two instances with the
/// same `(ip, port)` are the same routing target regardless of service name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Service this instance is registered under
    pub service_name: String,
    /// Host address
    pub ip: String,
    /// Port number
    pub port: u16,
    /// Relative selection weight for weighted strategies
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Registry-supplied metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_weight() -> f64 {
    1.0
}

impl ServiceInstance {
    /// Create a new instance with default weight and no metadata
    pub fn new(service_name: impl Into<String>, ip: impl Into<String>, port: u16) -> Self {
        Self {
            service_name: service_name.into(),
            ip: ip.into(),
            port,
            weight: 1.0,
            metadata: HashMap::new(),
        }
    }

    /// Set the selection weight
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The `"ip:port"` form used as the blacklist key
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// Get the URL for this instance
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.ip, self.port)
    }
}
