// ── Console server port ──

use serde::{Deserialize, Serialize};

/// A console server port and the device cabled to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolePort {
    pub id: i64,
    pub name: String,
    /// The console server that owns the port.
    pub server_id: i64,
    pub server_name: String,
    /// Device at the far end of the cable, if connected.
    pub endpoint_id: Option<i64>,
    pub endpoint_name: Option<String>,
}

impl ConsolePort {
    pub fn is_connected(&self) -> bool {
        self.endpoint_id.is_some()
    }
}
