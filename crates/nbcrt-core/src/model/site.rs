// ── Site domain type ──

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub name: String,
    pub display: String,
    /// Multi-line postal address as entered in NetBox.
    pub physical_address: String,
    pub region: Option<String>,
    /// Site group slug.
    pub group: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}
