// ── Inventory source ──
//
// The engine depends on this trait, not on HTTP. `NetBoxClient` is the
// production implementation; tests use in-memory fakes.

use std::future::Future;

use nbcrt_api::NetBoxClient;

use crate::error::CoreError;
use crate::model::{ConsolePort, Entity, Site};

/// Read-only access to the CMDB.
///
/// Every list call returns the complete collection or fails as a whole.
pub trait InventorySource: Send + Sync {
    fn test_connection(&self) -> impl Future<Output = Result<(), CoreError>> + Send;
    fn list_sites(&self) -> impl Future<Output = Result<Vec<Site>, CoreError>> + Send;
    fn list_devices(&self) -> impl Future<Output = Result<Vec<Entity>, CoreError>> + Send;
    fn list_virtual_machines(&self) -> impl Future<Output = Result<Vec<Entity>, CoreError>> + Send;
    fn list_console_server_ports(
        &self,
    ) -> impl Future<Output = Result<Vec<ConsolePort>, CoreError>> + Send;
}

impl InventorySource for NetBoxClient {
    async fn test_connection(&self) -> Result<(), CoreError> {
        NetBoxClient::test_connection(self)
            .await
            .map_err(|e| CoreError::fetch("status", &e))
    }

    async fn list_sites(&self) -> Result<Vec<Site>, CoreError> {
        let sites = NetBoxClient::list_sites(self)
            .await
            .map_err(|e| CoreError::fetch("sites", &e))?;
        Ok(sites.into_iter().map(Site::from).collect())
    }

    async fn list_devices(&self) -> Result<Vec<Entity>, CoreError> {
        let devices = NetBoxClient::list_devices(self)
            .await
            .map_err(|e| CoreError::fetch("devices", &e))?;
        Ok(devices.into_iter().map(Entity::from).collect())
    }

    async fn list_virtual_machines(&self) -> Result<Vec<Entity>, CoreError> {
        let vms = NetBoxClient::list_virtual_machines(self)
            .await
            .map_err(|e| CoreError::fetch("virtual machines", &e))?;
        Ok(vms.into_iter().map(Entity::from).collect())
    }

    async fn list_console_server_ports(&self) -> Result<Vec<ConsolePort>, CoreError> {
        let ports = NetBoxClient::list_console_server_ports(self)
            .await
            .map_err(|e| CoreError::fetch("console server ports", &e))?;
        Ok(ports.into_iter().map(ConsolePort::from).collect())
    }
}
