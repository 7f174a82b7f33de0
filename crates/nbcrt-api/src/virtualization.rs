// Virtualization endpoints.

use tracing::debug;

use crate::client::NetBoxClient;
use crate::error::Error;
use crate::models::VirtualMachine;

impl NetBoxClient {
    /// List every virtual machine that has a primary IP assigned.
    ///
    /// `GET /api/virtualization/virtual-machines/?has_primary_ip=true`
    pub async fn list_virtual_machines(&self) -> Result<Vec<VirtualMachine>, Error> {
        debug!("listing virtual machines");
        self.paginate_all(
            "virtualization/virtual-machines/",
            &[("has_primary_ip", "true")],
        )
        .await
    }
}
