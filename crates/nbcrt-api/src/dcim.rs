// DCIM endpoints: sites, devices, console server ports.

use tracing::debug;

use crate::client::NetBoxClient;
use crate::error::Error;
use crate::models::{ConsoleServerPort, Device, Site};

impl NetBoxClient {
    /// List every site.
    ///
    /// `GET /api/dcim/sites/`
    pub async fn list_sites(&self) -> Result<Vec<Site>, Error> {
        debug!("listing sites");
        self.paginate_all("dcim/sites/", &[]).await
    }

    /// List every device that has a primary IP assigned.
    ///
    /// `GET /api/dcim/devices/?has_primary_ip=true`
    pub async fn list_devices(&self) -> Result<Vec<Device>, Error> {
        debug!("listing devices");
        self.paginate_all("dcim/devices/", &[("has_primary_ip", "true")])
            .await
    }

    /// List every console server port, cabled or not.
    ///
    /// `GET /api/dcim/console-server-ports/`
    pub async fn list_console_server_ports(&self) -> Result<Vec<ConsoleServerPort>, Error> {
        debug!("listing console server ports");
        self.paginate_all("dcim/console-server-ports/", &[]).await
    }
}
