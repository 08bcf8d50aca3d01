//! Session data path: TUN device and route ownership
//!
//! When tunnelling is enabled, an established PDU session owns a TUN
//! device carrying its user plane, addressed with the core-assigned IP.
//! Creation needs Linux and CAP_NET_ADMIN, so the real implementation
//! sits behind the `tunnel` feature; teardown is best-effort and never
//! fails the caller.

use std::net::Ipv4Addr;

use coreprobe_common::Error;
use tracing::debug;

/// OS resources backing one PDU session.
#[derive(Debug)]
pub struct SessionDataPath {
    name: String,
    address: Ipv4Addr,
    #[cfg(all(target_os = "linux", feature = "tunnel"))]
    device: Option<tun_rs::AsyncDevice>,
    route_added: bool,
}

impl SessionDataPath {
    /// Creates and addresses the TUN device for a session. The device
    /// is named after the UE and session ids (`cptun<ue>p<psi>`).
    #[cfg(all(target_os = "linux", feature = "tunnel"))]
    pub async fn create(ue_id: u8, psi: u8, address: Ipv4Addr) -> Result<Self, Error> {
        use tracing::{info, warn};

        let name = format!("cptun{ue_id}p{psi}");

        let mut config = tun_rs::Configuration::default();
        config.name(&name);
        config.layer(tun_rs::Layer::L3);
        config.mtu(1400);
        config.up();

        let device = tun_rs::create_as_async(&config)
            .map_err(|e| Error::Network(std::io::Error::other(e.to_string())))?;

        run_ip(&["addr", "add", &format!("{address}/24"), "dev", &name]).await?;
        run_ip(&["link", "set", &name, "up"]).await?;
        let route_added = run_ip(&["route", "add", "default", "dev", &name]).await.is_ok();
        if !route_added {
            warn!(%name, "default route not installed, continuing without it");
        }

        info!(%name, %address, "session data path up");
        Ok(Self {
            name,
            address,
            device: Some(device),
            route_added,
        })
    }

    /// Without the `tunnel` feature there is no user-plane backend.
    #[cfg(not(all(target_os = "linux", feature = "tunnel")))]
    pub async fn create(_ue_id: u8, _psi: u8, _address: Ipv4Addr) -> Result<Self, Error> {
        Err(Error::Config(
            "TUN data path requires Linux and the `tunnel` feature".into(),
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// Tears the resources down. All errors are ignored; the kernel
    /// removes the interface when the device handle closes anyway.
    pub fn release(&mut self) {
        debug!(name = %self.name, address = %self.address, "releasing session data path");
        #[cfg(all(target_os = "linux", feature = "tunnel"))]
        {
            if self.route_added {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    let name = self.name.clone();
                    handle.spawn(async move {
                        let _ = run_ip(&["route", "del", "default", "dev", &name]).await;
                    });
                }
            }
            self.device = None;
        }
        self.route_added = false;
    }
}

#[cfg(all(target_os = "linux", feature = "tunnel"))]
async fn run_ip(args: &[&str]) -> Result<(), Error> {
    let output = tokio::process::Command::new("ip")
        .args(args)
        .output()
        .await
        .map_err(Error::Network)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // An already-present address is fine on a retried setup.
        if !stderr.contains("File exists") {
            return Err(Error::Network(std::io::Error::other(format!(
                "ip {}: {stderr}",
                args.join(" ")
            ))));
        }
    }
    Ok(())
}
