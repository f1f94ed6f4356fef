//! Zeroconf/mDNS advertising of `_daap._tcp.local.`, so iTunes-style
//! clients discover the server without a configured hostname. Built on
//! `mdns-sd`, the standard crate for this niche.

use std::net::IpAddr;

use mdns_sd::{ServiceDaemon, ServiceInfo};
use rand::RngCore;

use daap_core::Config;

const SERVICE_TYPE: &str = "_daap._tcp.local.";

/// Holds the `mdns-sd` daemon and the registered service's fullname so
/// it can be unregistered on shutdown. Dropping this without calling
/// [`Advertiser::shutdown`] leaves the daemon's background thread
/// running for the rest of the process, matching `ServiceDaemon`'s own
/// contract.
pub struct Advertiser {
    daemon: ServiceDaemon,
    fullname: String,
}

impl Advertiser {
    /// Registers the server on the local network. `machine_id` and
    /// `database_id` are lowercase hex renderings of random 64-bit
    /// values, generated fresh per process unless the config pins a
    /// server persistent id.
    pub fn start(config: &Config, bind_ip: IpAddr, server_persistent_id: u64) -> anyhow::Result<Self> {
        let daemon = ServiceDaemon::new()?;

        let host_name = format!("{}.local.", hostname_or_fallback());
        let instance_name = config.server.name.clone();
        let machine_id = random_hex_id();
        let database_id = hex::encode(server_persistent_id.to_be_bytes());

        let properties: Vec<(String, String)> = vec![
            ("txtvers".to_string(), "1".to_string()),
            (
                "Password".to_string(),
                if config.server.password.is_some() { "1" } else { "0" }.to_string(),
            ),
            ("Machine Name".to_string(), instance_name.clone()),
            ("Machine ID".to_string(), machine_id),
            ("Database ID".to_string(), database_id),
            ("Version".to_string(), env!("CARGO_PKG_VERSION").to_string()),
        ];

        let service_info = ServiceInfo::new(
            SERVICE_TYPE,
            &instance_name,
            &host_name,
            bind_ip.to_string(),
            config.server.port,
            properties,
        )?;
        let fullname = service_info.get_fullname().to_string();

        daemon.register(service_info)?;

        Ok(Self { daemon, fullname })
    }

    /// Unregisters the service and stops the daemon's background
    /// thread. Best-effort: failures here don't block process exit.
    pub fn shutdown(self) {
        if let Err(err) = self.daemon.unregister(&self.fullname) {
            tracing::warn!(error = %err, "failed to unregister mDNS service");
        }
        if let Err(err) = self.daemon.shutdown() {
            tracing::warn!(error = %err, "failed to shut down mDNS daemon");
        }
    }
}

fn hostname_or_fallback() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "daap-server".to_string())
}

fn random_hex_id() -> String {
    hex::encode(rand::thread_rng().next_u64().to_be_bytes())
}
