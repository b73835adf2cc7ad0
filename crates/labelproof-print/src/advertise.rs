// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// mDNS advertisement of the REST service.
//
// Announced as `_zplrest._tcp.local.` next to the HTTP listener so label
// tooling on the LAN can find the service without configuration.  This has
// no bearing on job semantics: registration failure is a warning, never
// fatal, and the daemon is torn down on unregister.

use mdns_sd::{ServiceDaemon, ServiceInfo};
use tracing::{info, warn};

/// mDNS service type for the ZPL REST service.
pub const SERVICE_TYPE: &str = "_zplrest._tcp.local.";

/// Instance name shown to browsers.
const SERVICE_NAME: &str = "ZPL Printer REST service";

/// Handle to a registered mDNS advertisement.
pub struct ServiceAdvertiser {
    daemon: Option<ServiceDaemon>,
    fullname: Option<String>,
}

impl ServiceAdvertiser {
    /// Register the service advertisement for the given HTTP port.
    ///
    /// Never fails: on any mDNS error the advertiser comes back inert with a
    /// warning logged; the REST service still works via direct address.
    pub fn register(port: u16) -> Self {
        let daemon = match ServiceDaemon::new() {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "failed to create mDNS daemon for advertisement");
                return Self {
                    daemon: None,
                    fullname: None,
                };
            }
        };

        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "labelproof".into());
        let properties = [("txtvers", "1"), ("description", SERVICE_NAME)];

        let fullname = match ServiceInfo::new(
            SERVICE_TYPE,
            SERVICE_NAME,
            &format!("{hostname}.local."),
            "", // empty = auto-detect IP
            port,
            &properties[..],
        ) {
            Ok(service_info) => {
                let fullname = service_info.get_fullname().to_owned();
                match daemon.register(service_info) {
                    Ok(_) => {
                        info!(
                            service_type = SERVICE_TYPE,
                            port, "mDNS service registered"
                        );
                        Some(fullname)
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to register mDNS service");
                        None
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to create mDNS ServiceInfo");
                None
            }
        };

        Self {
            daemon: Some(daemon),
            fullname,
        }
    }

    /// Withdraw the advertisement and shut the daemon down.
    pub fn unregister(&mut self) {
        if let Some(daemon) = self.daemon.take() {
            if let Some(fullname) = self.fullname.take() {
                match daemon.unregister(&fullname) {
                    Ok(_) => info!(name = %fullname, "mDNS service unregistered"),
                    Err(e) => warn!(error = %e, "failed to unregister mDNS service"),
                }
            }
            if let Err(e) = daemon.shutdown() {
                warn!(error = %e, "failed to shut down mDNS daemon");
            }
        }
    }
}
