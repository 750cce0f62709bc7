//! Network association backed by an HTTPS reachability probe.
//!
//! On a host build there is no radio to associate; the link is considered
//! up when the bot API endpoint answers. The probe doubles as the
//! association attempt, so `begin` has nothing to kick off.

use std::net::{IpAddr, UdpSocket};
use std::time::Duration;

use anyhow::{anyhow, Result};
use log::debug;

use super::NetLink;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HttpProbeLink {
    client: reqwest::Client,
    probe_url: String,
}

impl HttpProbeLink {
    pub fn new(token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| anyhow!("Failed to build probe client: {}", e))?;
        Ok(HttpProbeLink {
            client,
            probe_url: format!("https://api.telegram.org/bot{}/getMe", token),
        })
    }
}

impl NetLink for HttpProbeLink {
    async fn begin(&mut self) {
        // Probe-based association has no separate kick-off step.
    }

    async fn is_up(&mut self) -> bool {
        match self.client.get(&self.probe_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Link probe failed: {}", e);
                false
            }
        }
    }

    fn local_addr(&self) -> String {
        local_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }
}

/// Best-effort local address discovery: a connected UDP socket reveals the
/// outbound interface without sending anything.
fn local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:53").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}
