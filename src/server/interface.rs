// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Listen address resolution
//!
//! The server is started with either an IP address or the name of a network
//! interface; an interface name is resolved to the first IPv4 address
//! assigned to it.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use log::debug;

use crate::error::SetupError;

/// Turn an interface name or IP address plus a port into a socket address.
pub fn resolve_listen_address(address: &str, port: u16) -> Result<SocketAddr, SetupError> {
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    if address == "localhost" {
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port));
    }

    let ip = interface_ipv4(address).map_err(|reason| SetupError::Interface {
        interface: address.to_string(),
        reason,
    })?;
    debug!("Interface {} has address {}", address, ip);
    Ok(SocketAddr::new(IpAddr::V4(ip), port))
}

#[cfg(target_os = "linux")]
fn interface_ipv4(name: &str) -> Result<Ipv4Addr, String> {
    let addresses = nix::ifaddrs::getifaddrs().map_err(|err| err.to_string())?;

    let mut interface_exists = false;
    for entry in addresses {
        if entry.interface_name != name {
            continue;
        }
        interface_exists = true;
        if let Some(sin) = entry.address.as_ref().and_then(|a| a.as_sockaddr_in()) {
            return Ok(*std::net::SocketAddrV4::from(*sin).ip());
        }
    }

    if interface_exists {
        Err("the interface has no IPv4 address".to_string())
    } else {
        Err("no such interface".to_string())
    }
}

#[cfg(not(target_os = "linux"))]
fn interface_ipv4(_name: &str) -> Result<Ipv4Addr, String> {
    Err("interface lookup is only available on Linux, use an IP address".to_string())
}
