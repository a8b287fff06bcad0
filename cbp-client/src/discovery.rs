use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::Context;
use tokio::net::UdpSocket;

/// Broadcasts the discovery probe and returns the address of the first
/// server that answers, or an error if nothing replies within `timeout`.
pub async fn find_server(discovery_port: u16, timeout: Duration) -> anyhow::Result<SocketAddr> {
    let socket = UdpSocket::bind((IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0))
        .await
        .context("binding discovery socket")?;
    socket.set_broadcast(true).context("enabling UDP broadcast")?;

    let broadcast_addr: SocketAddr = (Ipv4Addr::BROADCAST, discovery_port).into();
    socket
        .send_to(cbp_protocol::DISCOVERY_PROBE, broadcast_addr)
        .await
        .context("sending discovery probe")?;

    let mut buf = [0u8; 16];
    let (n, peer) = tokio::time::timeout(timeout, socket.recv_from(&mut buf))
        .await
        .context("no discovery reply before timeout")?
        .context("discovery recv failed")?;

    let body = &buf[..n];
    let nul = body.iter().position(|&b| b == 0).unwrap_or(body.len());
    let port_str = std::str::from_utf8(&body[..nul]).context("discovery reply was not ASCII")?;
    let port: u16 = port_str.parse().context("discovery reply was not a valid port")?;

    Ok(SocketAddr::new(peer.ip(), port))
}
