use std::net::SocketAddr;

use slog::{debug, info, o, warn, Logger};
use tokio::net::UdpSocket;

use crate::error::ServerError;

/// Runs the UDP discovery responder forever (spec §4.6). Bind failure
/// is fatal (spec §7); anything received after that which isn't
/// exactly the `"CBP\0"` probe is logged and ignored, never causing
/// this task to exit.
pub async fn run(bind_addr: SocketAddr, service_port: u16, log: Logger) -> Result<(), ServerError> {
    let log = log.new(o!("component" => "discovery"));
    let socket = UdpSocket::bind(bind_addr)
        .await
        .map_err(|source| ServerError::BindDiscovery { addr: bind_addr, source })?;
    info!(log, "discovery responder listening"; "addr" => %bind_addr, "service_port" => service_port);

    let reply = format!("{}\0", service_port).into_bytes();
    let mut buf = [0u8; 8];
    loop {
        let (n, peer) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(log, "discovery recv failed"; "error" => %err);
                continue;
            }
        };
        if &buf[..n] != cbp_protocol::DISCOVERY_PROBE {
            debug!(log, "ignoring non-probe datagram"; "peer" => %peer, "len" => n);
            continue;
        }
        if let Err(err) = socket.send_to(&reply, peer).await {
            warn!(log, "discovery reply failed"; "peer" => %peer, "error" => %err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sloggers::Build;
    use tokio::net::UdpSocket as ClientSocket;

    fn test_logger() -> Logger {
        sloggers::null::NullLoggerBuilder.build().unwrap()
    }

    #[tokio::test]
    async fn replies_with_service_port_on_probe() {
        let server_addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let bound = UdpSocket::bind(server_addr).await.unwrap();
        let local_addr = bound.local_addr().unwrap();
        drop(bound);

        let log = test_logger();
        tokio::spawn(run(local_addr, 21210, log));
        // give the task a moment to bind before probing
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let client = ClientSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(local_addr).await.unwrap();
        client.send(cbp_protocol::DISCOVERY_PROBE).await.unwrap();

        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(std::time::Duration::from_secs(2), client.recv(&mut buf))
            .await
            .expect("discovery reply timed out")
            .unwrap();
        assert_eq!(&buf[..n], b"21210\0");
    }

    #[tokio::test]
    async fn ignores_non_probe_datagrams() {
        let bound = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let local_addr = bound.local_addr().unwrap();
        drop(bound);

        let log = test_logger();
        tokio::spawn(run(local_addr, 21210, log));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let client = ClientSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(local_addr).await.unwrap();
        client.send(b"not a probe").await.unwrap();

        let mut buf = [0u8; 16];
        let result = tokio::time::timeout(std::time::Duration::from_millis(300), client.recv(&mut buf)).await;
        assert!(result.is_err(), "expected no reply to a non-probe datagram");
    }
}
