//! Datagram transport seam between the device client and the network
//!
//! The client talks to the unit through the [`Transport`] trait so the
//! timeout/retry policy stays testable against a scripted transport. The
//! production implementation owns one UDP socket connected to the
//! configured unit for the lifetime of the process.

use std::io;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::protocol::codec::MAX_FRAME_SIZE;

/// A connectionless send/receive pair carrying whole datagrams
#[async_trait]
pub trait Transport: Send {
    /// Sends one outgoing frame
    async fn send(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Waits for the next incoming datagram
    ///
    /// May wait forever; the caller bounds the wait with its own timeout.
    async fn recv(&mut self) -> io::Result<Vec<u8>>;
}

/// UDP transport bound to an ephemeral local port and connected to the unit
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Binds a socket and connects it to the unit's address
    ///
    /// Name resolution happens here, so an unresolvable host fails at
    /// startup instead of on the first transaction.
    pub async fn connect(host: &str, port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
        socket.connect((host, port)).await?;
        debug!("UDP socket connected to {}:{}", host, port);
        Ok(UdpTransport { socket })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        self.socket.send(frame).await?;
        Ok(())
    }

    async fn recv(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; MAX_FRAME_SIZE * 2];
        let len = self.socket.recv(&mut buf).await?;
        buf.truncate(len);
        Ok(buf)
    }
}
