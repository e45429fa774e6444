use super::{ReceiveError, BUFFER_SIZE};
use serde::de::DeserializeOwned;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;

/// Bound (unconnected) UDP socket receiving one JSON document per datagram,
/// from whichever peer sends it.
pub struct UdpReceiver {
    socket: UdpSocket,
    buffer: [u8; BUFFER_SIZE],
}

impl UdpReceiver {
    pub async fn bind(port: u16) -> Result<Self, io::Error> {
        let socket = UdpSocket::bind(SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), port)).await?;
        Ok(Self {
            socket,
            buffer: [0u8; BUFFER_SIZE],
        })
    }

    pub async fn receive<T: DeserializeOwned>(&mut self) -> Result<T, ReceiveError> {
        let received_bytes_count = self
            .socket
            .recv(&mut self.buffer)
            .await
            .map_err(ReceiveError::SocketReceiveError)?;
        serde_json::from_slice(&self.buffer[0..received_bytes_count])
            .map_err(ReceiveError::DecodeError)
    }
}
