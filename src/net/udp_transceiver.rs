use super::{ReceiveError, SendError, BUFFER_SIZE};
use serde::{de::DeserializeOwned, Serialize};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;

/// Connected UDP socket carrying one JSON document per datagram.
pub struct UdpTransceiver {
    socket: UdpSocket,
    buffer: [u8; BUFFER_SIZE],
}

#[derive(Debug)]
pub enum UdpTransceiverCreationError {
    SocketBindError(io::Error),
    SocketConnectError(io::Error),
}

impl UdpTransceiver {
    pub async fn new(ip: Ipv4Addr, port: u16) -> Result<Self, UdpTransceiverCreationError> {
        let socket = UdpSocket::bind(SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0))
            .await
            .map_err(UdpTransceiverCreationError::SocketBindError)?;
        socket
            .connect(SocketAddrV4::new(ip, port))
            .await
            .map_err(UdpTransceiverCreationError::SocketConnectError)?;
        let buffer = [0u8; BUFFER_SIZE];

        Ok(Self { socket, buffer })
    }

    pub async fn send<T: Serialize>(&self, packet: &T) -> Result<usize, SendError> {
        let data = serde_json::to_vec(packet).map_err(SendError::EncodeError)?;
        self.socket
            .send(&data)
            .await
            .map_err(SendError::SocketSendError)
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
