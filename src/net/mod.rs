use std::io;

pub mod udp_receiver;
pub mod udp_transceiver;

const BUFFER_SIZE: usize = 2048;

#[derive(Debug)]
pub enum ReceiveError {
    SocketReceiveError(io::Error),
    DecodeError(serde_json::Error),
}

#[derive(Debug)]
pub enum SendError {
    SocketSendError(io::Error),
    EncodeError(serde_json::Error),
}
