//! Datagram transport for the command link.
//!
//! [`DatagramSocket`] is the seam between the dispatcher and the network stack; [`udp`] implements
//! it for the embassy-net UDP socket.
pub mod udp;

use embassy_net::IpEndpoint;
use thiserror::Error;

use crate::config::RX_BUF_SIZE;

/// One received datagram. The payload sits in the caller's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Datagram {
    pub len: usize,
    pub endpoint: IpEndpoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("socket cannot bind port {port} in its current state")]
    InvalidState { port: u16 },
    #[error("no route to bind port {port}")]
    NoRoute { port: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReceiveError {
    #[error("datagram larger than the receive buffer")]
    Truncated,
    #[error("transport failure")]
    Transport,
}

#[allow(async_fn_in_trait)]
pub trait DatagramSocket {
    /// Starts listening on `port`.
    fn open(&mut self, port: u16) -> Result<(), BindError>;

    /// Waits for the next datagram and copies as much of it as fits into `buf`.
    async fn receive(&mut self, buf: &mut [u8]) -> Result<Datagram, ReceiveError>;
}

/// Fixed receive buffer reused for every datagram.
///
/// [`RX_BUF_SIZE`] is a hard limit: a longer datagram is cut by the transport before it is
/// decoded (or rejected outright, depending on the stack).
pub struct ReceiveBuffer {
    bytes: [u8; RX_BUF_SIZE],
}

impl ReceiveBuffer {
    pub const CAPACITY: usize = RX_BUF_SIZE;

    pub const fn new() -> Self {
        Self {
            bytes: [0; RX_BUF_SIZE],
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// The first `len` received bytes, never more than the capacity.
    pub fn filled(&self, len: usize) -> &[u8] {
        &self.bytes[..len.min(Self::CAPACITY)]
    }
}

impl Default for ReceiveBuffer {
    fn default() -> Self {
        Self::new()
    }
}
