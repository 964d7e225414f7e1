//! [`DatagramSocket`] over the embassy-net UDP socket.
//!
//! smoltcp refuses to copy a datagram that does not fit the caller's buffer and reports it as
//! truncated instead; the dispatcher treats that like any other failed receive.
use embassy_net::udp::{self, RecvError, UdpSocket};

use super::{BindError, Datagram, DatagramSocket, ReceiveError};

impl DatagramSocket for UdpSocket<'_> {
    fn open(&mut self, port: u16) -> Result<(), BindError> {
        UdpSocket::bind(self, port).map_err(|e| match e {
            udp::BindError::NoRoute => BindError::NoRoute { port },
            _ => BindError::InvalidState { port },
        })
    }

    #[allow(unreachable_patterns)]
    async fn receive(&mut self, buf: &mut [u8]) -> Result<Datagram, ReceiveError> {
        match UdpSocket::recv_from(self, buf).await {
            Ok((len, meta)) => Ok(Datagram {
                len,
                endpoint: meta.endpoint,
            }),
            Err(RecvError::Truncated) => Err(ReceiveError::Truncated),
            Err(_) => Err(ReceiveError::Transport),
        }
    }
}
