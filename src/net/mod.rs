//! UDP transport for encoded voice packets
//!
//! One socket pair per session: a peer-directed send socket and a
//! receive socket bound to the local port with a short read timeout, so
//! the receive pipeline polls instead of blocking. Fire and forget — no
//! retransmission, no acknowledgment, no ordering. The wire format is
//! the raw codec payload with no envelope.

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use crate::config::SessionConfig;
use crate::constants::{MAX_PACKET_SIZE, SOCKET_TIMEOUT_MS, UDP_RECV_BUFFER};
use crate::error::NetworkError;

/// Sending half of the link, owned by the send pipeline thread.
pub struct PacketSender {
    socket: UdpSocket,
    peer: SocketAddr,
    packets_sent: u64,
    bytes_sent: u64,
}

impl PacketSender {
    /// Send one encoded packet to the peer.
    ///
    /// A failure counts as one dropped frame; the caller logs it and
    /// keeps going.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), NetworkError> {
        if payload.len() > MAX_PACKET_SIZE {
            return Err(NetworkError::PacketTooLarge(payload.len()));
        }
        self.socket
            .send_to(payload, self.peer)
            .map_err(|e| NetworkError::SendFailed(e.to_string()))?;
        self.packets_sent += 1;
        self.bytes_sent += payload.len() as u64;
        Ok(())
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }
}

/// Receiving half of the link, owned by the receive pipeline thread.
pub struct PacketReceiver {
    socket: UdpSocket,
    buffer: Vec<u8>,
    packets_received: u64,
    timeouts: u64,
}

impl PacketReceiver {
    /// Poll for one packet.
    ///
    /// `Ok(None)` is a read timeout — no data within the poll window.
    /// The receive pipeline substitutes silence for it; it is not an
    /// error.
    pub fn recv(&mut self) -> Result<Option<Bytes>, NetworkError> {
        match self.socket.recv_from(&mut self.buffer) {
            Ok((len, _addr)) => {
                self.packets_received += 1;
                Ok(Some(Bytes::copy_from_slice(&self.buffer[..len])))
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                self.timeouts += 1;
                Ok(None)
            }
            Err(e) => Err(NetworkError::ReceiveFailed(e.to_string())),
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }
}

/// Open both halves of the link for a session. Bind failure is fatal at
/// startup.
pub fn open_link(config: &SessionConfig) -> Result<(PacketSender, PacketReceiver), NetworkError> {
    let peer = config.peer_addr();
    let receiver = bind_receiver(peer.ip(), config.recv_port)?;

    let send_socket = match peer.ip() {
        IpAddr::V4(_) => UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)),
        IpAddr::V6(_) => UdpSocket::bind((Ipv6Addr::UNSPECIFIED, 0)),
    }
    .map_err(|e| NetworkError::BindFailed(e.to_string()))?;

    Ok((
        PacketSender {
            socket: send_socket,
            peer,
            packets_sent: 0,
            bytes_sent: 0,
        },
        receiver,
    ))
}

fn bind_receiver(peer: IpAddr, port: u16) -> Result<PacketReceiver, NetworkError> {
    let (domain, wildcard): (Domain, IpAddr) = match peer {
        IpAddr::V4(_) => (Domain::IPV4, Ipv4Addr::UNSPECIFIED.into()),
        IpAddr::V6(_) => (Domain::IPV6, Ipv6Addr::UNSPECIFIED.into()),
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| NetworkError::BindFailed(e.to_string()))?;

    // Enlarged kernel buffer absorbs receive-thread scheduling jitter
    // without dropping datagrams.
    socket
        .set_recv_buffer_size(UDP_RECV_BUFFER)
        .map_err(|e| NetworkError::BindFailed(e.to_string()))?;
    socket
        .set_read_timeout(Some(Duration::from_millis(SOCKET_TIMEOUT_MS)))
        .map_err(|e| NetworkError::BindFailed(e.to_string()))?;
    socket
        .bind(&SocketAddr::new(wildcard, port).into())
        .map_err(|e| NetworkError::BindFailed(e.to_string()))?;

    Ok(PacketReceiver {
        socket: socket.into(),
        buffer: vec![0u8; MAX_PACKET_SIZE],
        packets_received: 0,
        timeouts: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;

    fn local_config(send_port: u16, recv_port: u16) -> SessionConfig {
        SessionConfig {
            send_port,
            recv_port,
            ..Default::default()
        }
    }

    #[test]
    fn loopback_send_receive() {
        let (mut tx, _rx_unused) = open_link(&local_config(41001, 41002)).unwrap();
        let (_tx_unused, mut rx) = open_link(&local_config(41002, 41001)).unwrap();

        tx.send(b"voice-payload").unwrap();

        // The datagram may take a poll cycle to arrive.
        let mut got = None;
        for _ in 0..10 {
            if let Some(payload) = rx.recv().unwrap() {
                got = Some(payload);
                break;
            }
        }
        assert_eq!(got.as_deref(), Some(&b"voice-payload"[..]));
        assert_eq!(tx.packets_sent(), 1);
        assert_eq!(rx.packets_received(), 1);
    }

    #[test]
    fn timeout_returns_none_not_error() {
        let (_tx, mut rx) = open_link(&local_config(41003, 41004)).unwrap();
        assert!(rx.recv().unwrap().is_none());
        assert_eq!(rx.timeouts(), 1);
    }

    #[test]
    fn oversized_payload_rejected() {
        let (mut tx, _rx) = open_link(&local_config(41005, 41006)).unwrap();
        let huge = vec![0u8; MAX_PACKET_SIZE + 1];
        assert!(matches!(
            tx.send(&huge),
            Err(NetworkError::PacketTooLarge(_))
        ));
    }

    #[test]
    fn duplicate_ports_fail_to_bind() {
        let first = open_link(&local_config(41007, 41008));
        assert!(first.is_ok());
        let second = open_link(&local_config(41009, 41008));
        assert!(second.is_err());
    }
}
