//! Opaque message channel between peers

use bytes::Bytes;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::warn;

/// Frames buffered per receiver before the slowest one starts losing them
pub const BUS_CAPACITY: usize = 256;

/// Bidirectional frame channel.
///
/// Delivery is best effort: frames may be dropped and no ordering is promised
/// across snapshots.
pub trait Transport: Send {
    /// Push one encoded frame to every other peer
    fn send(&self, frame: Bytes);

    /// Next received frame, if any, without blocking
    fn try_recv(&mut self) -> Option<Bytes>;
}

/// Create the shared in-process bus peers connect to
pub fn bus() -> broadcast::Sender<Bytes> {
    broadcast::channel(BUS_CAPACITY).0
}

/// Transport over a tokio broadcast channel.
///
/// Every peer sees every frame, including its own; routing discards frames
/// for entities the peer owns.
pub struct ChannelTransport {
    tx: broadcast::Sender<Bytes>,
    rx: broadcast::Receiver<Bytes>,
}

impl ChannelTransport {
    pub fn connect(bus: &broadcast::Sender<Bytes>) -> Self {
        Self {
            tx: bus.clone(),
            rx: bus.subscribe(),
        }
    }
}

impl Transport for ChannelTransport {
    fn send(&self, frame: Bytes) {
        // No receivers is not an error: nobody is observing yet.
        let _ = self.tx.send(frame);
    }

    fn try_recv(&mut self) -> Option<Bytes> {
        loop {
            match self.rx.try_recv() {
                Ok(frame) => return Some(frame),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Transport lagged, frames dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_reach_every_connected_peer() {
        let bus = bus();
        let a = ChannelTransport::connect(&bus);
        let mut b = ChannelTransport::connect(&bus);
        let mut c = ChannelTransport::connect(&bus);

        a.send(Bytes::from_static(b"snap"));

        assert_eq!(b.try_recv().as_deref(), Some(&b"snap"[..]));
        assert_eq!(c.try_recv().as_deref(), Some(&b"snap"[..]));
        assert!(b.try_recv().is_none());
    }

    #[test]
    fn lagging_receiver_skips_to_oldest_retained() {
        let (tx, _) = broadcast::channel(2);
        let sender = ChannelTransport::connect(&tx);
        let mut slow = ChannelTransport::connect(&tx);

        for i in 0u8..4 {
            sender.send(Bytes::from(vec![i]));
        }

        assert_eq!(slow.try_recv().as_deref(), Some(&[2u8][..]));
        assert_eq!(slow.try_recv().as_deref(), Some(&[3u8][..]));
    }
}
