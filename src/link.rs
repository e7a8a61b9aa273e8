// FitNode: Link status tracking
//
// The transport is re-checked every tick; only transitions are logged.
// `PeerList` holds the relay sessions a transport fans telemetry out to.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::events::LinkStatus;

#[derive(Debug, Default)]
pub struct LinkMonitor {
    status: LinkStatus,
}

impl LinkMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }

    pub fn observe(&mut self, connected: bool) -> LinkStatus {
        let next = if connected { LinkStatus::Ok } else { LinkStatus::Lost };
        if next != self.status {
            match next {
                LinkStatus::Ok => log::info!("Telemetry link up"),
                LinkStatus::Lost => log::warn!("Telemetry link lost"),
            }
            self.status = next;
        }
        self.status
    }
}

/// Connected peers keyed by session id, shared between a server task that
/// adds and removes them and the loop that sends to them.
///
/// `broadcast` holds no lock while sending, so the server task can keep
/// registering sessions even when a send waits on it.
pub struct PeerList<S> {
    peers: Mutex<Vec<(i32, S)>>,
}

impl<S> PeerList<S> {
    pub fn new() -> Self {
        Self { peers: Mutex::new(Vec::new()) }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(i32, S)>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, session: i32, peer: S) {
        self.lock().push((session, peer));
    }

    /// Sessions that are mid-broadcast are not in the list; they are dropped
    /// by `broadcast` once their send fails.
    pub fn remove(&self, session: i32) {
        self.lock().retain(|(id, _)| *id != session);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call `send` once per peer.  Peers for which it returns `false` are
    /// dropped.  Returns how many peers took the message.
    pub fn broadcast<F>(&self, mut send: F) -> usize
    where
        F: FnMut(i32, &mut S) -> bool,
    {
        let mut sending = std::mem::take(&mut *self.lock());
        sending.retain_mut(|(session, peer)| send(*session, peer));
        let delivered = sending.len();

        // Sessions that joined mid-broadcast go after the survivors
        let mut peers = self.lock();
        let joined = std::mem::take(&mut *peers);
        *peers = sending;
        peers.extend(joined);
        delivered
    }
}

impl<S> Default for PeerList<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_lost() {
        assert_eq!(LinkMonitor::new().status(), LinkStatus::Lost);
    }

    #[test]
    fn test_follows_connection() {
        let mut link = LinkMonitor::new();
        assert_eq!(link.observe(false), LinkStatus::Lost);
        assert_eq!(link.observe(true), LinkStatus::Ok);
        assert_eq!(link.observe(true), LinkStatus::Ok);
        assert_eq!(link.status(), LinkStatus::Ok);
        assert_eq!(link.observe(false), LinkStatus::Lost);
    }

    #[test]
    fn test_broadcast_drops_failed_peers() {
        let peers = PeerList::new();
        peers.add(1, 0u32);
        peers.add(2, 0u32);
        peers.add(3, 0u32);

        let delivered = peers.broadcast(|session, count| {
            *count += 1;
            session != 2
        });
        assert_eq!(delivered, 2);
        assert_eq!(peers.len(), 2);

        // Survivors keep their state
        let mut seen = Vec::new();
        peers.broadcast(|session, count| {
            seen.push((session, *count));
            true
        });
        assert_eq!(seen, vec![(1, 1), (3, 1)]);
    }

    #[test]
    fn test_peers_can_join_and_leave_during_broadcast() {
        // Re-entering the list from inside a send would deadlock if the lock
        // were still held.
        let peers = PeerList::new();
        peers.add(1, ());
        peers.add(2, ());

        let delivered = peers.broadcast(|session, _| {
            if session == 1 {
                peers.add(7, ());
                peers.remove(2);
                assert_eq!(peers.len(), 1);
            }
            true
        });
        assert_eq!(delivered, 2);

        let mut order = Vec::new();
        peers.broadcast(|session, _| {
            order.push(session);
            true
        });
        assert_eq!(order, vec![1, 2, 7]);
    }

    #[test]
    fn test_empty_broadcast() {
        let peers: PeerList<()> = PeerList::default();
        assert!(peers.is_empty());
        assert_eq!(peers.broadcast(|_, _| true), 0);
    }
}
