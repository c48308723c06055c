use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{LinkError, Result};
use crate::frame::{FrameKind, PacketFrame};

/// An aidmask is a `u16`, so a session holds at most 16 peers.
pub const MAX_PEERS: u16 = 16;

/// One gathered reply slot, in ascending-aid order of the requested mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplySlot {
    pub aid: u16,
    /// `None` if that peer never replied before gathering completed.
    pub data: Option<Vec<u8>>,
}

/// Inbox entry. `seq` is a hub-internal tie-break so equal timestamps pop in
/// arrival order; it is not part of the protocol.
struct QueuedFrame {
    seq: u64,
    frame: PacketFrame,
}

impl PartialEq for QueuedFrame {
    fn eq(&self, other: &Self) -> bool {
        self.frame.timestamp == other.frame.timestamp && self.seq == other.seq
    }
}

impl Eq for QueuedFrame {}

impl PartialOrd for QueuedFrame {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedFrame {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.frame.timestamp, self.seq).cmp(&(other.frame.timestamp, other.seq))
    }
}

struct Peer {
    // Min-heap on (timestamp, seq): arrival order is not delivery order.
    inbox: BinaryHeap<Reverse<QueuedFrame>>,
    begun: bool,
}

impl Peer {
    fn new() -> Self {
        Self {
            inbox: BinaryHeap::new(),
            begun: false,
        }
    }
}

struct HubState {
    /// Index is the association id.
    peers: Vec<Option<Peer>>,
    seq: u64,
}

/// In-process exchange shared by every endpoint of one local-link session.
///
/// The hub owns the timeout policy for reply gathering; `None` blocks until
/// all expected replies arrive (or their peers detach).
pub struct LinkHub {
    state: Mutex<HubState>,
    cond: Condvar,
    reply_timeout: Option<Duration>,
}

impl LinkHub {
    pub fn new(reply_timeout: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(HubState {
                peers: (0..MAX_PEERS as usize).map(|_| None).collect(),
                seq: 0,
            }),
            cond: Condvar::new(),
            reply_timeout,
        })
    }

    /// Joins the session on the lowest free association id. The first
    /// endpoint to attach (aid 0) is the session host.
    pub fn attach(self: &Arc<Self>) -> Result<LinkEndpoint> {
        let mut state = self.lock();
        let aid = state
            .peers
            .iter()
            .position(Option::is_none)
            .ok_or(LinkError::SessionFull { max: MAX_PEERS })? as u16;
        state.peers[aid as usize] = Some(Peer::new());
        tracing::debug!(aid, "link endpoint attached");
        Ok(LinkEndpoint {
            hub: Arc::clone(self),
            aid,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn detach(&self, aid: u16) {
        let mut state = self.lock();
        state.peers[aid as usize] = None;
        drop(state);
        // Wake gatherers so they notice the peer is gone.
        self.cond.notify_all();
    }
}

/// One instance's attachment to a [`LinkHub`]. Detaches on drop.
pub struct LinkEndpoint {
    hub: Arc<LinkHub>,
    aid: u16,
}

impl LinkEndpoint {
    pub fn aid(&self) -> u16 {
        self.aid
    }

    pub fn is_host(&self) -> bool {
        self.aid == 0
    }

    /// Opens an exchange window: frames are only delivered to peers that
    /// have begun.
    pub fn begin(&self) {
        let mut state = self.hub.lock();
        if let Some(peer) = state.peers[self.aid as usize].as_mut() {
            peer.begun = true;
        }
    }

    /// Closes the window. Queued frames stay queued.
    pub fn end(&self) {
        let mut state = self.hub.lock();
        if let Some(peer) = state.peers[self.aid as usize].as_mut() {
            peer.begun = false;
        }
    }

    /// Host broadcast of a command frame. Returns the number of bytes
    /// accepted (zero when called by a non-host or outside a window).
    pub fn send_cmd(&self, data: &[u8], timestamp: u64) -> usize {
        if !self.is_host() {
            tracing::warn!(aid = self.aid, "send_cmd from non-host ignored");
            return 0;
        }
        self.broadcast(FrameKind::Cmd, data, timestamp)
    }

    /// Sends a reply to the host, filed under `aid` (the replying peer's
    /// association id, echoed from the command it answers).
    pub fn send_reply(&self, data: &[u8], timestamp: u64, aid: u16) -> usize {
        self.send_to_host(FrameKind::Reply, data, timestamp, aid)
    }

    /// Bare acknowledgement to the host. Acks are consumed (and discarded)
    /// by the host's reply gathering for the same timestamp.
    pub fn send_ack(&self, data: &[u8], timestamp: u64) -> usize {
        self.send_to_host(FrameKind::Ack, data, timestamp, self.aid)
    }

    /// Broadcast outside the command/reply flow (beacons and the like).
    pub fn send_packet(&self, data: &[u8], timestamp: u64) -> usize {
        self.broadcast(FrameKind::HostPacket, data, timestamp)
    }

    /// Pops the earliest-timestamp frame queued for this endpoint.
    pub fn recv_packet(&self) -> Option<(Vec<u8>, u64)> {
        let mut state = self.hub.lock();
        let peer = state.peers[self.aid as usize].as_mut()?;
        let Reverse(entry) = peer.inbox.pop()?;
        Some((entry.frame.data, entry.frame.timestamp))
    }

    /// Pops the earliest frame that originated at the session host,
    /// discarding anything else that precedes it.
    pub fn recv_host_packet(&self) -> Option<(Vec<u8>, u64)> {
        let mut state = self.hub.lock();
        let peer = state.peers[self.aid as usize].as_mut()?;
        while let Some(Reverse(entry)) = peer.inbox.pop() {
            if entry.frame.aid == 0 {
                return Some((entry.frame.data, entry.frame.timestamp));
            }
            tracing::debug!(
                from = entry.frame.aid,
                "non-host frame dropped while waiting for host packet"
            );
        }
        None
    }

    /// Gathers one reply per set bit of `aidmask` for the exchange at
    /// `timestamp`.
    ///
    /// Blocks until every expected reply is queued, a masked peer detaches,
    /// or the hub's reply timeout elapses. The result always has exactly
    /// `aidmask.count_ones()` slots in ascending-aid order; a peer that
    /// never replied leaves its slot empty. Frames older than `timestamp`
    /// are stale by the ordering rule and are dropped during gathering.
    pub fn recv_replies(&self, timestamp: u64, aidmask: u16) -> Vec<ReplySlot> {
        let mut slots: Vec<ReplySlot> = (0..MAX_PEERS)
            .filter(|bit| aidmask & (1 << bit) != 0)
            .map(|aid| ReplySlot { aid, data: None })
            .collect();
        if slots.is_empty() {
            return slots;
        }

        let deadline = self.hub.reply_timeout.map(|t| Instant::now() + t);
        let mut state = self.hub.lock();
        loop {
            self.drain_replies(&mut state, timestamp, &mut slots);

            let all_filled = slots.iter().all(|slot| slot.data.is_some());
            let expected_alive = slots.iter().any(|slot| {
                slot.data.is_none() && state.peers[slot.aid as usize].is_some()
            });
            if all_filled || !expected_alive {
                return slots;
            }

            state = match deadline {
                Some(deadline) => {
                    let remaining = match deadline.checked_duration_since(Instant::now()) {
                        Some(d) if !d.is_zero() => d,
                        _ => return slots,
                    };
                    let (guard, _) = self
                        .hub
                        .cond
                        .wait_timeout(state, remaining)
                        .unwrap_or_else(PoisonError::into_inner);
                    guard
                }
                None => self
                    .hub
                    .cond
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    fn drain_replies(
        &self,
        state: &mut HubState,
        timestamp: u64,
        slots: &mut [ReplySlot],
    ) {
        let Some(peer) = state.peers[self.aid as usize].as_mut() else {
            return;
        };
        while let Some(Reverse(top)) = peer.inbox.peek() {
            if top.frame.timestamp > timestamp {
                break;
            }
            let Some(Reverse(entry)) = peer.inbox.pop() else {
                break;
            };
            let frame = entry.frame;
            if frame.timestamp < timestamp {
                tracing::debug!(
                    from = frame.aid,
                    ts = frame.timestamp,
                    gather_ts = timestamp,
                    "stale frame dropped during reply gathering"
                );
                continue;
            }
            match frame.kind {
                FrameKind::Reply => {
                    if let Some(slot) = slots
                        .iter_mut()
                        .find(|slot| slot.aid == frame.aid && slot.data.is_none())
                    {
                        slot.data = Some(frame.data);
                    }
                }
                FrameKind::Ack => {}
                other => {
                    tracing::debug!(?other, "unexpected frame kind during reply gathering");
                }
            }
        }
    }

    fn broadcast(&self, kind: FrameKind, data: &[u8], timestamp: u64) -> usize {
        let mut state = self.hub.lock();
        if !self.window_open(&state) {
            return 0;
        }
        let mut delivered = false;
        for aid in 0..MAX_PEERS as usize {
            if aid == self.aid as usize {
                continue;
            }
            let seq = state.seq;
            if let Some(peer) = state.peers[aid].as_mut() {
                if !peer.begun {
                    continue;
                }
                peer.inbox.push(Reverse(QueuedFrame {
                    seq,
                    frame: PacketFrame {
                        data: data.to_vec(),
                        timestamp,
                        kind,
                        aid: self.aid,
                    },
                }));
                state.seq += 1;
                delivered = true;
            }
        }
        drop(state);
        if delivered {
            self.hub.cond.notify_all();
        }
        data.len()
    }

    fn send_to_host(&self, kind: FrameKind, data: &[u8], timestamp: u64, aid: u16) -> usize {
        let mut state = self.hub.lock();
        if !self.window_open(&state) {
            return 0;
        }
        let seq = state.seq;
        let Some(host) = state.peers[0].as_mut() else {
            return 0;
        };
        if !host.begun {
            return 0;
        }
        host.inbox.push(Reverse(QueuedFrame {
            seq,
            frame: PacketFrame {
                data: data.to_vec(),
                timestamp,
                kind,
                aid,
            },
        }));
        state.seq += 1;
        drop(state);
        self.hub.cond.notify_all();
        data.len()
    }

    fn window_open(&self, state: &HubState) -> bool {
        state.peers[self.aid as usize]
            .as_ref()
            .is_some_and(|peer| peer.begun)
    }
}

impl Drop for LinkEndpoint {
    fn drop(&mut self) {
        self.hub.detach(self.aid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_assigns_lowest_free_aid_and_reuses_after_detach() {
        let hub = LinkHub::new(None);
        let host = hub.attach().unwrap();
        let second = hub.attach().unwrap();
        assert_eq!((host.aid(), second.aid()), (0, 1));
        assert!(host.is_host());
        drop(second);
        let third = hub.attach().unwrap();
        assert_eq!(third.aid(), 1);
    }

    #[test]
    fn session_full_is_reported() {
        let hub = LinkHub::new(None);
        let _endpoints: Vec<_> = (0..MAX_PEERS).map(|_| hub.attach().unwrap()).collect();
        assert_eq!(
            hub.attach().err(),
            Some(LinkError::SessionFull { max: MAX_PEERS })
        );
    }

    #[test]
    fn frames_are_delivered_in_timestamp_order() {
        let hub = LinkHub::new(None);
        let host = hub.attach().unwrap();
        let peer = hub.attach().unwrap();
        host.begin();
        peer.begin();

        // Sent out of timestamp order.
        assert_eq!(host.send_packet(b"late", 30), 4);
        assert_eq!(host.send_packet(b"early", 10), 5);
        assert_eq!(host.send_packet(b"mid", 20), 3);

        assert_eq!(peer.recv_packet(), Some((b"early".to_vec(), 10)));
        assert_eq!(peer.recv_packet(), Some((b"mid".to_vec(), 20)));
        assert_eq!(peer.recv_packet(), Some((b"late".to_vec(), 30)));
        assert_eq!(peer.recv_packet(), None);
    }

    #[test]
    fn sends_outside_a_window_are_dropped() {
        let hub = LinkHub::new(None);
        let host = hub.attach().unwrap();
        let peer = hub.attach().unwrap();

        // Nobody has begun yet.
        assert_eq!(host.send_cmd(b"cmd", 1), 0);
        host.begin();
        // Peer still closed: accepted but delivered to no one.
        host.send_cmd(b"cmd", 2);
        peer.begin();
        assert_eq!(peer.recv_packet(), None);
    }

    #[test]
    fn non_host_cannot_broadcast_commands() {
        let hub = LinkHub::new(None);
        let _host = hub.attach().unwrap();
        let peer = hub.attach().unwrap();
        peer.begin();
        assert_eq!(peer.send_cmd(b"cmd", 1), 0);
    }

    #[test]
    fn recv_replies_returns_popcount_slots() {
        let hub = LinkHub::new(Some(Duration::from_millis(50)));
        let host = hub.attach().unwrap();
        let one = hub.attach().unwrap();
        let two = hub.attach().unwrap();
        host.begin();
        one.begin();
        two.begin();

        let ts = 100;
        one.send_reply(b"from-1", ts, one.aid());
        // Peer 2 never replies.

        let mask = (1 << one.aid()) | (1 << two.aid());
        let slots = host.recv_replies(ts, mask);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].aid, 1);
        assert_eq!(slots[0].data.as_deref(), Some(&b"from-1"[..]));
        assert_eq!(slots[1].aid, 2);
        assert_eq!(slots[1].data, None);
    }

    #[test]
    fn recv_replies_drops_stale_frames() {
        let hub = LinkHub::new(Some(Duration::from_millis(50)));
        let host = hub.attach().unwrap();
        let peer = hub.attach().unwrap();
        host.begin();
        peer.begin();

        peer.send_reply(b"old", 5, peer.aid());
        peer.send_reply(b"current", 10, peer.aid());

        let slots = host.recv_replies(10, 1 << peer.aid());
        assert_eq!(slots[0].data.as_deref(), Some(&b"current"[..]));
    }

    #[test]
    fn recv_replies_unblocks_when_a_peer_detaches() {
        let hub = LinkHub::new(None);
        let host = hub.attach().unwrap();
        let peer = hub.attach().unwrap();
        host.begin();
        peer.begin();

        let mask = 1 << peer.aid();
        let gatherer = std::thread::spawn(move || host.recv_replies(50, mask));
        std::thread::sleep(Duration::from_millis(20));
        drop(peer);
        let slots = gatherer.join().expect("gatherer thread");
        assert_eq!(slots[0].data, None);
    }

    #[test]
    fn recv_host_packet_skips_non_host_frames() {
        let hub = LinkHub::new(None);
        let host = hub.attach().unwrap();
        let one = hub.attach().unwrap();
        let two = hub.attach().unwrap();
        host.begin();
        one.begin();
        two.begin();

        // A stray peer broadcast lands before the host's.
        one.send_packet(b"peer-noise", 1);
        host.send_packet(b"from-host", 2);

        assert_eq!(two.recv_host_packet(), Some((b"from-host".to_vec(), 2)));
    }
}
