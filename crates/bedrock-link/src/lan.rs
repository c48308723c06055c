use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{LinkError, Result};

const MAX_NODES: usize = 16;
/// Per-node backlog cap; LAN traffic is lossy by contract, so the oldest
/// datagram is dropped when a node stops draining its queue.
const MAX_QUEUED: usize = 64;

/// In-process datagram exchange for the LAN protocol. No timestamps, no
/// ordering guarantees, non-blocking receive.
pub struct LanHub {
    nodes: Mutex<Vec<Option<VecDeque<Vec<u8>>>>>,
}

impl LanHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            nodes: Mutex::new((0..MAX_NODES).map(|_| None).collect()),
        })
    }

    pub fn attach(self: &Arc<Self>) -> Result<LanEndpoint> {
        let mut nodes = self.lock();
        let slot = nodes
            .iter()
            .position(Option::is_none)
            .ok_or(LinkError::SessionFull {
                max: MAX_NODES as u16,
            })?;
        nodes[slot] = Some(VecDeque::new());
        Ok(LanEndpoint {
            hub: Arc::clone(self),
            slot,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Option<VecDeque<Vec<u8>>>>> {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One node on the LAN exchange. Detaches on drop.
pub struct LanEndpoint {
    hub: Arc<LanHub>,
    slot: usize,
}

impl LanEndpoint {
    /// Broadcasts a datagram to every other node. Returns the number of
    /// bytes accepted.
    pub fn send_packet(&self, data: &[u8]) -> usize {
        let mut nodes = self.hub.lock();
        for (slot, node) in nodes.iter_mut().enumerate() {
            if slot == self.slot {
                continue;
            }
            if let Some(queue) = node.as_mut() {
                if queue.len() == MAX_QUEUED {
                    queue.pop_front();
                }
                queue.push_back(data.to_vec());
            }
        }
        data.len()
    }

    /// Non-blocking poll for the next queued datagram.
    pub fn recv_packet(&self) -> Option<Vec<u8>> {
        let mut nodes = self.hub.lock();
        nodes[self.slot].as_mut()?.pop_front()
    }
}

impl Drop for LanEndpoint {
    fn drop(&mut self) {
        let mut nodes = self.hub.lock();
        nodes[self.slot] = None;
    }
}

/// Presence-optional front for the LAN protocol.
///
/// `init` without a transport yields a disabled link; sends report zero
/// bytes and receives report nothing, and the caller keeps running in
/// single-instance mode.
pub struct LanLink {
    endpoint: Option<LanEndpoint>,
}

impl LanLink {
    pub fn init(hub: Option<&Arc<LanHub>>) -> Self {
        let endpoint = match hub {
            Some(hub) => match hub.attach() {
                Ok(endpoint) => Some(endpoint),
                Err(err) => {
                    tracing::warn!(%err, "LAN init failed; running without LAN");
                    None
                }
            },
            None => {
                tracing::debug!("no LAN transport available");
                None
            }
        };
        Self { endpoint }
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    pub fn send_packet(&self, data: &[u8]) -> usize {
        match &self.endpoint {
            Some(endpoint) => endpoint.send_packet(data),
            None => 0,
        }
    }

    pub fn recv_packet(&self) -> Option<Vec<u8>> {
        self.endpoint.as_ref()?.recv_packet()
    }

    /// Tears the link down; subsequent calls behave like a disabled link.
    pub fn deinit(&mut self) {
        self.endpoint = None;
    }
}
