use std::sync::Arc;

use crate::hub::{LinkEndpoint, LinkHub, ReplySlot};

/// Presence-optional front for the local-link protocol.
///
/// Session lifecycle is `init → [begin → sends/recvs → end]* → deinit`.
/// `init` without a transport (or with a full session) yields a disabled
/// link: sends report zero bytes, receives report nothing, and reply
/// gathering returns all-empty slots. After a successful init nothing in
/// this type returns a fatal error; degraded results keep the caller
/// running in single-instance mode.
pub struct MpLink {
    endpoint: Option<LinkEndpoint>,
}

impl MpLink {
    pub fn init(hub: Option<&Arc<LinkHub>>) -> Self {
        let endpoint = match hub {
            Some(hub) => match hub.attach() {
                Ok(endpoint) => Some(endpoint),
                Err(err) => {
                    tracing::warn!(%err, "local-link init failed; running standalone");
                    None
                }
            },
            None => {
                tracing::debug!("no local-link transport available");
                None
            }
        };
        Self { endpoint }
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// This instance's association id, if attached.
    pub fn aid(&self) -> Option<u16> {
        self.endpoint.as_ref().map(LinkEndpoint::aid)
    }

    pub fn is_host(&self) -> bool {
        self.endpoint.as_ref().is_some_and(LinkEndpoint::is_host)
    }

    pub fn begin(&self) {
        if let Some(endpoint) = &self.endpoint {
            endpoint.begin();
        }
    }

    pub fn end(&self) {
        if let Some(endpoint) = &self.endpoint {
            endpoint.end();
        }
    }

    pub fn send_cmd(&self, data: &[u8], timestamp: u64) -> usize {
        match &self.endpoint {
            Some(endpoint) => endpoint.send_cmd(data, timestamp),
            None => 0,
        }
    }

    pub fn send_reply(&self, data: &[u8], timestamp: u64, aid: u16) -> usize {
        match &self.endpoint {
            Some(endpoint) => endpoint.send_reply(data, timestamp, aid),
            None => 0,
        }
    }

    pub fn send_ack(&self, data: &[u8], timestamp: u64) -> usize {
        match &self.endpoint {
            Some(endpoint) => endpoint.send_ack(data, timestamp),
            None => 0,
        }
    }

    pub fn send_packet(&self, data: &[u8], timestamp: u64) -> usize {
        match &self.endpoint {
            Some(endpoint) => endpoint.send_packet(data, timestamp),
            None => 0,
        }
    }

    pub fn recv_packet(&self) -> Option<(Vec<u8>, u64)> {
        self.endpoint.as_ref()?.recv_packet()
    }

    pub fn recv_host_packet(&self) -> Option<(Vec<u8>, u64)> {
        self.endpoint.as_ref()?.recv_host_packet()
    }

    pub fn recv_replies(&self, timestamp: u64, aidmask: u16) -> Vec<ReplySlot> {
        match &self.endpoint {
            Some(endpoint) => endpoint.recv_replies(timestamp, aidmask),
            None => (0..crate::hub::MAX_PEERS)
                .filter(|bit| aidmask & (1 << bit) != 0)
                .map(|aid| ReplySlot { aid, data: None })
                .collect(),
        }
    }

    /// Leaves the session; subsequent calls behave like a disabled link.
    pub fn deinit(&mut self) {
        self.endpoint = None;
    }
}
