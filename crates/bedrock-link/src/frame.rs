/// What role a frame plays in the local-link protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Host broadcast opening an exchange window.
    Cmd,
    /// A peer's answer to a command, filed under the peer's aid.
    Reply,
    /// A peer's bare acknowledgement of a command.
    Ack,
    /// Host traffic outside the command/reply flow (beacons and the like).
    HostPacket,
}

/// One frame crossing the exchange.
///
/// `timestamp` advances monotonically per session and is the sole ordering
/// key. `aid` is the association id of the peer the frame came from (the
/// session host is always aid 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketFrame {
    pub data: Vec<u8>,
    pub timestamp: u64,
    pub kind: FrameKind,
    pub aid: u16,
}
