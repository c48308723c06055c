//! Timestamp-ordered packet exchange between cooperating emulator instances.
//!
//! Two coupled protocols share this crate:
//!
//! - the **local-link** protocol ([`LinkHub`]/[`MpLink`]): a host instance
//!   broadcasts commands, peers reply and acknowledge, and the host gathers
//!   one reply per peer for a given timestamp. Frames are ordered solely by
//!   their timestamp; there is no separate sequence number, and frames from
//!   different peers may arrive out of order at the transport.
//! - the **LAN** protocol ([`LanHub`]/[`LanLink`]): a plain unordered
//!   datagram exchange with a non-blocking receive.
//!
//! Both are presence-optional: `init` may find no transport, and callers
//! keep running in single-instance mode with every operation degrading to a
//! no-op. The socket transport underneath is out of scope; this crate is the
//! packet-queue contract an in-process hub fulfils directly (and a socket
//! bridge can fulfil later).
#![forbid(unsafe_code)]

mod error;
mod frame;
mod hub;
mod lan;
mod mp;

pub use error::{LinkError, Result};
pub use frame::{FrameKind, PacketFrame};
pub use hub::{LinkEndpoint, LinkHub, ReplySlot, MAX_PEERS};
pub use lan::{LanEndpoint, LanHub, LanLink};
pub use mp::MpLink;
