//! Host-side platform primitives consumed by the emulation core.
//!
//! The core is written against a fixed platform contract and never talks to
//! the host directly. This crate provides the host half of that contract for
//! everything that is not file or network shaped: one-shot deferred work
//! ([`TaskBox`]), threads and blocking synchronization primitives behind
//! generation-checked handles ([`SyncRegistry`]), and the process-wide
//! instance/config registry ([`InstanceContext`], [`ConfigStore`]).
//!
//! All blocking here is OS-thread blocking; there is no async runtime and no
//! cooperative cancellation. A thread stops only by its closure returning.
#![forbid(unsafe_code)]

mod config;
mod error;
mod handle;
mod instance;
mod sync;
mod task;

pub use config::{ConfigEntry, ConfigStore, ConfigValue};
pub use error::{PlatformError, Result};
pub use instance::InstanceContext;
pub use sync::{MutexHandle, SemaphoreHandle, SyncRegistry, ThreadHandle};
pub use task::TaskBox;
