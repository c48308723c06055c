//! The binding layer: one value exposing the whole platform contract.
//!
//! An emulation core instance holds a [`Platform`] and calls into it
//! synchronously for every platform service it needs: threads and sync
//! primitives, virtualized files, savestates, cartridge parsing, the
//! multiplayer/LAN exchange, and instance/config identity. The facade wires
//! the per-subsystem crates to one [`InstanceContext`] so multi-instance
//! behavior stays explicit.
#![forbid(unsafe_code)]

mod framebuffer;

pub use framebuffer::FrontBuffer;

pub use bedrock_cart::{CartError, CartridgeImage};
pub use bedrock_link::{LanHub, LanLink, LinkHub, MpLink, ReplySlot};
pub use bedrock_platform::{
    ConfigEntry, ConfigStore, InstanceContext, MutexHandle, PlatformError, SemaphoreHandle,
    SyncRegistry, TaskBox, ThreadHandle,
};
pub use bedrock_savestate::{SaveOptions, StateSource, StateTarget};
pub use bedrock_vfs::{FileHandle, FileMode, SeekOrigin, Vfs, VfsRoots, VirtualPath};

use std::sync::Arc;

/// Everything needed to stand a platform up for one instance.
pub struct PlatformConfig {
    pub instance_id: u16,
    pub roots: VfsRoots,
    pub config: ConfigStore,
    /// Local-link transport; `None` runs single-instance.
    pub mp_hub: Option<Arc<LinkHub>>,
    /// LAN transport; `None` runs without Wi-Fi emulation.
    pub lan_hub: Option<Arc<LanHub>>,
    pub savestate: SaveOptions,
}

impl PlatformConfig {
    /// Single-instance setup rooted at `root`, default config, no transports.
    pub fn standalone(root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            instance_id: 0,
            roots: VfsRoots::single(root),
            config: ConfigStore::with_defaults(),
            mp_hub: None,
            lan_hub: None,
            savestate: SaveOptions::default(),
        }
    }
}

/// The platform services boundary for one running emulator instance.
pub struct Platform {
    instance: InstanceContext,
    config: ConfigStore,
    sync: SyncRegistry,
    vfs: Vfs,
    mp: MpLink,
    lan: LanLink,
    save_options: SaveOptions,
}

impl Platform {
    pub fn new(cfg: PlatformConfig) -> Self {
        let instance = InstanceContext::new(cfg.instance_id);
        let mp = MpLink::init(cfg.mp_hub.as_ref());
        let lan = LanLink::init(cfg.lan_hub.as_ref());
        tracing::debug!(
            instance = instance.id(),
            mp = mp.is_enabled(),
            lan = lan.is_enabled(),
            "platform initialized"
        );
        Self {
            instance,
            config: cfg.config,
            sync: SyncRegistry::new(),
            vfs: Vfs::new(cfg.roots),
            mp,
            lan,
            save_options: cfg.savestate,
        }
    }

    // --- instance / config registry ---

    pub fn instance_id(&self) -> u16 {
        self.instance.id()
    }

    pub fn instance_file_suffix(&self) -> &str {
        self.instance.file_suffix()
    }

    /// Re-binds this platform to a different instance id, e.g. when spawning
    /// a linked instance. Open file handles keep their old paths; new opens
    /// resolve under the new suffix.
    pub fn rebind_instance(&mut self, id: u16) {
        self.instance.rebind(id);
    }

    pub fn get_config_int(&self, entry: ConfigEntry) -> i32 {
        self.config.get_int(entry)
    }

    pub fn get_config_bool(&self, entry: ConfigEntry) -> bool {
        self.config.get_bool(entry)
    }

    pub fn get_config_string(&self, entry: ConfigEntry) -> &str {
        self.config.get_string(entry)
    }

    // --- threads and sync primitives ---

    pub fn sync(&self) -> &SyncRegistry {
        &self.sync
    }

    pub fn spawn_thread(&self, task: TaskBox) -> Result<ThreadHandle, PlatformError> {
        self.sync.spawn(task)
    }

    // --- virtual file service ---

    pub fn open_file(&self, path: &str, mode: FileMode) -> Result<FileHandle, bedrock_vfs::VfsError> {
        self.vfs
            .open(&self.instance, &VirtualPath::global(path), mode)
    }

    pub fn open_local_file(
        &self,
        path: &str,
        mode: FileMode,
    ) -> Result<FileHandle, bedrock_vfs::VfsError> {
        self.vfs.open(&self.instance, &VirtualPath::local(path), mode)
    }

    pub fn file_exists(&self, path: &str) -> bool {
        self.vfs.exists(&self.instance, &VirtualPath::global(path))
    }

    pub fn local_file_exists(&self, path: &str) -> bool {
        self.vfs.exists(&self.instance, &VirtualPath::local(path))
    }

    // --- savestate bridge ---

    /// Serializes the core; an empty buffer signals failure, never a partial
    /// snapshot.
    pub fn write_savestate<S: StateSource>(&self, core: &S) -> Vec<u8> {
        bedrock_savestate::write_savestate_or_empty(core, self.save_options)
    }

    /// Restores the core from `bytes`. On failure the core keeps its prior
    /// state and `false` is returned.
    pub fn read_savestate<T: StateTarget>(&self, core: &mut T, bytes: &[u8]) -> bool {
        match bedrock_savestate::read_savestate(core, bytes) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, "savestate restore failed");
                false
            }
        }
    }

    // --- cartridge bridge ---

    pub fn parse_rom_with_save(
        &self,
        rom: &[u8],
        save: Option<&[u8]>,
    ) -> Result<CartridgeImage, CartError> {
        CartridgeImage::parse(rom, save)
    }

    // --- multiplayer / LAN exchange ---

    pub fn mp(&self) -> &MpLink {
        &self.mp
    }

    pub fn mp_deinit(&mut self) {
        self.mp.deinit();
    }

    pub fn lan(&self) -> &LanLink {
        &self.lan
    }

    pub fn lan_deinit(&mut self) {
        self.lan.deinit();
    }
}
