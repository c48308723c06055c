/// Identity of one running emulator instance.
///
/// Several instances may share a working directory (local multiplayer runs
/// one per player); the numeric id and the derived file suffix are what keep
/// their save files, firmware copies and sockets from colliding. Built once
/// at session start and passed by reference to every subsystem; the only
/// mutation after that is an explicit [`rebind`](InstanceContext::rebind)
/// when a linked instance is spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceContext {
    id: u16,
    file_suffix: String,
}

impl InstanceContext {
    pub fn new(id: u16) -> Self {
        Self {
            id,
            file_suffix: Self::suffix_for(id),
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    /// Suffix appended to per-instance file names. Empty for the first
    /// instance so single-instance setups keep their historical file names.
    pub fn file_suffix(&self) -> &str {
        &self.file_suffix
    }

    /// Re-binds this context to a different instance id.
    pub fn rebind(&mut self, id: u16) {
        self.id = id;
        self.file_suffix = Self::suffix_for(id);
    }

    fn suffix_for(id: u16) -> String {
        if id == 0 {
            String::new()
        } else {
            format!(".{id}")
        }
    }
}
