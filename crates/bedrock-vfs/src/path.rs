use std::path::{Path, PathBuf};

use bedrock_platform::InstanceContext;

/// A file address in one of the two namespaces the boundary exposes.
///
/// Global paths resolve against a host-wide root shared by every instance
/// (BIOS images, firmware). Local paths resolve against a per-instance root
/// and additionally carry the instance file suffix in their final component,
/// so N concurrently running instances never collide on the same backing
/// file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualPath {
    Global(PathBuf),
    Local(PathBuf),
}

impl VirtualPath {
    pub fn global(path: impl Into<PathBuf>) -> Self {
        Self::Global(path.into())
    }

    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local(path.into())
    }
}

/// Filesystem anchors for the two namespaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfsRoots {
    pub global: PathBuf,
    pub local: PathBuf,
}

impl VfsRoots {
    /// Anchors both namespaces at the same directory, the layout a
    /// single-instance setup uses.
    pub fn single(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            global: root.clone(),
            local: root,
        }
    }
}

/// The one resolution policy, kept pure so it is testable without touching
/// the filesystem.
///
/// Absolute global paths pass through untouched; relative global paths are
/// anchored at the global root rather than the process working directory.
/// Local paths get `instance.file_suffix()` appended to their file name:
/// `save.bin` for instance 0, `save.bin.2` for instance 2.
pub fn resolve(path: &VirtualPath, roots: &VfsRoots, instance: &InstanceContext) -> PathBuf {
    match path {
        VirtualPath::Global(p) => {
            if p.is_absolute() {
                p.clone()
            } else {
                roots.global.join(p)
            }
        }
        VirtualPath::Local(p) => {
            let anchored = if p.is_absolute() {
                p.clone()
            } else {
                roots.local.join(p)
            };
            apply_suffix(&anchored, instance.file_suffix())
        }
    }
}

fn apply_suffix(path: &Path, suffix: &str) -> PathBuf {
    if suffix.is_empty() {
        return path.to_path_buf();
    }
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> VfsRoots {
        VfsRoots {
            global: PathBuf::from("/srv/bedrock"),
            local: PathBuf::from("/srv/bedrock/instances"),
        }
    }

    #[test]
    fn relative_global_paths_anchor_at_the_global_root() {
        let ctx = InstanceContext::new(0);
        let resolved = resolve(&VirtualPath::global("firmware.bin"), &roots(), &ctx);
        assert_eq!(resolved, PathBuf::from("/srv/bedrock/firmware.bin"));
    }

    #[test]
    fn absolute_global_paths_pass_through() {
        let ctx = InstanceContext::new(0);
        let resolved = resolve(&VirtualPath::global("/etc/bios7.bin"), &roots(), &ctx);
        assert_eq!(resolved, PathBuf::from("/etc/bios7.bin"));
    }

    #[test]
    fn local_paths_carry_the_instance_suffix() {
        let ctx = InstanceContext::new(2);
        let resolved = resolve(&VirtualPath::local("save.bin"), &roots(), &ctx);
        assert_eq!(
            resolved,
            PathBuf::from("/srv/bedrock/instances/save.bin.2")
        );
    }

    #[test]
    fn instance_zero_keeps_plain_local_names() {
        let ctx = InstanceContext::new(0);
        let resolved = resolve(&VirtualPath::local("save.bin"), &roots(), &ctx);
        assert_eq!(resolved, PathBuf::from("/srv/bedrock/instances/save.bin"));
    }

    #[test]
    fn distinct_instances_never_resolve_to_the_same_local_path() {
        let a = resolve(
            &VirtualPath::local("x"),
            &roots(),
            &InstanceContext::new(1),
        );
        let b = resolve(
            &VirtualPath::local("x"),
            &roots(),
            &InstanceContext::new(2),
        );
        assert_ne!(a, b);
    }
}
