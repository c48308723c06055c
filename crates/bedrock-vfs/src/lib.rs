//! Virtualized file access for the emulation core.
//!
//! Files are addressed in two namespaces (host-global and
//! per-instance-local, see [`VirtualPath`]) and opened through a
//! probe-before-create policy: a creating mode never silently fabricates a
//! file when the caller actually wanted "open existing". All operations are
//! synchronous and may block on I/O; callers needing non-blocking behavior
//! run them on a dedicated platform thread.
#![forbid(unsafe_code)]

mod error;
mod path;

pub use error::{Result, VfsError};
pub use path::{resolve, VfsRoots, VirtualPath};

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bedrock_platform::InstanceContext;

/// Open modes understood by the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Read-only; the file must exist.
    Read,
    /// Write; creates or truncates.
    Write,
    /// Read/write, open-or-create, existing contents kept.
    Preserve,
    /// Read/write; the file must exist.
    NoCreate,
    /// Line-oriented read/write; the file must exist.
    Text,
}

impl FileMode {
    fn requires_existing(self) -> bool {
        // Mirrors the historical "may create iff opened with a w-mode" rule.
        !matches!(self, FileMode::Write | FileMode::Preserve)
    }

    fn apply(self, options: &mut OpenOptions) {
        match self {
            FileMode::Read => {
                options.read(true);
            }
            FileMode::Write => {
                options.write(true).create(true).truncate(true);
            }
            FileMode::Preserve => {
                options.read(true).write(true).create(true);
            }
            FileMode::NoCreate | FileMode::Text => {
                options.read(true).write(true);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    Start,
    Current,
    End,
}

/// The virtual file service. Holds the namespace roots; instance identity is
/// borrowed per call so one service can serve a rebound instance.
#[derive(Debug, Clone)]
pub struct Vfs {
    roots: VfsRoots,
}

impl Vfs {
    pub fn new(roots: VfsRoots) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &VfsRoots {
        &self.roots
    }

    /// Resolves `path` and opens it with `mode`.
    ///
    /// The existence probe and the real open are two separate host calls, so
    /// the check is racy under concurrent access to the same path from
    /// multiple instances. The policy is kept anyway because callers depend
    /// on its observable contract: `NoCreate`/`Read`/`Text` never create,
    /// `Write`/`Preserve` may.
    pub fn open(
        &self,
        instance: &InstanceContext,
        path: &VirtualPath,
        mode: FileMode,
    ) -> Result<FileHandle> {
        let resolved = resolve(path, &self.roots, instance);
        if !probe(&resolved) && mode.requires_existing() {
            return Err(VfsError::NotFound(resolved));
        }
        let mut options = OpenOptions::new();
        mode.apply(&mut options);
        let file = options
            .open(&resolved)
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::NotFound => VfsError::NotFound(resolved.clone()),
                _ => VfsError::ResourceUnavailable {
                    path: resolved.clone(),
                    source,
                },
            })?;
        tracing::debug!(path = %resolved.display(), ?mode, "opened file");
        Ok(FileHandle {
            file,
            path: resolved,
            mode,
        })
    }

    /// Existence probe without retaining a handle.
    pub fn exists(&self, instance: &InstanceContext, path: &VirtualPath) -> bool {
        probe(&resolve(path, &self.roots, instance))
    }
}

fn probe(path: &Path) -> bool {
    File::open(path).is_ok()
}

/// One open file descriptor plus its resolved path and open mode.
///
/// Closing consumes the handle, so operations on a closed file are
/// unrepresentable rather than checked at runtime.
pub struct FileHandle {
    file: File,
    path: PathBuf,
    mode: FileMode,
}

impl FileHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.file.read(buf)?)
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        Ok(self.file.read_exact(buf)?)
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        Ok(self.file.write(buf)?)
    }

    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        Ok(self.file.write_all(buf)?)
    }

    /// Reads up to `buf.len() - 1` bytes or through the next newline,
    /// whichever comes first, and NUL-terminates. Returns the number of
    /// bytes stored before the NUL; 0 means end-of-file (or a zero-sized
    /// buffer).
    pub fn read_line(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut stored = 0;
        while stored < buf.len() - 1 {
            let mut byte = [0u8; 1];
            match self.file.read(&mut byte)? {
                0 => break,
                _ => {
                    buf[stored] = byte[0];
                    stored += 1;
                    if byte[0] == b'\n' {
                        break;
                    }
                }
            }
        }
        buf[stored] = 0;
        Ok(stored)
    }

    pub fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<u64> {
        let pos = match origin {
            SeekOrigin::Start => SeekFrom::Start(offset.max(0) as u64),
            SeekOrigin::Current => SeekFrom::Current(offset),
            SeekOrigin::End => SeekFrom::End(offset),
        };
        Ok(self.file.seek(pos)?)
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.file.stream_position()?)
    }

    /// Total length in bytes; the read/write position is left unchanged.
    pub fn length(&mut self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Renders `args` and writes the rendered bytes. A formatting failure is
    /// a no-op returning `Ok(0)`, not an error.
    pub fn write_formatted(&mut self, args: fmt::Arguments<'_>) -> Result<usize> {
        let mut rendered = String::new();
        if fmt::write(&mut rendered, args).is_err() {
            return Ok(0);
        }
        self.file.write_all(rendered.as_bytes())?;
        Ok(rendered.len())
    }

    /// Pushes pending writes to the backing file so subsequent reads,
    /// including from other handles on the same path, observe them.
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Flushes and releases the descriptor. All pending writes are visible
    /// before this returns successfully.
    pub fn close(mut self) -> Result<()> {
        if !matches!(self.mode, FileMode::Read) {
            self.flush()?;
        }
        Ok(())
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .finish()
    }
}
