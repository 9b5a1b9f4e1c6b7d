//! # Virtual filesystem multiplexer
//! This crate presents one unified path namespace layered over several
//! independent storage backends, in the way games and asset pipelines want
//! it: mount the shipped data, mount DLC over it, and keep calling
//! `open_file("/asset/…")`.
//!
//! `vfs-mux` ships three backends behind the [`FileSystem`] trait:
//! - [`NativeFileSystem`]: a directory on disk projected into the virtual
//!   namespace. Read-write, unless the directory itself is not.
//! - [`MemoryFileSystem`]: a read-write in-memory store whose files share
//!   copy-on-write buffers between handles.
//! - [`ZipFileSystem`]: a read-only view over a PKZIP archive, indexed by its
//!   central directory and decompressed on demand.
//!
//! The [`VirtualFileSystem`] resolves paths across mounts: the longest
//! registered alias wins, backends mounted at the same alias overlay each
//! other newest-first, and writes that match no existing file fall through to
//! the oldest mount.
//!
//! Handles implement [`File`], a deliberately quiet contract (byte counts out,
//! `0` on closed/EOF/not-permitted) shared by all backends.

use enumflags2::BitFlags;
use mockall::automock;
use std::sync::{Arc, Weak};

pub use alias::Alias;
pub use error::*;
pub use file::{File, FileMode, SeekOrigin};
pub use file_info::FileInfo;
pub use memory_fs::{MemoryFile, MemoryFileSystem, MemoryObject};
pub use native_fs::{NativeFile, NativeFileSystem};
pub use vfs::VirtualFileSystem;
pub use zip_fs::{ZipFile, ZipFileSystem};

/// A shared file handle.
#[cfg(feature = "thread-safe")]
pub type FilePtr = Arc<dyn File + Send + Sync>;
/// A shared file handle.
#[cfg(not(feature = "thread-safe"))]
pub type FilePtr = Arc<dyn File>;

/// A non-owning reference to an outstanding handle, used by backends for
/// bookkeeping.
#[cfg(feature = "thread-safe")]
pub type FileWeakPtr = Weak<dyn File + Send + Sync>;
/// A non-owning reference to an outstanding handle, used by backends for
/// bookkeeping.
#[cfg(not(feature = "thread-safe"))]
pub type FileWeakPtr = Weak<dyn File>;

/// A shared backend, as mounted into a [`VirtualFileSystem`].
#[cfg(feature = "thread-safe")]
pub type FileSystemPtr = Arc<dyn FileSystem + Send + Sync>;
/// A shared backend, as mounted into a [`VirtualFileSystem`].
#[cfg(not(feature = "thread-safe"))]
pub type FileSystemPtr = Arc<dyn FileSystem>;

/// One storage backend: a table of files addressed by virtual path, plus the
/// lifecycle and mutation operations around it.
///
/// Mutating operations on a read-only backend fail without side effects.
#[automock]
pub trait FileSystem {
    /// Initializes the backend; call before any other operation. Idempotent.
    fn initialize(&self) -> Result<()>;
    /// Releases the backend's resources. Outstanding handles turn stale but
    /// stay safe to call.
    fn shutdown(&self);
    /// Returns true once `initialize` has succeeded.
    fn is_initialized(&self) -> bool;
    /// The backend-local base path. Empty for backends without one.
    fn base_path(&self) -> String;
    /// The alias this backend serves.
    fn virtual_path(&self) -> String;
    /// A snapshot of every file the backend currently knows.
    fn files_list(&self) -> Vec<FileInfo>;
    /// Returns true when the backend rejects all mutation.
    fn is_read_only(&self) -> bool;
    /// Opens `path` with `mode`. Writable backends create missing files on
    /// write requests.
    fn open_file(&self, path: &str, mode: BitFlags<FileMode>) -> Result<FilePtr>;
    /// Closes a handle and drops the backend's bookkeeping reference to it.
    fn close_file(&self, file: &FilePtr);
    /// Creates (or truncates) `path` and returns a read-write handle.
    fn create_file(&self, path: &str) -> Result<FilePtr>;
    /// Removes `path` from the backend.
    fn remove_file(&self, path: &str) -> Result<()>;
    /// Copies `src` to `dst`, refusing an existing destination unless
    /// `overwrite` is set.
    fn copy_file(&self, src: &str, dst: &str, overwrite: bool) -> Result<()>;
    /// Renames `src` to `dst`, refusing an existing destination.
    fn rename_file(&self, src: &str, dst: &str) -> Result<()>;
    /// Returns true if the backend holds `path`.
    fn is_file_exists(&self, path: &str) -> bool;
}

pub mod alias;
pub mod error;
pub mod file;
pub mod file_info;
pub mod memory_fs;
pub mod native_fs;
mod sync;
mod util;
pub mod vfs;
pub mod zip_fs;
