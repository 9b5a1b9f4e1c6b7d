mod file;

pub use file::ZipFile;

use crate::alias::Alias;
use crate::file::{File, FileMode};
use crate::file_info::FileInfo;
use crate::sync::Mutex;
use crate::util::{invalid_input, not_found, not_initialized, not_supported, open_failed};
use crate::{FilePtr, FileSystem, FileWeakPtr};
use enumflags2::BitFlags;
use itertools::Itertools;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use zip::result::{ZipError, ZipResult};
use zip::ZipArchive;

pub(crate) type SharedArchive = Arc<Mutex<ZipArchive<fs::File>>>;

struct FileEntry {
    info: FileInfo,
    entry_index: usize,
    size: u64,
    handles: Vec<FileWeakPtr>,
}

impl FileEntry {
    fn cleanup_handles(&mut self, exclude: Option<&FilePtr>) {
        self.handles.retain(|weak| match weak.upgrade() {
            Some(handle) => exclude.map_or(true, |closed| !Arc::ptr_eq(&handle, closed)),
            None => false,
        });
    }
}

struct State {
    initialized: bool,
    archive: Option<SharedArchive>,
    files: HashMap<String, FileEntry>,
}

/// A read-only backend over a PKZIP archive. The central directory is
/// enumerated once at initialization; every mutating operation is refused.
pub struct ZipFileSystem {
    alias: Alias,
    zip_path: PathBuf,
    state: Mutex<State>,
}

impl ZipFileSystem {
    /// Creates a zip backend serving the archive at `zip_path` under `alias`.
    pub fn new(alias: &str, zip_path: impl AsRef<Path>) -> Self {
        Self {
            alias: Alias::new(alias),
            zip_path: zip_path.as_ref().to_owned(),
            state: Mutex::new(State {
                initialized: false,
                archive: None,
                files: HashMap::new(),
            }),
        }
    }

    fn convert_error<T>(result: ZipResult<T>) -> crate::Result<T> {
        result.map_err(|err| match err {
            ZipError::FileNotFound => {
                io::Error::new(ErrorKind::NotFound, "File not found in zip archive")
            }
            ZipError::Io(io_error) => io_error,
            ZipError::InvalidArchive(error_str) => {
                io::Error::new(ErrorKind::InvalidData, error_str)
            }
            ZipError::UnsupportedArchive(error_str) => {
                io::Error::new(ErrorKind::Unsupported, error_str)
            }
        })
    }
}

impl FileSystem for ZipFileSystem {
    fn initialize(&self) -> crate::Result<()> {
        let mut state = self.state.lock();
        if state.initialized {
            return Ok(());
        }

        if !fs::metadata(&self.zip_path)
            .map(|meta| meta.is_file())
            .unwrap_or(false)
        {
            return Err(invalid_input("Zip path is not a regular file"));
        }

        let mut archive = Self::convert_error(ZipArchive::new(fs::File::open(&self.zip_path)?))?;

        let mut files = HashMap::new();
        for index in 0..archive.len() {
            let entry = match archive.by_index_raw(index) {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping unreadable zip entry {index}: {err}");
                    continue;
                }
            };
            // directory markers carry no bytes
            if entry.is_dir() || entry.name().ends_with('/') {
                continue;
            }

            let info = FileInfo::new(self.alias.clone(), "", entry.name());
            let size = entry.size();
            files.insert(
                info.virtual_path().to_owned(),
                FileEntry {
                    info,
                    entry_index: index,
                    size,
                    handles: Vec::new(),
                },
            );
        }
        debug!(
            "mounted {} at {} with {} entries",
            self.zip_path.display(),
            self.alias,
            files.len()
        );

        state.archive = Some(Arc::new(Mutex::new(archive)));
        state.files = files;
        state.initialized = true;
        Ok(())
    }

    fn shutdown(&self) {
        let mut state = self.state.lock();
        state.files.clear();
        // outstanding handles hold the archive weakly and go dead with it
        state.archive = None;
        state.initialized = false;
    }

    fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    fn base_path(&self) -> String {
        String::new()
    }

    fn virtual_path(&self) -> String {
        self.alias.as_str().to_owned()
    }

    fn files_list(&self) -> Vec<FileInfo> {
        let state = self.state.lock();
        state
            .files
            .values()
            .map(|entry| entry.info.clone())
            .collect_vec()
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn open_file(&self, path: &str, mode: BitFlags<FileMode>) -> crate::Result<FilePtr> {
        if !FileMode::is_valid(mode) {
            return Err(invalid_input("Invalid open mode"));
        }
        if FileMode::is_writable(mode) {
            return Err(not_supported());
        }

        let mut state = self.state.lock();
        if !state.initialized {
            return Err(not_initialized());
        }
        let Some(archive) = state.archive.clone() else {
            return Err(not_initialized());
        };

        let key = FileInfo::new(self.alias.clone(), "", path).virtual_path().to_owned();
        let Some(entry) = state.files.get_mut(&key) else {
            return Err(not_found());
        };

        let file = Arc::new(ZipFile::new(
            entry.info.clone(),
            entry.entry_index,
            entry.size,
            &archive,
        ));
        if !file.open(mode) {
            return Err(open_failed());
        }

        let file: FilePtr = file;
        entry.handles.push(Arc::downgrade(&file));
        Ok(file)
    }

    fn close_file(&self, file: &FilePtr) {
        file.close();

        let mut state = self.state.lock();
        for entry in state.files.values_mut() {
            entry.cleanup_handles(Some(file));
        }
    }

    fn create_file(&self, _path: &str) -> crate::Result<FilePtr> {
        Err(not_supported())
    }

    fn remove_file(&self, _path: &str) -> crate::Result<()> {
        Err(not_supported())
    }

    fn copy_file(&self, _src: &str, _dst: &str, _overwrite: bool) -> crate::Result<()> {
        Err(not_supported())
    }

    fn rename_file(&self, _src: &str, _dst: &str) -> crate::Result<()> {
        Err(not_supported())
    }

    fn is_file_exists(&self, path: &str) -> bool {
        let state = self.state.lock();
        state.initialized
            && state
                .files
                .contains_key(FileInfo::new(self.alias.clone(), "", path).virtual_path())
    }
}
