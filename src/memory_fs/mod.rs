mod file;
mod object;

pub use file::MemoryFile;
pub use object::MemoryObject;

use crate::alias::Alias;
use crate::file::{File, FileMode};
use crate::file_info::FileInfo;
use crate::sync::Mutex;
use crate::util::{already_exists, invalid_input, not_found, not_initialized, open_failed};
use crate::{FilePtr, FileSystem, FileWeakPtr};
use enumflags2::BitFlags;
use itertools::Itertools;
use std::collections::HashMap;
use std::sync::Arc;

struct FileEntry {
    info: FileInfo,
    object: Arc<MemoryObject>,
    handles: Vec<FileWeakPtr>,
}

impl FileEntry {
    fn new(info: FileInfo) -> Self {
        Self {
            info,
            object: Arc::new(MemoryObject::new()),
            handles: Vec::new(),
        }
    }

    /// Drops expired weak handles, plus the one matching `exclude` if given.
    fn cleanup_handles(&mut self, exclude: Option<&FilePtr>) {
        self.handles.retain(|weak| match weak.upgrade() {
            Some(handle) => exclude.map_or(true, |closed| !Arc::ptr_eq(&handle, closed)),
            None => false,
        });
    }
}

struct State {
    initialized: bool,
    files: HashMap<String, FileEntry>,
}

/// A fully in-memory backend. Files come into existence the first time a
/// path is opened and live in a `virtual path -> entry` table; handles to
/// the same path share one [`MemoryObject`].
pub struct MemoryFileSystem {
    alias: Alias,
    state: Mutex<State>,
}

impl MemoryFileSystem {
    /// Creates a memory backend that will serve files under `alias`.
    pub fn new(alias: &str) -> Self {
        Self {
            alias: Alias::new(alias),
            state: Mutex::new(State {
                initialized: false,
                files: HashMap::new(),
            }),
        }
    }

    fn file_info(&self, path: &str) -> FileInfo {
        FileInfo::new(self.alias.clone(), self.alias.as_str(), path)
    }
}

impl FileSystem for MemoryFileSystem {
    fn initialize(&self) -> crate::Result<()> {
        self.state.lock().initialized = true;
        Ok(())
    }

    fn shutdown(&self) {
        let mut state = self.state.lock();
        for entry in state.files.values_mut() {
            for weak in entry.handles.drain(..) {
                if let Some(handle) = weak.upgrade() {
                    handle.close();
                }
            }
        }
        state.files.clear();
        state.initialized = false;
    }

    fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    fn base_path(&self) -> String {
        self.alias.as_str().to_owned()
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
        false
    }

    fn open_file(&self, path: &str, mode: BitFlags<FileMode>) -> crate::Result<FilePtr> {
        if !FileMode::is_valid(mode) {
            return Err(invalid_input("Invalid open mode"));
        }

        let mut state = self.state.lock();
        if !state.initialized {
            return Err(not_initialized());
        }

        let info = self.file_info(path);
        let entry = state
            .files
            .entry(info.virtual_path().to_owned())
            .or_insert_with(|| FileEntry::new(info));

        let file = Arc::new(MemoryFile::new(entry.info.clone(), entry.object.clone()));
        if !file.open(mode) {
            // The entry stays; a later open with a valid mode may succeed.
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

    fn create_file(&self, path: &str) -> crate::Result<FilePtr> {
        self.open_file(path, FileMode::read_write() | FileMode::Truncate)
    }

    fn remove_file(&self, path: &str) -> crate::Result<()> {
        let mut state = self.state.lock();
        if !state.initialized {
            return Err(not_initialized());
        }

        let key = self.file_info(path).virtual_path().to_owned();
        if state.files.remove(&key).is_none() {
            return Err(not_found());
        }

        for entry in state.files.values_mut() {
            entry.cleanup_handles(None);
        }
        Ok(())
    }

    fn copy_file(&self, src: &str, dst: &str, overwrite: bool) -> crate::Result<()> {
        let mut state = self.state.lock();
        if !state.initialized {
            return Err(not_initialized());
        }

        let src_key = self.file_info(src).virtual_path().to_owned();
        let dst_info = self.file_info(dst);
        let dst_key = dst_info.virtual_path().to_owned();

        let Some(src_entry) = state.files.get(&src_key) else {
            return Err(not_found());
        };
        if state.files.contains_key(&dst_key) && !overwrite {
            return Err(already_exists());
        }

        let copy = FileEntry {
            info: dst_info,
            object: Arc::new(src_entry.object.clone_object()),
            handles: Vec::new(),
        };
        state.files.insert(dst_key, copy);
        Ok(())
    }

    fn rename_file(&self, src: &str, dst: &str) -> crate::Result<()> {
        self.copy_file(src, dst, false)?;
        self.remove_file(src)
    }

    fn is_file_exists(&self, path: &str) -> bool {
        let state = self.state.lock();
        state.initialized && state.files.contains_key(self.file_info(path).virtual_path())
    }
}
