mod file;

pub use file::NativeFile;

use crate::alias::Alias;
use crate::file::{File, FileMode};
use crate::file_info::FileInfo;
use crate::sync::Mutex;
use crate::util::{
    already_exists, invalid_input, not_found, not_initialized, open_failed, permission_denied,
    to_forward_slashes, with_trailing_slash,
};
use crate::{FilePtr, FileSystem, FileWeakPtr};
use enumflags2::BitFlags;
use itertools::Itertools;
use std::collections::{hash_map, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

struct FileEntry {
    info: FileInfo,
    handles: Vec<FileWeakPtr>,
}

impl FileEntry {
    fn new(info: FileInfo) -> Self {
        Self {
            info,
            handles: Vec::new(),
        }
    }

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

/// A backend projecting a directory on disk into the virtual namespace.
/// The tree is scanned once at initialization; paths created through this
/// backend are added to the table as they appear.
pub struct NativeFileSystem {
    alias: Alias,
    base_path: String,
    state: Mutex<State>,
}

impl NativeFileSystem {
    /// Creates a native backend serving `base_path` under `alias`.
    pub fn new(alias: &str, base_path: impl AsRef<Path>) -> Self {
        let base_path = with_trailing_slash(to_forward_slashes(
            &base_path.as_ref().to_string_lossy(),
        ));
        Self {
            alias: Alias::new(alias),
            base_path,
            state: Mutex::new(State {
                initialized: false,
                files: HashMap::new(),
            }),
        }
    }

    fn file_info(&self, path: &str) -> FileInfo {
        FileInfo::new(self.alias.clone(), &self.base_path, path)
    }

    fn scan_dir(
        alias: &Alias,
        base_path: &str,
        dir: &Path,
        files: &mut HashMap<String, FileEntry>,
    ) -> crate::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                Self::scan_dir(alias, base_path, &entry.path(), files)?;
            } else if file_type.is_file() {
                let native = entry.path().to_string_lossy().into_owned();
                let info = FileInfo::new(alias.clone(), base_path, &native);
                files.insert(info.virtual_path().to_owned(), FileEntry::new(info));
            }
        }
        Ok(())
    }
}

impl FileSystem for NativeFileSystem {
    fn initialize(&self) -> crate::Result<()> {
        let mut state = self.state.lock();
        if state.initialized {
            return Ok(());
        }

        let base = Path::new(&self.base_path);
        if !fs::metadata(base).map(|meta| meta.is_dir()).unwrap_or(false) {
            return Err(invalid_input("Base path is not a directory"));
        }

        let mut files = HashMap::new();
        Self::scan_dir(&self.alias, &self.base_path, base, &mut files)?;
        debug!(
            "mounted {} at {} with {} files",
            self.base_path,
            self.alias,
            files.len()
        );

        state.files = files;
        state.initialized = true;
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
        self.base_path.clone()
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
        fs::metadata(&self.base_path)
            .map(|meta| meta.permissions().readonly())
            .unwrap_or(true)
    }

    fn open_file(&self, path: &str, mode: BitFlags<FileMode>) -> crate::Result<FilePtr> {
        if !FileMode::is_valid(mode) {
            return Err(invalid_input("Invalid open mode"));
        }

        let write_requested = FileMode::is_writable(mode);
        if write_requested && self.is_read_only() {
            return Err(permission_denied());
        }

        let mut state = self.state.lock();
        if !state.initialized {
            return Err(not_initialized());
        }

        let info = self.file_info(path);
        let key = info.virtual_path().to_owned();

        let mut effective_mode = mode;
        let entry = match state.files.entry(key) {
            hash_map::Entry::Occupied(occupied) => occupied.into_mut(),
            hash_map::Entry::Vacant(vacant) => {
                if !write_requested {
                    return Err(not_found());
                }
                // creating: the plain read-write flag set cannot create a
                // file, so force the truncating variant for the first open
                effective_mode |= FileMode::Truncate;
                vacant.insert(FileEntry::new(info))
            }
        };
        let file = Arc::new(NativeFile::new(entry.info.clone()));
        if !file.open(effective_mode) {
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
        if self.is_read_only() {
            return Err(permission_denied());
        }

        let mut state = self.state.lock();
        if !state.initialized {
            return Err(not_initialized());
        }

        let key = self.file_info(path).virtual_path().to_owned();
        let Some(entry) = state.files.remove(&key) else {
            return Err(not_found());
        };
        fs::remove_file(entry.info.native_path())
    }

    fn copy_file(&self, src: &str, dst: &str, overwrite: bool) -> crate::Result<()> {
        if self.is_read_only() {
            return Err(permission_denied());
        }

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
        let dst_present =
            state.files.contains_key(&dst_key) || Path::new(dst_info.native_path()).exists();
        if dst_present && !overwrite {
            return Err(already_exists());
        }

        fs::copy(src_entry.info.native_path(), dst_info.native_path())?;
        state.files.insert(dst_key, FileEntry::new(dst_info));
        Ok(())
    }

    fn rename_file(&self, src: &str, dst: &str) -> crate::Result<()> {
        if self.is_read_only() {
            return Err(permission_denied());
        }

        let mut state = self.state.lock();
        if !state.initialized {
            return Err(not_initialized());
        }

        let src_key = self.file_info(src).virtual_path().to_owned();
        let dst_info = self.file_info(dst);
        let dst_key = dst_info.virtual_path().to_owned();

        if !state.files.contains_key(&src_key) {
            return Err(not_found());
        }
        if state.files.contains_key(&dst_key) || Path::new(dst_info.native_path()).exists() {
            return Err(already_exists());
        }

        let entry = state.files.remove(&src_key).expect("presence just checked");
        fs::rename(entry.info.native_path(), dst_info.native_path())?;
        state.files.insert(dst_key, FileEntry::new(dst_info));
        Ok(())
    }

    fn is_file_exists(&self, path: &str) -> bool {
        let state = self.state.lock();
        state.initialized && state.files.contains_key(self.file_info(path).virtual_path())
    }
}

#[cfg(test)]
mod test {
    use super::NativeFileSystem;
    use crate::file::{File, FileMode};
    use crate::FileSystem;
    use itertools::Itertools;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, NativeFileSystem) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("root.txt"), b"root").unwrap();
        fs::create_dir_all(dir.path().join("sub/deep")).unwrap();
        fs::write(dir.path().join("sub/nested.txt"), b"nested").unwrap();
        fs::write(dir.path().join("sub/deep/leaf.txt"), b"leaf").unwrap();

        let fs = NativeFileSystem::new("/data/", dir.path());
        fs.initialize().unwrap();
        (dir, fs)
    }

    #[test]
    fn initialize_requires_a_directory() {
        let fs = NativeFileSystem::new("/x/", "/definitely/not/here");
        assert!(fs.initialize().is_err());
        assert!(!fs.is_initialized());

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("regular.txt");
        fs::write(&path, b"file, not dir").unwrap();
        let fs = NativeFileSystem::new("/x/", &path);
        assert!(fs.initialize().is_err());
    }

    #[test]
    fn scan_projects_the_whole_tree() {
        let (_dir, fs) = fixture();

        itertools::assert_equal(
            fs.files_list()
                .iter()
                .map(|info| info.virtual_path())
                .sorted(),
            vec![
                "/data/root.txt",
                "/data/sub/deep/leaf.txt",
                "/data/sub/nested.txt",
            ],
        );
        assert!(fs.is_file_exists("/data/sub/nested.txt"));
        assert!(!fs.is_file_exists("/data/absent.txt"));
    }

    #[test]
    fn open_existing_for_read() {
        let (_dir, fs) = fixture();
        let file = fs
            .open_file("/data/sub/deep/leaf.txt", FileMode::Read.into())
            .unwrap();
        assert_eq!(file.read_to_string().unwrap(), "leaf");
    }

    #[test]
    fn open_missing_for_read_fails() {
        let (_dir, fs) = fixture();
        assert!(fs.open_file("/data/absent.txt", FileMode::Read.into()).is_err());
    }

    #[test]
    fn write_creates_and_registers() {
        let (dir, fs) = fixture();
        let file = fs
            .open_file("/data/fresh.txt", FileMode::Write.into())
            .unwrap();
        assert_eq!(file.write(b"made it"), 7);
        file.close();

        assert!(fs.is_file_exists("/data/fresh.txt"));
        assert_eq!(fs::read(dir.path().join("fresh.txt")).unwrap(), b"made it");
    }

    #[test]
    fn remove_file_deletes_on_disk() {
        let (dir, fs) = fixture();
        fs.remove_file("/data/root.txt").unwrap();

        assert!(!fs.is_file_exists("/data/root.txt"));
        assert!(!dir.path().join("root.txt").exists());
        assert!(fs.remove_file("/data/root.txt").is_err());
    }

    #[test]
    fn copy_honors_overwrite() {
        let (dir, fs) = fixture();

        fs.copy_file("/data/root.txt", "/data/copy.txt", false).unwrap();
        assert_eq!(fs::read(dir.path().join("copy.txt")).unwrap(), b"root");

        assert!(fs.copy_file("/data/root.txt", "/data/copy.txt", false).is_err());
        fs.copy_file("/data/root.txt", "/data/copy.txt", true).unwrap();

        assert!(fs.copy_file("/data/absent.txt", "/data/other.txt", false).is_err());
    }

    #[test]
    fn rename_refuses_existing_destination() {
        let (dir, fs) = fixture();

        fs.rename_file("/data/root.txt", "/data/moved.txt").unwrap();
        assert!(!dir.path().join("root.txt").exists());
        assert_eq!(fs::read(dir.path().join("moved.txt")).unwrap(), b"root");

        assert!(fs
            .rename_file("/data/sub/nested.txt", "/data/moved.txt")
            .is_err());
    }

    #[cfg(unix)]
    #[test]
    fn read_only_mount_rejects_writes() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("existing.txt"), b"keep").unwrap();
        let fs = NativeFileSystem::new("/ro/", dir.path());
        fs.initialize().unwrap();

        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o555)).unwrap();
        assert!(fs.is_read_only());
        assert!(fs.open_file("/ro/new.txt", FileMode::Write.into()).is_err());
        assert!(fs.remove_file("/ro/existing.txt").is_err());
        assert!(fs.is_file_exists("/ro/existing.txt"));

        // restore so the tempdir can clean up
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755)).unwrap();
    }
}
