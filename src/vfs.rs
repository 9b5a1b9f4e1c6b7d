use crate::alias::Alias;
use crate::file::FileMode;
use crate::sync::Mutex;
use crate::util::not_found;
use crate::{FilePtr, FileSystem, FileSystemPtr};
use enumflags2::BitFlags;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

struct State {
    alias_table: HashMap<Alias, Vec<FileSystemPtr>>,
    // descending length; ties keep registration order
    sorted_aliases: Vec<Alias>,
}

/// The multiplexer: one virtual namespace over any number of mounted
/// backends.
///
/// Backends register under an [`Alias`]. Lookups pick the longest alias
/// prefixing the requested path; several backends under one alias form an
/// overlay where the newest mount shadows the older ones, and the oldest
/// ("main") mount receives writes that match no existing file. This is the
/// DLC pattern: mount the base game, then mount patches over it.
///
/// ```no_run
/// use vfs_mux::{File, FileMode, NativeFileSystem, VirtualFileSystem, ZipFileSystem};
///
/// # fn mount() -> vfs_mux::Result<()> {
/// let vfs = VirtualFileSystem::new();
/// vfs.create_file_system("/", NativeFileSystem::new("/", "data/"))?;
/// vfs.create_file_system("/", ZipFileSystem::new("/", "data/patch1.zip"))?;
///
/// if let Ok(file) = vfs.open_file("/textures/grass.png", FileMode::Read.into()) {
///     let bytes = file.read_to_vec();
///     // ...
/// }
/// # Ok(())
/// # }
/// ```
pub struct VirtualFileSystem {
    state: Mutex<State>,
}

impl VirtualFileSystem {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                alias_table: HashMap::new(),
                sorted_aliases: Vec::new(),
            }),
        }
    }

    /// Mounts `filesystem` under `alias`. Several backends may share one
    /// alias; the latest mount is consulted first on lookups.
    pub fn add_file_system(&self, alias: &str, filesystem: FileSystemPtr) {
        let alias = Alias::new(alias);
        debug!("mounting a filesystem at {alias}");

        let mut state = self.state.lock();
        state
            .alias_table
            .entry(alias.clone())
            .or_default()
            .push(filesystem);

        if !state.sorted_aliases.contains(&alias) {
            state.sorted_aliases.push(alias);
            state.sorted_aliases.sort_by(|a, b| b.len().cmp(&a.len()));
        }
    }

    /// Initializes `filesystem` and mounts it under `alias`, handing back the
    /// concrete backend. Nothing is mounted when initialization fails.
    #[cfg(feature = "thread-safe")]
    pub fn create_file_system<F>(&self, alias: &str, filesystem: F) -> crate::Result<Arc<F>>
    where
        F: FileSystem + Send + Sync + 'static,
    {
        let filesystem = Arc::new(filesystem);
        filesystem.initialize()?;
        self.add_file_system(alias, filesystem.clone());
        Ok(filesystem)
    }

    /// Initializes `filesystem` and mounts it under `alias`, handing back the
    /// concrete backend. Nothing is mounted when initialization fails.
    #[cfg(not(feature = "thread-safe"))]
    pub fn create_file_system<F>(&self, alias: &str, filesystem: F) -> crate::Result<Arc<F>>
    where
        F: FileSystem + 'static,
    {
        let filesystem = Arc::new(filesystem);
        filesystem.initialize()?;
        self.add_file_system(alias, filesystem.clone());
        Ok(filesystem)
    }

    /// Unmounts one specific backend from `alias`. Removing the last backend
    /// retires the alias.
    pub fn remove_file_system(&self, alias: &str, filesystem: &FileSystemPtr) {
        let alias = Alias::new(alias);

        let mut state = self.state.lock();
        let Some(mounted) = state.alias_table.get_mut(&alias) else {
            return;
        };
        mounted.retain(|candidate| !Arc::ptr_eq(candidate, filesystem));
        if mounted.is_empty() {
            state.alias_table.remove(&alias);
            state.sorted_aliases.retain(|known| known != &alias);
        }
    }

    /// Unmounts every backend registered under `alias`.
    pub fn unregister_alias(&self, alias: &str) {
        let alias = Alias::new(alias);

        let mut state = self.state.lock();
        state.alias_table.remove(&alias);
        state.sorted_aliases.retain(|known| known != &alias);
    }

    /// Returns true if this exact backend is mounted under `alias`.
    pub fn has_file_system(&self, alias: &str, filesystem: &FileSystemPtr) -> bool {
        let alias = Alias::new(alias);

        let state = self.state.lock();
        state
            .alias_table
            .get(&alias)
            .map(|mounted| {
                mounted
                    .iter()
                    .any(|candidate| Arc::ptr_eq(candidate, filesystem))
            })
            .unwrap_or(false)
    }

    /// Returns true if any backend is mounted under `alias`.
    pub fn is_alias_registered(&self, alias: &str) -> bool {
        let alias = Alias::new(alias);
        self.state.lock().alias_table.contains_key(&alias)
    }

    /// A snapshot of the backends mounted under `alias`, oldest first.
    pub fn file_systems(&self, alias: &str) -> Vec<FileSystemPtr> {
        let alias = Alias::new(alias);
        self.state
            .lock()
            .alias_table
            .get(&alias)
            .cloned()
            .unwrap_or_default()
    }

    /// Resolves `virtual_path` and opens it.
    ///
    /// Aliases are tried longest first. Under a matching alias the backends
    /// are consulted newest to oldest and the first one holding the file
    /// wins. A writable request that matches no existing file falls back to
    /// the alias's main (oldest) backend, which may create it.
    pub fn open_file(
        &self,
        virtual_path: &str,
        mode: BitFlags<FileMode>,
    ) -> crate::Result<FilePtr> {
        let state = self.state.lock();

        for alias in &state.sorted_aliases {
            if !alias.is_prefix_of(virtual_path) {
                continue;
            }
            let Some(mounted) = state.alias_table.get(alias) else {
                continue;
            };

            for filesystem in mounted.iter().rev() {
                if filesystem.is_file_exists(virtual_path) {
                    if let Ok(file) = filesystem.open_file(virtual_path, mode) {
                        return Ok(file);
                    }
                }
            }

            if FileMode::is_writable(mode) {
                if let Some(main) = mounted.first() {
                    if let Ok(file) = main.open_file(virtual_path, mode) {
                        return Ok(file);
                    }
                }
            }
        }

        Err(not_found())
    }

    /// Returns true if any mounted backend holds `virtual_path`.
    pub fn is_file_exists(&self, virtual_path: &str) -> bool {
        let state = self.state.lock();
        state.sorted_aliases.iter().any(|alias| {
            alias.is_prefix_of(virtual_path)
                && state
                    .alias_table
                    .get(alias)
                    .map(|mounted| {
                        mounted
                            .iter()
                            .rev()
                            .any(|filesystem| filesystem.is_file_exists(virtual_path))
                    })
                    .unwrap_or(false)
        })
    }

    /// Every virtual path visible through any mount, deduplicated and sorted
    /// lexicographically.
    pub fn list_all_files(&self) -> Vec<String> {
        let state = self.state.lock();

        let mut paths = BTreeSet::new();
        for mounted in state.alias_table.values() {
            for filesystem in mounted.iter().rev() {
                for info in filesystem.files_list() {
                    paths.insert(info.virtual_path().to_owned());
                }
            }
        }
        paths.into_iter().collect()
    }
}

impl Default for VirtualFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for VirtualFileSystem {
    fn drop(&mut self) {
        let state = self.state.lock();
        for mounted in state.alias_table.values() {
            for filesystem in mounted {
                filesystem.shutdown();
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::VirtualFileSystem;
    use crate::file::{File, FileMode, SeekOrigin};
    use crate::memory_fs::MemoryFileSystem;
    use crate::{FileSystem, FileSystemPtr, MockFileSystem};
    use std::sync::Arc;

    fn mock() -> MockFileSystem {
        let mut mock = MockFileSystem::new();
        mock.expect_shutdown().return_const(());
        mock
    }

    fn write_file(vfs: &VirtualFileSystem, path: &str, contents: &[u8]) {
        let file = vfs
            .open_file(path, FileMode::read_write() | FileMode::Truncate)
            .unwrap();
        file.write(contents);
        file.close();
    }

    fn read_file(vfs: &VirtualFileSystem, path: &str) -> String {
        let file = vfs.open_file(path, FileMode::Read.into()).unwrap();
        file.read_to_string().unwrap()
    }

    #[test]
    fn registration_and_aliases() {
        let vfs = VirtualFileSystem::new();
        let fs: FileSystemPtr = Arc::new(mock());

        vfs.add_file_system("/data", fs.clone());
        // alias is normalized before comparison
        assert!(vfs.is_alias_registered("/data/"));
        assert!(vfs.is_alias_registered("data"));
        assert!(vfs.has_file_system("/data/", &fs));
        assert_eq!(vfs.file_systems("/data/").len(), 1);

        vfs.remove_file_system("/data/", &fs);
        assert!(!vfs.is_alias_registered("/data/"));
        assert!(vfs.file_systems("/data/").is_empty());
    }

    #[test]
    fn unregister_alias_drops_all_mounts() {
        let vfs = VirtualFileSystem::new();
        vfs.add_file_system("/a/", Arc::new(mock()));
        vfs.add_file_system("/a/", Arc::new(mock()));

        vfs.unregister_alias("/a/");
        assert!(!vfs.is_alias_registered("/a/"));
    }

    #[test]
    fn create_file_system_initializes_first() {
        let vfs = VirtualFileSystem::new();

        let mut ok = mock();
        ok.expect_initialize().times(1).returning(|| Ok(()));
        vfs.create_file_system("/ok/", ok).unwrap();
        assert!(vfs.is_alias_registered("/ok/"));

        let mut failing = mock();
        failing
            .expect_initialize()
            .times(1)
            .returning(|| Err(std::io::Error::new(std::io::ErrorKind::Other, "nope")));
        assert!(vfs.create_file_system("/bad/", failing).is_err());
        assert!(!vfs.is_alias_registered("/bad/"));
    }

    #[test]
    fn overlay_newest_mount_wins() {
        let vfs = VirtualFileSystem::new();
        let base = vfs
            .create_file_system("/dlc/", MemoryFileSystem::new("/dlc/"))
            .unwrap();
        let patch = vfs
            .create_file_system("/dlc/", MemoryFileSystem::new("/dlc/"))
            .unwrap();

        let seed = |fs: &MemoryFileSystem, path: &str, contents: &[u8]| {
            let file = fs.create_file(path).unwrap();
            file.write(contents);
            file.close();
        };
        seed(&base, "/dlc/file.txt", b"v1");
        seed(&base, "/dlc/file1.txt", b"one");
        seed(&patch, "/dlc/file.txt", b"v2");
        seed(&patch, "/dlc/file2.txt", b"two");

        assert_eq!(read_file(&vfs, "/dlc/file.txt"), "v2");
        assert_eq!(read_file(&vfs, "/dlc/file1.txt"), "one");
        assert_eq!(read_file(&vfs, "/dlc/file2.txt"), "two");
        assert!(vfs.open_file("/dlc/file3.txt", FileMode::Read.into()).is_err());
    }

    #[test]
    fn writes_fall_back_to_the_main_mount() {
        let vfs = VirtualFileSystem::new();
        let main = vfs
            .create_file_system("/save/", MemoryFileSystem::new("/save/"))
            .unwrap();
        let overlay = vfs
            .create_file_system("/save/", MemoryFileSystem::new("/save/"))
            .unwrap();

        // no existing file anywhere: the write lands in the oldest mount
        write_file(&vfs, "/save/slot0.bin", b"progress");
        assert!(main.is_file_exists("/save/slot0.bin"));
        assert!(!overlay.is_file_exists("/save/slot0.bin"));

        // the file now exists in the overlay: the write stays there
        let file = overlay.create_file("/save/patched.bin").unwrap();
        file.close();
        let file = vfs
            .open_file("/save/patched.bin", FileMode::read_write())
            .unwrap();
        file.write(b"x");
        file.close();
        assert!(!main.is_file_exists("/save/patched.bin"));
    }

    #[test]
    fn longest_alias_wins() {
        let vfs = VirtualFileSystem::new();
        let outer = vfs
            .create_file_system("/a/", MemoryFileSystem::new("/a/"))
            .unwrap();
        let inner = vfs
            .create_file_system("/a/b/", MemoryFileSystem::new("/a/b/"))
            .unwrap();

        let file = outer.create_file("/a/x").unwrap();
        file.write(b"A");
        file.close();
        let file = outer.create_file("/a/b/x").unwrap();
        file.write(b"A-owns-it-too");
        file.close();
        let file = inner.create_file("/a/b/x").unwrap();
        file.write(b"AB");
        file.close();

        assert_eq!(read_file(&vfs, "/a/b/x"), "AB");
        assert_eq!(read_file(&vfs, "/a/x"), "A");
    }

    #[test]
    fn exists_consults_every_backend() {
        let vfs = VirtualFileSystem::new();
        let base = vfs
            .create_file_system("/o/", MemoryFileSystem::new("/o/"))
            .unwrap();
        vfs.create_file_system("/o/", MemoryFileSystem::new("/o/"))
            .unwrap();

        base.create_file("/o/only-in-base").unwrap().close();

        assert!(vfs.is_file_exists("/o/only-in-base"));
        assert!(!vfs.is_file_exists("/o/nowhere"));
        assert!(!vfs.is_file_exists("/other/alias"));
    }

    #[test]
    fn list_all_files_is_sorted_and_deduplicated() {
        let vfs = VirtualFileSystem::new();
        let base = vfs
            .create_file_system("/l/", MemoryFileSystem::new("/l/"))
            .unwrap();
        let patch = vfs
            .create_file_system("/l/", MemoryFileSystem::new("/l/"))
            .unwrap();
        let other = vfs
            .create_file_system("/m/", MemoryFileSystem::new("/m/"))
            .unwrap();

        base.create_file("/l/b.txt").unwrap().close();
        base.create_file("/l/shared.txt").unwrap().close();
        patch.create_file("/l/shared.txt").unwrap().close();
        patch.create_file("/l/a.txt").unwrap().close();
        other.create_file("/m/z.txt").unwrap().close();

        assert_eq!(
            vfs.list_all_files(),
            vec!["/l/a.txt", "/l/b.txt", "/l/shared.txt", "/m/z.txt"]
        );
    }

    #[test]
    fn dropping_the_vfs_shuts_backends_down() {
        let backend;
        {
            let vfs = VirtualFileSystem::new();
            backend = vfs
                .create_file_system("/d/", MemoryFileSystem::new("/d/"))
                .unwrap();
            assert!(backend.is_initialized());
        }
        assert!(!backend.is_initialized());
    }

    #[test]
    fn overlayed_write_reads_back_through_the_overlay() {
        let vfs = VirtualFileSystem::new();
        vfs.create_file_system("/g/", MemoryFileSystem::new("/g/"))
            .unwrap();

        write_file(&vfs, "/g/state.bin", b"0123456789");
        let file = vfs.open_file("/g/state.bin", FileMode::Read.into()).unwrap();
        assert_eq!(file.seek(4, SeekOrigin::Begin), 4);
        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut buf), 4);
        assert_eq!(&buf, b"4567");
    }
}
