//! End-to-end walks through the public API, one per deployment shape the
//! crate is built for.

use std::fs;
use std::io::Write;
use vfs_mux::{
    File, FileMode, FileSystem, MemoryFileSystem, NativeFileSystem, VirtualFileSystem,
    ZipFileSystem,
};

#[test]
fn native_write_then_read() {
    let dir = tempfile::TempDir::new().unwrap();
    let vfs = VirtualFileSystem::new();
    vfs.create_file_system("/", NativeFileSystem::new("/", dir.path()))
        .unwrap();

    const PANGRAM: &[u8] = b"The quick brown fox jumps over the lazy dog\n";

    let file = vfs
        .open_file("/a.txt", FileMode::Write | FileMode::Truncate)
        .unwrap();
    assert_eq!(file.write(PANGRAM), PANGRAM.len());
    file.close();

    let file = vfs.open_file("/a.txt", FileMode::Read.into()).unwrap();
    let mut buf = [0u8; 256];
    assert_eq!(file.read(&mut buf), PANGRAM.len());
    assert_eq!(&buf[..PANGRAM.len()], PANGRAM);
    assert_eq!(file.read(&mut buf), 0);
}

#[test]
fn memory_create_and_copy() {
    let vfs = VirtualFileSystem::new();
    let memory = vfs
        .create_file_system("/m/", MemoryFileSystem::new("/m/"))
        .unwrap();

    let file = vfs.open_file("/m/a", FileMode::read_write()).unwrap();
    file.write(b"hello");
    file.close();

    memory.copy_file("/m/a", "/m/b", false).unwrap();
    let file = vfs.open_file("/m/b", FileMode::Read.into()).unwrap();
    assert_eq!(file.read_to_string().unwrap(), "hello");

    assert!(memory.copy_file("/m/a", "/m/b", false).is_err());
    memory.copy_file("/m/a", "/m/b", true).unwrap();
}

#[test]
fn dlc_overlay_over_native_mounts() {
    let base = tempfile::TempDir::new().unwrap();
    fs::write(base.path().join("file.txt"), b"v1").unwrap();
    fs::write(base.path().join("file1.txt"), b"one").unwrap();

    let dlc = tempfile::TempDir::new().unwrap();
    fs::write(dlc.path().join("file.txt"), b"v2").unwrap();
    fs::write(dlc.path().join("file2.txt"), b"two").unwrap();

    let vfs = VirtualFileSystem::new();
    vfs.create_file_system("/dlc/", NativeFileSystem::new("/dlc/", base.path()))
        .unwrap();
    vfs.create_file_system("/dlc/", NativeFileSystem::new("/dlc/", dlc.path()))
        .unwrap();

    let read = |path: &str| {
        vfs.open_file(path, FileMode::Read.into())
            .unwrap()
            .read_to_string()
            .unwrap()
    };
    assert_eq!(read("/dlc/file.txt"), "v2");
    assert_eq!(read("/dlc/file1.txt"), "one");
    assert_eq!(read("/dlc/file2.txt"), "two");
}

#[test]
fn zip_listing_and_random_access() {
    let dir = tempfile::TempDir::new().unwrap();
    let archive_path = dir.path().join("test.zip");
    let mut writer = zip::ZipWriter::new(fs::File::create(&archive_path).unwrap());
    writer
        .start_file("file.txt", zip::write::FileOptions::default())
        .unwrap();
    writer.write_all(&(0u8..100).collect::<Vec<_>>()).unwrap();
    writer.finish().unwrap();

    let vfs = VirtualFileSystem::new();
    let backend = vfs
        .create_file_system("/zip/", ZipFileSystem::new("/zip/", &archive_path))
        .unwrap();

    assert!(backend
        .files_list()
        .iter()
        .any(|info| info.virtual_path() == "/zip/file.txt"));

    let file = vfs.open_file("/zip/file.txt", FileMode::Read.into()).unwrap();
    assert_eq!(file.seek(50, vfs_mux::SeekOrigin::Begin), 50);
    let mut buf = [0u8; 10];
    assert_eq!(file.read(&mut buf), 10);
    assert_eq!(buf, [50, 51, 52, 53, 54, 55, 56, 57, 58, 59]);
}

#[cfg(unix)]
#[test]
fn read_only_native_mount_rejects_writes() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::TempDir::new().unwrap();
    fs::write(dir.path().join("existing.txt"), b"keep").unwrap();

    let vfs = VirtualFileSystem::new();
    let backend = vfs
        .create_file_system("/", NativeFileSystem::new("/", dir.path()))
        .unwrap();

    fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o555)).unwrap();

    assert!(vfs.open_file("/new.txt", FileMode::Write.into()).is_err());
    assert!(backend.remove_file("/existing.txt").is_err());
    assert_eq!(
        vfs.open_file("/existing.txt", FileMode::Read.into())
            .unwrap()
            .read_to_string()
            .unwrap(),
        "keep"
    );

    fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755)).unwrap();
}

#[test]
fn longest_prefix_resolution() {
    let vfs = VirtualFileSystem::new();
    let outer = vfs
        .create_file_system("/a/", MemoryFileSystem::new("/a/"))
        .unwrap();
    let inner = vfs
        .create_file_system("/a/b/", MemoryFileSystem::new("/a/b/"))
        .unwrap();

    let seed = |fs: &MemoryFileSystem, path: &str, contents: &[u8]| {
        let file = fs.create_file(path).unwrap();
        file.write(contents);
        file.close();
    };
    seed(&outer, "/a/x", b"A");
    seed(&inner, "/a/b/x", b"AB");

    let read = |path: &str| {
        vfs.open_file(path, FileMode::Read.into())
            .unwrap()
            .read_to_string()
            .unwrap()
    };
    assert_eq!(read("/a/b/x"), "AB");
    assert_eq!(read("/a/x"), "A");
}
