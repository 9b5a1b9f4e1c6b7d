use crate::file::{resolve_seek, File, FileMode, SeekOrigin};
use crate::file_info::FileInfo;
use crate::sync::Mutex;
use crate::zip_fs::SharedArchive;
use enumflags2::BitFlags;
use std::io::Read;
use std::sync::Weak;

struct State {
    seek_pos: u64,
    opened: bool,
}

/// A read-only handle over one archive entry.
///
/// The handle keeps no decompressed data. Every read streams the entry
/// through the codec again, skipping the bytes before the cursor and copying
/// the requested window, so opening is cheap and random access works at the
/// cost of re-streaming the prefix. The archive itself is held weakly; once
/// the owning filesystem shuts down the handle reports closed.
pub struct ZipFile {
    info: FileInfo,
    entry_index: usize,
    size: u64,
    archive: Weak<Mutex<zip::ZipArchive<std::fs::File>>>,
    state: Mutex<State>,
}

impl ZipFile {
    pub(crate) fn new(info: FileInfo, entry_index: usize, size: u64, archive: &SharedArchive) -> Self {
        Self {
            info,
            entry_index,
            size,
            archive: std::sync::Arc::downgrade(archive),
            state: Mutex::new(State {
                seek_pos: 0,
                opened: false,
            }),
        }
    }
}

impl File for ZipFile {
    fn file_info(&self) -> FileInfo {
        self.info.clone()
    }

    fn size(&self) -> u64 {
        if self.is_opened() {
            self.size
        } else {
            0
        }
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn open(&self, mode: BitFlags<FileMode>) -> bool {
        if !FileMode::is_valid(mode) || FileMode::is_writable(mode) {
            return false;
        }
        if self.archive.upgrade().is_none() {
            return false;
        }

        let mut state = self.state.lock();
        state.seek_pos = 0;
        state.opened = true;
        true
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.opened = false;
        state.seek_pos = 0;
    }

    fn is_opened(&self) -> bool {
        self.state.lock().opened && self.archive.upgrade().is_some()
    }

    fn seek(&self, offset: u64, origin: SeekOrigin) -> u64 {
        if !self.is_opened() {
            return 0;
        }

        let mut state = self.state.lock();
        state.seek_pos = resolve_seek(state.seek_pos, self.size, offset, origin);
        state.seek_pos
    }

    fn tell(&self) -> u64 {
        let state = self.state.lock();
        if !state.opened {
            return 0;
        }
        state.seek_pos
    }

    fn read(&self, buffer: &mut [u8]) -> usize {
        let mut state = self.state.lock();
        if !state.opened || buffer.is_empty() {
            return 0;
        }
        let Some(archive) = self.archive.upgrade() else {
            return 0;
        };
        if state.seek_pos >= self.size {
            return 0;
        }

        let wanted = (buffer.len() as u64).min(self.size - state.seek_pos) as usize;

        let mut archive = archive.lock();
        let Ok(mut entry) = archive.by_index(self.entry_index) else {
            return 0;
        };

        // the codec only streams forward; consume everything before the
        // cursor into a scratch buffer
        let mut to_skip = state.seek_pos;
        let mut scratch = [0u8; 8 * 1024];
        while to_skip > 0 {
            let chunk = scratch.len().min(to_skip as usize);
            match entry.read(&mut scratch[..chunk]) {
                Ok(0) | Err(_) => return 0,
                Ok(skipped) => to_skip -= skipped as u64,
            }
        }

        let mut copied = 0;
        while copied < wanted {
            match entry.read(&mut buffer[copied..wanted]) {
                Ok(0) | Err(_) => break,
                Ok(read) => copied += read,
            }
        }

        state.seek_pos += copied as u64;
        copied
    }

    fn write(&self, _buffer: &[u8]) -> usize {
        0
    }
}

impl Drop for ZipFile {
    fn drop(&mut self) {
        self.close();
    }
}
