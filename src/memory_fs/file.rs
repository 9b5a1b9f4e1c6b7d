use crate::file::{resolve_seek, File, FileMode, SeekOrigin};
use crate::file_info::FileInfo;
use crate::memory_fs::object::MemoryObject;
use crate::sync::Mutex;
use enumflags2::BitFlags;
use std::sync::Arc;

struct State {
    mode: BitFlags<FileMode>,
    seek_pos: u64,
    opened: bool,
}

/// A handle to one in-memory file. Handles to the same virtual path share a
/// [`MemoryObject`]; its copy-on-write snapshots keep concurrent readers and
/// writers isolated.
pub struct MemoryFile {
    info: FileInfo,
    object: Arc<MemoryObject>,
    state: Mutex<State>,
}

impl MemoryFile {
    pub(crate) fn new(info: FileInfo, object: Arc<MemoryObject>) -> Self {
        Self {
            info,
            object,
            state: Mutex::new(State {
                mode: FileMode::Read.into(),
                seek_pos: 0,
                opened: false,
            }),
        }
    }
}

impl File for MemoryFile {
    fn file_info(&self) -> FileInfo {
        self.info.clone()
    }

    fn size(&self) -> u64 {
        let state = self.state.lock();
        if !state.opened {
            return 0;
        }
        self.object.len()
    }

    fn is_read_only(&self) -> bool {
        !self.state.lock().mode.contains(FileMode::Write)
    }

    fn open(&self, mode: BitFlags<FileMode>) -> bool {
        if !FileMode::is_valid(mode) {
            return false;
        }

        let mut state = self.state.lock();
        if state.opened && state.mode == mode {
            state.seek_pos = 0;
            return true;
        }

        state.mode = mode;
        state.seek_pos = 0;

        if mode.contains(FileMode::Truncate) {
            self.object.reset();
        }
        if mode.contains(FileMode::Append) {
            state.seek_pos = self.object.len();
        }

        state.opened = true;
        true
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.opened = false;
        state.seek_pos = 0;
        state.mode = FileMode::Read.into();
    }

    fn is_opened(&self) -> bool {
        self.state.lock().opened
    }

    fn seek(&self, offset: u64, origin: SeekOrigin) -> u64 {
        let mut state = self.state.lock();
        if !state.opened {
            return 0;
        }

        state.seek_pos = resolve_seek(state.seek_pos, self.object.len(), offset, origin);
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
        if !state.opened || !state.mode.contains(FileMode::Read) || buffer.is_empty() {
            return 0;
        }

        let data = self.object.snapshot();
        let available = data.len() as u64;
        if state.seek_pos >= available {
            return 0;
        }

        let start = state.seek_pos as usize;
        let count = buffer.len().min((available - state.seek_pos) as usize);
        buffer[..count].copy_from_slice(&data[start..start + count]);
        state.seek_pos += count as u64;
        count
    }

    fn write(&self, buffer: &[u8]) -> usize {
        let mut state = self.state.lock();
        if !state.opened || !state.mode.contains(FileMode::Write) || buffer.is_empty() {
            return 0;
        }

        let start = state.seek_pos as usize;
        let end = start + buffer.len();
        self.object.with_writable(|data| {
            if end > data.len() {
                data.resize(end, 0);
            }
            data[start..end].copy_from_slice(buffer);
        });

        state.seek_pos = end as u64;
        buffer.len()
    }
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        self.close();
    }
}
