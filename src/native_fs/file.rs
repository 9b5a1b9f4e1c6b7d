use crate::file::{resolve_seek, File, FileMode, SeekOrigin};
use crate::file_info::FileInfo;
use crate::sync::Mutex;
use enumflags2::BitFlags;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};

struct State {
    stream: Option<fs::File>,
    mode: BitFlags<FileMode>,
}

/// A handle over a real file on disk, addressed through its native path.
/// All I/O goes through the stream; nothing is buffered in the handle.
pub struct NativeFile {
    info: FileInfo,
    state: Mutex<State>,
}

impl NativeFile {
    pub(crate) fn new(info: FileInfo) -> Self {
        Self {
            info,
            state: Mutex::new(State {
                stream: None,
                mode: FileMode::Read.into(),
            }),
        }
    }

    fn disk_size(&self) -> u64 {
        fs::metadata(self.info.native_path())
            .map(|meta| meta.len())
            .unwrap_or(0)
    }
}

/// Maps the mode bitset onto OS open flags, mirroring the stdio table:
/// `rb`, `r+b`, `wb`, `ab`, `w+b` and `a+b`. Only the truncating and
/// appending variants may create the file.
fn open_options(mode: BitFlags<FileMode>) -> fs::OpenOptions {
    let mut options = fs::OpenOptions::new();
    let read = mode.contains(FileMode::Read);

    if mode.contains(FileMode::Append) {
        options.append(true).create(true);
        if read {
            options.read(true);
        }
    } else if mode.contains(FileMode::Truncate) {
        options.write(true).truncate(true).create(true);
        if read {
            options.read(true);
        }
    } else if mode.contains(FileMode::Write) {
        options.read(true).write(true);
    } else {
        options.read(true);
    }

    options
}

impl File for NativeFile {
    fn file_info(&self) -> FileInfo {
        self.info.clone()
    }

    fn size(&self) -> u64 {
        let state = self.state.lock();
        if state.stream.is_none() {
            return 0;
        }
        // the filesystem, not the stream, answers size queries
        self.disk_size()
    }

    fn is_read_only(&self) -> bool {
        !self.state.lock().mode.contains(FileMode::Write)
    }

    fn open(&self, mode: BitFlags<FileMode>) -> bool {
        if !FileMode::is_valid(mode) {
            return false;
        }

        let mut state = self.state.lock();
        let state = &mut *state;
        if let Some(stream) = state.stream.as_mut() {
            if state.mode == mode {
                return stream.seek(SeekFrom::Start(0)).is_ok();
            }
        }

        let Ok(mut stream) = open_options(mode).open(self.info.native_path()) else {
            return false;
        };

        if mode.contains(FileMode::Append) && stream.seek(SeekFrom::End(0)).is_err() {
            return false;
        }

        state.stream = Some(stream);
        state.mode = mode;
        true
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.stream = None;
        state.mode = FileMode::Read.into();
    }

    fn is_opened(&self) -> bool {
        self.state.lock().stream.is_some()
    }

    fn seek(&self, offset: u64, origin: SeekOrigin) -> u64 {
        let mut state = self.state.lock();
        let Some(stream) = state.stream.as_mut() else {
            return 0;
        };

        let position = stream.stream_position().unwrap_or(0);
        let target = resolve_seek(position, self.disk_size(), offset, origin);
        match stream.seek(SeekFrom::Start(target)) {
            Ok(new_position) => new_position,
            Err(_) => 0,
        }
    }

    fn tell(&self) -> u64 {
        let mut state = self.state.lock();
        let Some(stream) = state.stream.as_mut() else {
            return 0;
        };
        stream.stream_position().unwrap_or(0)
    }

    fn read(&self, buffer: &mut [u8]) -> usize {
        let mut state = self.state.lock();
        if !state.mode.contains(FileMode::Read) {
            return 0;
        }
        let Some(stream) = state.stream.as_mut() else {
            return 0;
        };

        let mut filled = 0;
        while filled < buffer.len() {
            match stream.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(read) => filled += read,
                Err(_) => break,
            }
        }
        filled
    }

    fn write(&self, buffer: &[u8]) -> usize {
        let mut state = self.state.lock();
        if !state.mode.contains(FileMode::Write) {
            return 0;
        }
        let Some(stream) = state.stream.as_mut() else {
            return 0;
        };

        let mut written = 0;
        while written < buffer.len() {
            match stream.write(&buffer[written..]) {
                Ok(0) | Err(_) => break,
                Ok(wrote) => written += wrote,
            }
        }
        written
    }
}

impl Drop for NativeFile {
    fn drop(&mut self) {
        self.close();
    }
}
