use crate::file_info::FileInfo;
use enumflags2::{bitflags, BitFlags};

/// The file open mode. Combine flags with `|`; see [`FileMode::is_valid`] for
/// the combinations a backend will accept.
#[bitflags]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum FileMode {
    Read,
    Write,
    /// Position the cursor at the end on open. Requires `Write`.
    Append,
    /// Reset the backing storage to zero length on open. Requires `Write`.
    Truncate,
}

impl FileMode {
    /// Combined read + write access.
    pub fn read_write() -> BitFlags<FileMode> {
        FileMode::Read | FileMode::Write
    }

    /// A mode is valid when it grants at least one of read/write access and
    /// `Append`/`Truncate` only appear together with `Write`.
    pub fn is_valid(mode: BitFlags<FileMode>) -> bool {
        if !mode.intersects(FileMode::Read | FileMode::Write) {
            return false;
        }
        if mode.intersects(FileMode::Append | FileMode::Truncate)
            && !mode.contains(FileMode::Write)
        {
            return false;
        }
        true
    }

    /// Returns true if the mode carries any write intent.
    pub fn is_writable(mode: BitFlags<FileMode>) -> bool {
        mode.intersects(FileMode::Write | FileMode::Append | FileMode::Truncate)
    }
}

/// Reference point for [`File::seek`]. Offsets are unsigned; seeking backward
/// is expressed from `Begin` or `End`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SeekOrigin {
    /// Absolute offset from the start of the file.
    Begin,
    /// `size - offset`, saturating at the start of the file.
    End,
    /// `position + offset`.
    Current,
}

/// Resolves a seek request against the current position and size, clamping
/// the result to `[0, size]`.
pub(crate) fn resolve_seek(pos: u64, size: u64, offset: u64, origin: SeekOrigin) -> u64 {
    let target = match origin {
        SeekOrigin::Begin => offset,
        SeekOrigin::End => size.saturating_sub(offset),
        SeekOrigin::Current => pos.saturating_add(offset),
    };
    target.min(size)
}

/// A handle to one file in some backend.
///
/// Handles are shared as [`crate::FilePtr`] and internally locked, so every
/// method takes `&self`. The error model is deliberately quiet: `open`
/// answers with `bool`, reads and writes answer with the byte count actually
/// transferred and report failure, closure or EOF as `0`.
pub trait File {
    /// Get file information.
    fn file_info(&self) -> FileInfo;

    /// Returns the file size, or 0 when the handle is closed.
    fn size(&self) -> u64;

    /// Returns true when the handle cannot be written through.
    fn is_read_only(&self) -> bool;

    /// Opens the handle for reading/writing. Returns false on an invalid
    /// mode or when the backend refuses the request.
    fn open(&self, mode: BitFlags<FileMode>) -> bool;

    /// Closes the handle. Idempotent; subsequent reads and writes return 0.
    fn close(&self);

    /// Returns true while the handle is ready for I/O.
    fn is_opened(&self) -> bool;

    /// Moves the cursor and returns the new position, clamped to
    /// `[0, size]`. Returns 0 when the handle is closed.
    fn seek(&self, offset: u64, origin: SeekOrigin) -> u64;

    /// Returns the current cursor position, or 0 when closed.
    fn tell(&self) -> u64;

    /// Reads into `buffer`, returning the number of bytes read. Returns 0
    /// when the handle is closed, not readable or at EOF.
    fn read(&self, buffer: &mut [u8]) -> usize;

    /// Writes `buffer`, returning the number of bytes written. Returns 0
    /// when the handle is closed or not writable.
    fn write(&self, buffer: &[u8]) -> usize;

    /// Reads the rest of the file from the current position into a vector.
    fn read_to_vec(&self) -> Vec<u8> {
        let remaining = self.size().saturating_sub(self.tell()) as usize;
        let mut out = vec![0u8; remaining];
        let mut filled = 0;
        while filled < out.len() {
            let read = self.read(&mut out[filled..]);
            if read == 0 {
                break;
            }
            filled += read;
        }
        out.truncate(filled);
        out
    }

    /// Reads the rest of the file as UTF-8 text.
    fn read_to_string(&self) -> Option<String> {
        String::from_utf8(self.read_to_vec()).ok()
    }
}
