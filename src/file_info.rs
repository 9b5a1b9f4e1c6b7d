use crate::alias::Alias;
use crate::util::{to_forward_slashes, with_trailing_slash};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// The immutable path triple of a file: the mount alias, the backend-local
/// base and the path relative to the mount root.
///
/// Two derived paths matter to callers: `virtual_path` (alias + file path) is
/// what the outside world sees, `native_path` (base + file path) is what a
/// backend hands to the host OS. Equality, ordering and hashing are all on
/// the virtual path.
#[derive(Debug, Clone)]
pub struct FileInfo {
    alias: Alias,
    base_path: String,
    file_path: String,
    virtual_path: String,
    native_path: String,
}

impl FileInfo {
    /// Builds a `FileInfo` from a mount alias, a backend base path (empty for
    /// backends with no on-disk base) and a file name.
    ///
    /// `file_name` may be a backend-local path, a full native path or a full
    /// virtual path; a leading `base_path` or alias prefix is stripped so all
    /// three spellings land on the same triple.
    pub fn new(alias: Alias, base_path: &str, file_name: &str) -> Self {
        let base_path = with_trailing_slash(to_forward_slashes(base_path));
        let mut file_path = to_forward_slashes(file_name);

        if !base_path.is_empty() && file_path.starts_with(&base_path) {
            file_path.drain(..base_path.len());
        } else if file_path.starts_with(alias.as_str()) {
            file_path.drain(..alias.len());
        }
        let file_path = file_path.trim_start_matches('/').to_owned();

        let virtual_path = format!("{}{}", alias.as_str(), file_path);
        let native_path = format!("{}{}", base_path, file_path);

        Self {
            alias,
            base_path,
            file_path,
            virtual_path,
            native_path,
        }
    }

    /// The mount alias this file belongs to.
    pub fn alias(&self) -> &Alias {
        &self.alias
    }

    /// Backend-local base, empty for memory and zip backends.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Path relative to the mount root.
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// The externally visible path, `alias + file_path`.
    pub fn virtual_path(&self) -> &str {
        &self.virtual_path
    }

    /// The backend-local path, `base_path + file_path`.
    pub fn native_path(&self) -> &str {
        &self.native_path
    }

    /// File name with extension, the last path component.
    pub fn name(&self) -> &str {
        self.file_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.file_path)
    }

    /// File name without its extension.
    pub fn base_name(&self) -> &str {
        let name = self.name();
        match name.rfind('.') {
            Some(dot) if dot > 0 => &name[..dot],
            _ => name,
        }
    }

    /// Extension without the leading dot; `None` when there is none.
    pub fn extension(&self) -> Option<&str> {
        let name = self.name();
        match name.rfind('.') {
            Some(dot) if dot > 0 => Some(&name[dot + 1..]),
            _ => None,
        }
    }
}

impl PartialEq for FileInfo {
    fn eq(&self, other: &Self) -> bool {
        self.virtual_path == other.virtual_path
    }
}

impl Eq for FileInfo {}

impl PartialOrd for FileInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FileInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.virtual_path.cmp(&other.virtual_path)
    }
}

impl Hash for FileInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.virtual_path.hash(state);
    }
}

impl fmt::Display for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.virtual_path)
    }
}
