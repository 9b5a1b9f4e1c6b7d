use std::io;
use std::io::ErrorKind;

/// Converts backslash separators to forward slashes. Virtual paths are
/// POSIX-style regardless of the host.
pub(crate) fn to_forward_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/// Appends a trailing `/` to a non-empty path that lacks one.
pub(crate) fn with_trailing_slash(mut path: String) -> String {
    if !path.is_empty() && !path.ends_with('/') {
        path.push('/');
    }
    path
}

/// Returns an error indicating that the path already exists.
pub(crate) fn already_exists() -> io::Error {
    io::Error::new(ErrorKind::AlreadyExists, "Already exists")
}

/// Returns an error indicating that the input was invalid.
pub(crate) fn invalid_input(error: &str) -> io::Error {
    io::Error::new(ErrorKind::InvalidInput, error)
}

/// Returns an error indicating that the file was not found.
pub(crate) fn not_found() -> io::Error {
    io::Error::new(ErrorKind::NotFound, "File not found")
}

/// Returns an error indicating that the operation is not supported.
pub(crate) fn not_supported() -> io::Error {
    io::Error::new(ErrorKind::Unsupported, "Not supported")
}

/// Returns an error indicating that the backend rejects writes.
pub(crate) fn permission_denied() -> io::Error {
    io::Error::new(ErrorKind::PermissionDenied, "Filesystem is read-only")
}

/// Returns an error indicating that the backend was not initialized.
pub(crate) fn not_initialized() -> io::Error {
    io::Error::new(ErrorKind::Other, "Filesystem is not initialized")
}

/// Returns an error indicating that a handle could not be opened.
pub(crate) fn open_failed() -> io::Error {
    io::Error::new(ErrorKind::Other, "Could not open file")
}

#[cfg(test)]
mod test {
    use super::{to_forward_slashes, with_trailing_slash};

    #[test]
    fn forward_slashes() {
        assert_eq!(to_forward_slashes("a\\b\\c.txt"), "a/b/c.txt");
        assert_eq!(to_forward_slashes("/already/fine"), "/already/fine");
    }

    #[test]
    fn trailing_slash() {
        assert_eq!(with_trailing_slash("/base".to_owned()), "/base/");
        assert_eq!(with_trailing_slash("/base/".to_owned()), "/base/");
        assert_eq!(with_trailing_slash(String::new()), "");
    }
}
