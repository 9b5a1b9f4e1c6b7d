use std::io;

/// The result of a virtual filesystem operation.
pub type Result<T> = io::Result<T>;
