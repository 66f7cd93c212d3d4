//! Content fingerprinting using BLAKE3.
//!
//! Files are streamed through the hasher in fixed-size reads, so memory use is
//! bounded by the buffer regardless of file size.

use crate::{BackupError, Result};
use blake3::Hasher;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Default read buffer for fingerprinting (16KB)
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Compute the lowercase hex BLAKE3 digest of a file's content.
///
/// # Errors
/// * `UnreadableFile` - if the file cannot be opened or a read fails
pub fn fingerprint_file(path: &Path, buffer_size: usize) -> Result<String> {
    let unreadable = |source| BackupError::UnreadableFile {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(unreadable)?;
    let mut hasher = Hasher::new();
    let mut buffer = vec![0u8; buffer_size.max(1)];

    loop {
        let bytes_read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(unreadable(e)),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Digest of an in-memory buffer, matching [`fingerprint_file`] for the same bytes.
pub fn fingerprint_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
