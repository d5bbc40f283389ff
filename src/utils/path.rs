use std::io;
use std::path::{Path, PathBuf};

/// Maps a user-supplied token onto the shell's fixed command namespace.
///
/// Bare names and names starting with `/` land under `root`; a token that
/// already carries an interior separator is used verbatim. Every path this
/// returns is non-empty, so it is safe to hand to open/create.
pub fn resolve(root: &Path, token: &str) -> io::Result<PathBuf> {
    if token.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "empty path token",
        ));
    }

    if token.starts_with('/') {
        let stripped = token.trim_start_matches('/');
        if stripped.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "the root separator alone is not a valid name",
            ));
        }
        return Ok(root.join(stripped));
    }

    if !token.contains('/') {
        return Ok(root.join(token));
    }

    Ok(PathBuf::from(token))
}
