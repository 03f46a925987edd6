use crate::core::error::{Error, Result};
use std::fs;
use std::path::PathBuf;

/// Writes attachments into the output directory. Name collisions are
/// resolved by prepending increasing decimal integers (`1name`, `2name`,
/// ...) until a free path is found.
pub struct FileSpool {
    dir: PathBuf,
}

impl FileSpool {
    /// The directory itself is validated (existence, writability) once at
    /// startup by `Config`.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let name = if name.is_empty() { "unknown" } else { name };
        let mut target = self.dir.join(name);
        let mut number = 0u32;
        while target.exists() {
            number += 1;
            target = self.dir.join(format!("{}{}", number, name));
        }
        fs::write(&target, bytes)
            .map_err(|e| Error::Spool(format!("failed to write {}: {}", target.display(), e)))?;
        Ok(target)
    }
}
