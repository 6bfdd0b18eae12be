//! Directory-backed clip store
//!
//! Asset id `Hello.clip` maps to `<root>/Hello.clip`. Only existence and size
//! are checked here; decoding belongs to whatever surface renders the clip.

use log::trace;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::core::asset_cache::{AssetLoader, ClipHandle, LoadError};
use crate::core::resolver::AssetId;

#[derive(Debug, Clone)]
pub struct ClipStore {
    root: PathBuf,
}

impl ClipStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, id: &AssetId) -> PathBuf {
        self.root.join(id.as_str())
    }
}

impl AssetLoader for ClipStore {
    fn fetch(&self, id: &AssetId) -> Result<ClipHandle, LoadError> {
        let path = self.path_of(id);
        let meta = match std::fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(LoadError::Missing(id.clone())),
            Err(e) => return Err(LoadError::Io(format!("{}: {}", path.display(), e))),
        };
        if !meta.is_file() {
            return Err(LoadError::Missing(id.clone()));
        }
        trace!("Fetched {} ({} bytes)", path.display(), meta.len());
        Ok(ClipHandle {
            location: path,
            bytes: meta.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolver::resolve_char;
    use uuid::Uuid;

    #[test]
    fn test_fetch_existing_and_missing() {
        let dir = std::env::temp_dir().join(format!("signplay-store-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("A.clip"), b"clip").unwrap();

        let store = ClipStore::new(&dir);
        assert_eq!(store.root(), dir.as_path());
        let a = resolve_char('a').unwrap();
        let handle = store.fetch(&a).unwrap();
        assert_eq!(handle.bytes, 4);
        assert_eq!(handle.location, dir.join("A.clip"));

        let b = resolve_char('b').unwrap();
        assert_eq!(store.fetch(&b), Err(LoadError::Missing(b.clone())));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_directory_is_not_a_clip() {
        let dir = std::env::temp_dir().join(format!("signplay-store-{}", Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("Z.clip")).unwrap();

        let store = ClipStore::new(&dir);
        let z = resolve_char('z').unwrap();
        assert!(matches!(store.fetch(&z), Err(LoadError::Missing(_))));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
