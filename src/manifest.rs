//! Write-only sink for generated files.
//!
//! Paths are relative to the output root and normalized before insertion.
//! Writing identical content to the same path twice is a no-op; writing
//! different content to the same path is an error.

use std::{
    collections::BTreeMap,
    path::{Component, Path, PathBuf},
};

use bytes::Bytes;

use crate::{Error, Result};

#[derive(Default, Debug)]
pub struct FileManifest {
    files: BTreeMap<PathBuf, Bytes>,
}

impl FileManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `content` for the normalized relative `path`.
    pub fn write_file(&mut self, path: impl AsRef<Path>, content: impl Into<Bytes>) -> Result<()> {
        let path = normalize(path.as_ref())?;
        let content = content.into();
        if let Some(existing) = self.files.get(&path) {
            if existing == &content {
                return Ok(());
            }
            return Err(Error::ManifestConflict(path.display().to_string()));
        }
        self.files.insert(path, content);
        Ok(())
    }

    /// Returns the recorded content for `path`, if any.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<&Bytes> {
        normalize(path.as_ref()).ok().and_then(|p| self.files.get(&p))
    }

    /// Iterate entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &Bytes)> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write every entry under `out_dir`, creating directories as needed.
    pub fn flush(&self, out_dir: &Path) -> Result<()> {
        for (path, content) in self.files.iter() {
            let full = out_dir.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Io(format!("creating directory {}: {}", parent.display(), e))
                })?;
            }
            std::fs::write(&full, content)
                .map_err(|e| Error::Io(format!("writing {}: {}", full.display(), e)))?;
        }
        Ok(())
    }
}

fn normalize(path: &Path) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => {
                return Err(Error::Io(format!(
                    "manifest paths must be relative: {}",
                    path.display()
                )))
            }
        }
    }
    if out.as_os_str().is_empty() {
        return Err(Error::Io("manifest path is empty".to_string()));
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn identical_rewrite_is_tolerated() {
        let mut manifest = FileManifest::new();
        manifest.write_file("gem/lib/gem.rb", "module Gem\nend\n").unwrap();
        manifest.write_file("./gem/lib/gem.rb", "module Gem\nend\n").unwrap();
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn conflicting_rewrite_fails() {
        let mut manifest = FileManifest::new();
        manifest.write_file("gem/lib/gem.rb", "a").unwrap();
        let err = manifest.write_file("gem/lib/gem.rb", "b").unwrap_err();
        assert!(matches!(err, Error::ManifestConflict(_)));
    }

    #[test]
    fn absolute_paths_are_rejected() {
        let mut manifest = FileManifest::new();
        let err = manifest.write_file("/etc/passwd", "nope").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn entries_iterate_in_path_order() {
        let mut manifest = FileManifest::new();
        manifest.write_file("b.rb", "b").unwrap();
        manifest.write_file("a.rb", "a").unwrap();
        let paths: Vec<_> = manifest.iter().map(|(p, _)| p.display().to_string()).collect();
        assert_eq!(paths, vec!["a.rb", "b.rb"]);
    }
}
