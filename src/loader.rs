use std::path::{Path, PathBuf};

use atelier_core::model::Model;
use tracing::debug;

use crate::{
    config::ModelSource,
    error::{Error, Result},
};

/// Assemble every model source into one merged model.
///
/// Sources may name `.smithy` or `.json` files directly, or directories the
/// assembler traverses. Relative paths are resolved against `base_dir`
/// (paths in a codegen.toml are relative to the toml file, not to the
/// process working directory).
pub fn sources_to_model(sources: &[ModelSource], base_dir: &Path) -> Result<Model> {
    let mut assembler = atelier_assembler::ModelAssembler::default();
    for path in expand_sources(sources, base_dir)? {
        let _ = assembler.push(&path);
    }
    Model::try_from(assembler).map_err(|e| Error::Model(format!("model assembly failed: {e}")))
}

/// Resolve each source to the concrete paths handed to the assembler.
/// A source with a `files` list contributes one path per entry; otherwise
/// the source path itself (file or directory) is used. Every resolved path
/// must exist.
fn expand_sources(sources: &[ModelSource], base_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for source in sources.iter() {
        // join() discards base_dir when the source path is already absolute
        let root = base_dir.join(&source.path);
        if source.files.is_empty() {
            paths.push(root);
        } else {
            paths.extend(source.files.iter().map(|file| root.join(file)));
        }
    }
    for path in paths.iter() {
        if !path.exists() {
            return Err(Error::MissingFile(format!(
                "model source {} does not exist",
                path.display()
            )));
        }
        debug!("model source: {}", path.display());
    }
    Ok(paths)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn relative_paths_join_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("models")).unwrap();
        let sources = vec![ModelSource::from_file("models")];
        let paths = expand_sources(&sources, dir.path()).unwrap();
        assert_eq!(paths, vec![dir.path().join("models")]);
    }

    #[test]
    fn absolute_paths_ignore_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let absolute = dir.path().join("sample.json");
        std::fs::write(&absolute, "").unwrap();
        let sources = vec![ModelSource::from_file(&absolute)];
        let paths = expand_sources(&sources, Path::new("/somewhere/else")).unwrap();
        assert_eq!(paths, vec![absolute]);
    }

    #[test]
    fn files_narrow_a_directory_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.smithy"), "").unwrap();
        std::fs::write(dir.path().join("b.json"), "").unwrap();
        let sources = vec![ModelSource {
            path: dir.path().to_path_buf(),
            files: vec!["a.smithy".to_string(), "b.json".to_string()],
        }];
        let paths = expand_sources(&sources, Path::new("/ignored")).unwrap();
        assert_eq!(
            paths,
            vec![dir.path().join("a.smithy"), dir.path().join("b.json")]
        );
    }

    #[test]
    fn missing_file_is_reported() {
        let sources = vec![ModelSource::from_file("/definitely/not/here.smithy")];
        let err = sources_to_model(&sources, Path::new("/")).unwrap_err();
        assert!(matches!(err, Error::MissingFile(_)));
    }
}
