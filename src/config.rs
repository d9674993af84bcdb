use std::{fmt, path::PathBuf, str::FromStr};

use atelier_core::model::ShapeID;
use serde::{Deserialize, Serialize};

use crate::{error::Error, Result};

/// Settings for one generation run. Exactly one service is generated per
/// run; the service shape id selects it from the assembled model.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GenSettings {
    /// absolute shape id of the service, e.g. "example.sample#SampleService"
    pub service: String,

    /// name of the generated gem, e.g. "sample_service"
    pub gem: String,

    /// root Ruby module of the generated gem, e.g. "SampleService"
    pub module: String,

    /// version string written into the gemspec
    #[serde(default = "default_gem_version")]
    pub gem_version: String,
}

fn default_gem_version() -> String {
    "1.0.0".to_string()
}

impl GenSettings {
    pub fn new(service: &str, gem: &str, module: &str) -> Self {
        Self {
            service: service.to_string(),
            gem: gem.to_string(),
            module: module.to_string(),
            gem_version: default_gem_version(),
        }
    }

    pub fn service_id(&self) -> Result<ShapeID> {
        ShapeID::from_str(&self.service)
            .map_err(|e| Error::ModelIntegrity(format!("invalid service shape id {}: {}", self.service, e)))
    }
}

/// Contents of a codegen.toml file.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CodegenConfig {
    /// model inputs
    #[serde(default)]
    pub models: Vec<ModelSource>,

    /// generation settings; the cli can override individual fields
    #[serde(default)]
    pub settings: Option<GenSettings>,

    /// The directory containing the codegen.toml file, used for evaluating
    /// all relative paths in the file. Set by the file reader, not inside
    /// the toml file. Always an absolute path.
    #[serde(default)]
    pub base_dir: PathBuf,
}

impl FromStr for CodegenConfig {
    type Err = Error;

    fn from_str(content: &str) -> std::result::Result<CodegenConfig, Self::Err> {
        toml::from_str(content).map_err(|e| Error::Other(format!("invalid codegen.toml: {e}")))
    }
}

/// Source directory or file for finding model files. The `path` may be a
/// model file or a directory searched recursively for `.json` or `.smithy`
/// files; `files` optionally narrows a directory to specific entries.
#[derive(Debug, Deserialize, Serialize)]
pub struct ModelSource {
    pub path: PathBuf,
    #[serde(default)]
    pub files: Vec<String>,
}

impl ModelSource {
    /// convenience constructor for a single file path
    pub fn from_file<P: Into<PathBuf>>(path: P) -> ModelSource {
        ModelSource {
            path: path.into(),
            files: Vec::default(),
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "path({})", self.path.display())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_codegen_toml() {
        let toml = r#"
            [[models]]
            path = "models/sample.json"

            [settings]
            service = "example.sample#SampleService"
            gem = "sample_service"
            module = "SampleService"
        "#;
        let config = CodegenConfig::from_str(toml).unwrap();
        assert_eq!(config.models.len(), 1);
        let settings = config.settings.unwrap();
        assert_eq!(settings.gem, "sample_service");
        assert_eq!(settings.gem_version, "1.0.0");
        assert!(settings.service_id().is_ok());
    }
}
