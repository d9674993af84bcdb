//! Command line front end for harbor-codegen.

use std::{
    path::PathBuf,
    process::exit,
    str::FromStr,
};

use clap::{Parser, Subcommand};
use harbor_codegen::{
    config::{CodegenConfig, GenSettings, ModelSource},
    sources_to_model, Error, Generator,
};

#[derive(Parser)]
#[command(name = "gen")]
#[command(about = "Generate a Harbor Ruby client SDK from a Smithy model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a client gem for one service
    Generate {
        /// Model file or directory; may be repeated
        #[arg(short, long)]
        model: Vec<PathBuf>,

        /// Shape id of the service to generate, e.g. example.sample#SampleService
        #[arg(short, long)]
        service: Option<String>,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        /// Root Ruby module name; defaults to the service shape name
        #[arg(long)]
        module: Option<String>,

        /// Gem name; defaults to the snake_cased module name
        #[arg(long)]
        gem: Option<String>,

        /// Optional codegen.toml providing models and settings
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

// 0 success; 2 model/validation error; 3 unsupported protocol; 4 I/O error
fn exit_code(e: &Error) -> i32 {
    match e {
        Error::UnsupportedProtocol(_) => 3,
        Error::Io(_) | Error::MissingFile(_) => 4,
        _ => 2,
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Commands::Generate {
        model,
        service,
        out,
        module,
        gem,
        config,
    } = cli.command;

    if let Err(e) = run(model, service, out, module, gem, config) {
        eprintln!("Error: {}", e);
        exit(exit_code(&e));
    }
}

fn run(
    model_paths: Vec<PathBuf>,
    service: Option<String>,
    out: PathBuf,
    module: Option<String>,
    gem: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<(), Error> {
    let mut sources: Vec<ModelSource> = Vec::new();
    let mut file_settings: Option<GenSettings> = None;
    let mut base_dir = std::env::current_dir().map_err(|e| Error::Io(e.to_string()))?;

    if let Some(path) = config_path {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Io(format!("reading {}: {}", path.display(), e)))?;
        let config = CodegenConfig::from_str(&content)?;
        if let Some(parent) = path.parent() {
            if parent.as_os_str().is_empty() {
                // keep the current directory
            } else {
                base_dir = parent
                    .canonicalize()
                    .map_err(|e| Error::Io(format!("resolving {}: {}", parent.display(), e)))?;
            }
        }
        sources.extend(config.models);
        file_settings = config.settings;
    }
    sources.extend(model_paths.into_iter().map(ModelSource::from_file));
    if sources.is_empty() {
        return Err(Error::MissingFile(
            "no model sources given; use --model or --config".to_string(),
        ));
    }

    let service = service
        .or_else(|| file_settings.as_ref().map(|s| s.service.clone()))
        .ok_or_else(|| Error::ModelIntegrity("no service shape id given; use --service".to_string()))?;
    let service_name = service
        .split('#')
        .nth(1)
        .ok_or_else(|| Error::ModelIntegrity(format!("invalid service shape id: {}", service)))?
        .to_string();

    let module = module
        .or_else(|| file_settings.as_ref().map(|s| s.module.clone()))
        .unwrap_or_else(|| inflector::cases::pascalcase::to_pascal_case(&service_name));
    let gem = gem
        .or_else(|| file_settings.as_ref().map(|s| s.gem.clone()))
        .unwrap_or_else(|| inflector::cases::snakecase::to_snake_case(&module));

    let mut settings = GenSettings::new(&service, &gem, &module);
    if let Some(file_settings) = file_settings {
        settings.gem_version = file_settings.gem_version;
    }

    let model = sources_to_model(&sources, &base_dir)?;
    let generator = Generator::new();
    let manifest = generator.generate(&model, &settings)?;
    manifest.flush(&out)?;
    println!("Generated {} files under {}", manifest.len(), out.display());
    Ok(())
}
