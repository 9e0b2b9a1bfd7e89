//! podshift - translate Docker Compose manifests for Podman
//!
//! Command line front end for the translation engine.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use podshift::rules::RuleEngine;
use podshift::{Format, SelinuxLabel, TranslateOptions, Translation, Translator};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// podshift - Docker Compose to Podman translator
#[derive(Parser)]
#[command(name = "podshift")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "Translate Docker Compose manifests into Podman artifacts", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a compose file
    Translate {
        /// Compose file, or - for stdin
        #[arg(default_value = "-")]
        file: PathBuf,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::PodmanCompose)]
        format: Format,
        /// Project name
        #[arg(short, long)]
        project: Option<String>,
        /// SELinux label added to bind mounts
        #[arg(long, value_enum, default_value_t = SelinuxLabel::Shared)]
        selinux: SelinuxLabel,
        /// Write each generated file into this directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the rewrite rules in the order they are applied
    Rules,

    /// Parse a compose file and report what it declares
    Validate {
        /// Compose file, or - for stdin
        #[arg(default_value = "-")]
        file: PathBuf,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Translate {
            file,
            format,
            project,
            selinux,
            output_dir,
            json,
        } => {
            let input = read_input(&file)?;
            let mut options = TranslateOptions::default().selinux_label(selinux);
            if let Some(project) = &project {
                options = options.project_name(project);
            }

            let translation: Translation = Translator::new(options)
                .translate_to(&input, format)
                .unwrap_or_else(Translation::from);

            if json {
                println!("{}", serde_json::to_string_pretty(&translation)?);
            } else {
                for warning in &translation.warnings {
                    eprintln!("warning: {}", warning);
                }
                for error in &translation.errors {
                    eprintln!("error: {}", error);
                }
                match (&translation.output, &output_dir) {
                    (Some(_), Some(dir)) => write_files(dir, &translation)?,
                    (Some(output), None) => print!("{}", output),
                    (None, _) => {}
                }
            }

            Ok(if translation.errors.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Commands::Rules => {
            for rule in RuleEngine::with_builtins().iter() {
                println!("{:<16} {}", rule.id(), rule.description());
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Validate { file } => {
            let input = read_input(&file)?;
            let validation = Translator::default().validate(&input);
            println!("{}", serde_json::to_string_pretty(&validation)?);
            Ok(if validation.valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn read_input(file: &Path) -> Result<String> {
    if file == Path::new("-") {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read compose file from stdin")?;
        Ok(input)
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))
    }
}

fn write_files(dir: &Path, translation: &Translation) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    for file in &translation.files {
        let path = dir.join(&file.file_name);
        std::fs::write(&path, &file.contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{}", path.display());
    }
    Ok(())
}
