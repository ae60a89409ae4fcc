use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use docquery::analysis::truncate_content;
use docquery::extraction::{self, ArtifactRef, ExtractionStatus, Payload};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "docquery-cli",
    about = "Inspect how DocQuery classifies and extracts files"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the document kind for each file name.
    Classify {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Extract a file, or every file beneath a directory, and print the payloads.
    Extract {
        path: PathBuf,
        /// Truncate each printed payload the way multi-file analysis does.
        #[arg(long)]
        max_chars: Option<usize>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Classify { names } => {
            for name in names {
                writeln!(out, "{name}\t{}", extraction::classify(&name))?;
            }
        }
        Command::Extract { path, max_chars } => {
            let files = collect_files(&path)?;
            if files.is_empty() {
                bail!("no files found under {}", path.display());
            }
            for file in files {
                print_extraction(&mut out, &file, max_chars)?;
            }
        }
    }
    Ok(())
}

fn collect_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("{} does not exist", path.display());
    }
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    Ok(files)
}

fn print_extraction(out: &mut impl Write, file: &Path, max_chars: Option<usize>) -> Result<()> {
    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let artifact = ArtifactRef::from_key(file.to_string_lossy().replace('\\', "/"))
        .with_size(bytes.len() as u64);
    let result = extraction::extract(&artifact, &bytes);

    writeln!(
        out,
        "== {} ({}, {} bytes) ==",
        artifact.display_name,
        result.kind,
        bytes.len()
    )?;
    match result.status {
        ExtractionStatus::Ok(Payload::Text(text)) => {
            let shown = match max_chars {
                Some(limit) => truncate_content(&text, limit),
                None => text.as_str().into(),
            };
            writeln!(out, "{shown}")?;
        }
        ExtractionStatus::Ok(Payload::Image { base64, mime_type }) => {
            writeln!(out, "[{mime_type} image, {} base64 characters]", base64.len())?;
        }
        ExtractionStatus::Failed(reason) => {
            writeln!(out, "extraction failed: {reason}")?;
        }
    }
    writeln!(out)?;
    Ok(())
}
