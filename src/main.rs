use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use walkdir::WalkDir;

use tracking_swc_plugin::{BuildSession, TrackingOptions, TransformResult};

#[derive(Parser)]
#[command(name = "tracking-transform")]
#[command(about = "Instrument data-track-show / data-track-click markers in JSX sources")]
#[command(version)]
struct Cli {
    /// Source files or directories (.tsx/.jsx, node_modules skipped)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Write rewritten sources here, mirroring the input layout (default: stdout)
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// JSON options file, same shape as the plugin config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for manifests and the summary
    #[arg(long)]
    tracking_dir: Option<PathBuf>,

    /// Source of the injected runtime import
    #[arg(long)]
    runtime_url: Option<String>,

    /// Skip manifest and summary files
    #[arg(long)]
    no_manifests: bool,

    /// Also copy rewritten sources into <tracking-dir>/transformed/
    #[arg(long)]
    output_transformed_files: bool,
}

impl Cli {
    fn options(&self) -> Result<TrackingOptions> {
        let mut options = match &self.config {
            Some(path) => TrackingOptions::from_file(path)?,
            None => TrackingOptions::default(),
        };
        if let Some(dir) = &self.tracking_dir {
            options.tracking_dir = dir.clone();
        }
        if let Some(url) = &self.runtime_url {
            options.runtime_url = url.clone();
        }
        if self.no_manifests {
            options.emit_manifests = false;
        }
        if self.output_transformed_files {
            options.output_transformed_files = true;
        }
        Ok(options)
    }
}

fn is_source(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("tsx") | Some("jsx")
    )
}

/// Every source under `input` paired with its path relative to `input`.
fn collect_sources(input: &Path) -> Vec<(PathBuf, PathBuf)> {
    if input.is_file() {
        let name = input.file_name().map(PathBuf::from).unwrap_or_default();
        return vec![(input.to_path_buf(), name)];
    }
    WalkDir::new(input)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.file_name() != "node_modules")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_source(e.path()))
        .map(|e| {
            let rel = e.path().strip_prefix(input).unwrap_or(e.path()).to_path_buf();
            (e.into_path(), rel)
        })
        .collect()
}

fn process(session: &BuildSession, path: &Path, rel: &Path, out_dir: Option<&Path>) -> Result<TransformResult> {
    let source = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let result = session.transform_source(&source, &path.to_string_lossy());
    let Some(out_dir) = out_dir else {
        return Ok(result);
    };
    let target = out_dir.join(rel);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(&target, &result.code).with_context(|| format!("writing {}", target.display()))?;
    Ok(result)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let session = BuildSession::new(cli.options()?);

    let mut sources: Vec<(PathBuf, PathBuf)> = cli.inputs.iter().flat_map(|i| collect_sources(i)).collect();
    sources.sort();
    sources.dedup();
    log::info!("transforming {} file(s)", sources.len());

    let results = sources
        .par_iter()
        .map(|(path, rel)| process(&session, path, rel, cli.out_dir.as_deref()))
        .collect::<Result<Vec<_>>>()?;

    if cli.out_dir.is_none() {
        let mut stdout = io::stdout().lock();
        for ((path, _), result) in sources.iter().zip(&results) {
            if sources.len() > 1 {
                writeln!(stdout, "// {}", path.display())?;
            }
            write!(stdout, "{}", result.code)?;
        }
    }

    let instrumented = results.iter().filter(|r| r.instrumented).count();
    let points: usize = results.iter().map(|r| r.tracking_points.len()).sum();
    let diagnostics: usize = results.iter().map(|r| r.diagnostics.len()).sum();
    eprintln!(
        "{} file(s) scanned, {} instrumented, {} tracking point(s), {} diagnostic(s)",
        results.len(),
        instrumented,
        points,
        diagnostics
    );
    Ok(())
}
