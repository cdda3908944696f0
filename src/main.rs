mod cli;
mod config;
mod resolver;

use std::io::Write;
use std::path::Path;

use anyhow::{Context as _, Result};
use clap::Parser;
use regex::Regex;
use tracing::warn;

use kubehop_store::{KubeconfigStore, expand_path, sanitize_filename};
use kubehop_types::{Config, Error};

use crate::cli::{Cli, Command};
use crate::resolver::Resolution;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    let level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(args).await {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

async fn run(args: Cli) -> Result<()> {
    let config_path = args
        .config_path
        .clone()
        .or_else(config::default_config_path)
        .context("cannot locate the configuration file (no home directory)")?;
    let state_dir = args
        .state_directory
        .clone()
        .or_else(config::default_state_dir)
        .context("cannot locate the state directory (no home directory)")?;

    match &args.command {
        Command::List { pattern, verbose } => {
            let matcher = pattern.as_deref().map(compile_pattern).transpose()?;
            let resolution = load_and_resolve(&args, &config_path, &state_dir).await?;
            list(&resolution, matcher.as_ref(), *verbose)
        }
        Command::Get { context } => {
            let resolution = load_and_resolve(&args, &config_path, &state_dir).await?;
            get(&resolution, context).await
        }
        Command::Clean => clean(&config_path, &state_dir),
    }
}

async fn load_and_resolve(
    args: &Cli,
    config_path: &Path,
    state_dir: &Path,
) -> Result<Resolution> {
    let mut config = config::load_config(config_path)?;
    let kubeconfig_env = std::env::var("KUBECONFIG").ok();
    config::merge_kubeconfig_sources(
        &mut config,
        args.kubeconfig_path.as_deref(),
        kubeconfig_env.as_deref(),
    )?;
    let resolution = resolver::resolve_contexts(&config, state_dir, args.no_index).await?;
    Ok(resolution)
}

fn list(resolution: &Resolution, matcher: Option<&Regex>, verbose: bool) -> Result<()> {
    for (name, resolved) in &resolution.contexts {
        if matcher.is_some_and(|m| !m.is_match(name)) {
            continue;
        }
        if verbose {
            println!("{name}\t{}", resolved.store_id);
        } else {
            println!("{name}");
        }
    }
    Ok(())
}

async fn get(resolution: &Resolution, context: &str) -> Result<()> {
    let kubeconfig = fetch_kubeconfig(resolution, context).await?;
    std::io::stdout().write_all(&kubeconfig)?;
    Ok(())
}

/// Look a context up and fetch its kubeconfig through the owning store.
/// Fetch failures name the store so the user knows which backend to poke.
async fn fetch_kubeconfig(resolution: &Resolution, context: &str) -> Result<Vec<u8>> {
    let resolved = resolution
        .contexts
        .get(context)
        .ok_or_else(|| Error::UnknownContext(context.to_string()))?;
    let store = resolution
        .stores
        .get(&resolved.store_id)
        .with_context(|| format!("store '{}' is not active", resolved.store_id))?;

    let kubeconfig = store
        .get_kubeconfig(&resolved.location)
        .await
        .map_err(|source| Error::StoreFetch {
            id: resolved.store_id.clone(),
            kind: store.kind(),
            source: Box::new(source),
        })?;
    Ok(kubeconfig)
}

/// Delete every persisted index/state pair and cache directory. Works even
/// when index files are corrupt; deleting them is how a user recovers.
fn clean(config_path: &Path, state_dir: &Path) -> Result<()> {
    let config = config::load_config(config_path).unwrap_or_else(|err| {
        warn!(%err, "cannot read the configuration, cleaning the state directory only");
        Config::default()
    });

    let mut removed = 0usize;
    match std::fs::read_dir(state_dir) {
        Ok(entries) => {
            for entry in entries {
                let entry = entry
                    .with_context(|| format!("cannot scan {}", state_dir.display()))?;
                let file_name = entry.file_name();
                let name = file_name.to_string_lossy();
                if name.starts_with("switch.")
                    && (name.ends_with(".index") || name.ends_with(".index.state"))
                {
                    std::fs::remove_file(entry.path())
                        .with_context(|| format!("cannot delete {}", entry.path().display()))?;
                    removed += 1;
                }
            }
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("cannot read the state directory {}", state_dir.display()));
        }
    }

    let mut flushed = 0usize;
    flushed += remove_cache_dir(&state_dir.join("cache"))?;
    for store in &config.stores {
        if let Some(path) = store.cache.as_ref().and_then(|cache| cache.path.as_ref()) {
            let base = expand_path(&path.to_string_lossy());
            flushed += remove_cache_dir(&base.join(sanitize_filename(&store.store_id())))?;
        }
    }

    println!("Removed {removed} index files and {flushed} cache directories");
    Ok(())
}

fn remove_cache_dir(dir: &Path) -> Result<usize> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(1),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(err) => {
            Err(err).with_context(|| format!("cannot delete cache directory {}", dir.display()))
        }
    }
}

/// Compile a glob-style pattern (`*` any run, `?` any character) into an
/// anchored regex. Everything else matches literally.
fn compile_pattern(pattern: &str) -> Result<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 2);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).with_context(|| format!("invalid pattern '{pattern}'"))
}
