//! RSSH Build Cache CLI
//!
//! Entry point for the `rssh-buildcache` command-line tool.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rssh_buildcache::{
    ArtifactRecord, BuildCache, BuildCacheConfig, BuildRequest, CacheError, GoToolchain,
};
use rssh_trie::Trie;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "rssh-buildcache")]
#[command(about = "Build, cache and manage reverse SSH client binaries", version)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Cache directory (overrides config)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Project root containing cmd/client (overrides config)
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the compilation targets the toolchain supports
    Targets {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Build a client and cache it
    Build {
        /// Target operating system (default: host)
        #[arg(long)]
        goos: Option<String>,

        /// Target architecture (default: host)
        #[arg(long)]
        goarch: Option<String>,

        /// Address the client connects back to (default: from config)
        #[arg(long)]
        connect_back: Option<String>,

        /// Server key fingerprint (default: from config)
        #[arg(long)]
        fingerprint: Option<String>,

        /// Download name (default: random)
        #[arg(long)]
        name: Option<String>,

        /// Build a shared object instead of an executable
        #[arg(long)]
        shared: bool,
    },

    /// List cached builds
    List {
        /// Glob matched against name, OS and architecture
        #[arg(default_value = "")]
        filter: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show one cached build
    Get {
        name: String,
    },

    /// Remove a cached build and its file
    Delete {
        name: String,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };

    let toolchain = Arc::new(GoToolchain::new(config.toolchain.clone()));
    let cache = match BuildCache::start(&config, toolchain, Arc::new(Trie::new())) {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("Error starting build cache: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Targets { json } => run_targets(&cache, json),
        Commands::Build {
            goos,
            goarch,
            connect_back,
            fingerprint,
            name,
            shared,
        } => run_build(
            &cache,
            BuildRequest {
                os: goos.unwrap_or_default(),
                arch: goarch.unwrap_or_default(),
                connect_back: connect_back.unwrap_or_default(),
                fingerprint: fingerprint.unwrap_or_default(),
                name: name.unwrap_or_default(),
                shared,
            },
        ),
        Commands::List { filter, json } => run_list(&cache, &filter, json),
        Commands::Get { name } => run_get(&cache, &name),
        Commands::Delete { name } => run_delete(&cache, &name),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "rssh_buildcache=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> Result<BuildCacheConfig, rssh_buildcache::ConfigError> {
    let mut overrides = toml::Table::new();
    if let Some(dir) = &cli.cache_dir {
        overrides.insert(
            "cache_dir".to_string(),
            toml::Value::String(dir.to_string_lossy().into_owned()),
        );
    }
    if let Some(root) = &cli.project_root {
        overrides.insert(
            "project_root".to_string(),
            toml::Value::String(root.to_string_lossy().into_owned()),
        );
    }
    BuildCacheConfig::load(cli.config.as_deref(), overrides)
}

fn run_targets(cache: &BuildCache, json: bool) -> Result<(), CacheError> {
    let catalog = cache.catalog();
    if json {
        let targets: Vec<_> = catalog.targets().collect();
        print_json(&targets);
    } else {
        println!("Host: {}", catalog.host());
        println!();
        for target in catalog.targets() {
            println!("  {}", target);
        }
    }
    Ok(())
}

fn run_build(cache: &BuildCache, request: BuildRequest) -> Result<(), CacheError> {
    let url = cache.build(&request)?;
    println!("{}", url);
    Ok(())
}

fn run_list(cache: &BuildCache, filter: &str, json: bool) -> Result<(), CacheError> {
    let matching = cache.list(filter)?;

    if json {
        print_json(&matching);
        return Ok(());
    }

    if matching.is_empty() {
        println!("No cached builds");
        return Ok(());
    }

    println!(
        "{:<20} {:<10} {:<8} {:<14} {:>5}  {}",
        "NAME", "GOOS", "GOARCH", "TYPE", "HITS", "VERSION"
    );
    for (name, record) in &matching {
        print_row(name, record);
    }
    Ok(())
}

fn run_get(cache: &BuildCache, name: &str) -> Result<(), CacheError> {
    let record = cache.get(name)?;
    print_json(&record);
    Ok(())
}

fn run_delete(cache: &BuildCache, name: &str) -> Result<(), CacheError> {
    cache.delete(name)?;
    println!("{} removed", name);
    Ok(())
}

fn print_row(name: &str, record: &ArtifactRecord) {
    println!(
        "{:<20} {:<10} {:<8} {:<14} {:>5}  {}",
        name,
        record.operating_system,
        record.architecture,
        record.artifact_kind.as_str(),
        record.hit_count,
        record.version
    );
}

fn render_json<T: serde::Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

fn print_json<T: serde::Serialize>(value: &T) {
    match render_json(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}
