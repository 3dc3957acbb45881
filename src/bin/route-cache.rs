use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::{Duration, UNIX_EPOCH};

use prediction_router::config::{load_config, RouterConfig};
use prediction_router::routing::loader::{load_source, load_stamped};
use prediction_router::routing::{build, RouteCache, RouteEngine, TableOrigin};

#[derive(Parser)]
#[command(name = "route-cache")]
#[command(about = "Compile, inspect and clear the route cache", long_about = None)]
struct Cli {
    /// Router configuration file.
    #[arg(short, long, default_value = "config/router.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the table from source and write the cache artifact
    Compile,
    /// Remove the cache artifact
    Clear,
    /// Show the cache artifact and whether it is still valid
    Status,
    /// List the flattened route table
    List,
    /// Generate a URL for a named route: url <name> key=value...
    Url {
        name: String,
        params: Vec<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Compile => compile(&config)?,
        Commands::Clear => {
            let cache = RouteCache::new(&config.routing.cache.path);
            if cache.clear()? {
                println!("Removed {}", cache.path().display());
            } else {
                println!("No cache at {}", cache.path().display());
            }
        }
        Commands::Status => status(&config),
        Commands::List => list(&config)?,
        Commands::Url { name, params } => {
            let pairs = params
                .iter()
                .map(|p| p.split_once('=').ok_or_else(|| format!("expected key=value, got '{p}'")))
                .collect::<Result<Vec<_>, _>>()?;
            let engine = RouteEngine::from_table(
                build(&load_source(&config.routing.definitions)?)?,
                &config.routing.base_path,
                TableOrigin::Source,
            )?;
            println!("{}", engine.url_for(&name, pairs)?);
        }
    }

    Ok(())
}

fn compile(config: &RouterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let definitions = &config.routing.definitions;
    let stamped = load_stamped(definitions)?;
    let table = build(&stamped.source)?;
    let cache = RouteCache::new(&config.routing.cache.path);
    cache.write(&table, definitions, stamped.modified)?;
    println!(
        "Compiled {} routes ({} named) from {} into {}",
        table.len(),
        table.names().len(),
        definitions.display(),
        cache.path().display()
    );
    Ok(())
}

fn status(config: &RouterConfig) {
    let cache = RouteCache::new(&config.routing.cache.path);
    let Some(artifact) = cache.load() else {
        println!("No readable cache at {}", cache.path().display());
        return;
    };

    let valid = artifact.is_valid(&config.routing.definitions);
    println!("Cache:      {}", cache.path().display());
    println!("Source:     {}", artifact.source_path.display());
    println!("Generated:  {:?}", UNIX_EPOCH + Duration::from_nanos(artifact.generated_at));
    println!("Routes:     {}", artifact.table.len());
    println!("Valid:      {}", if valid { "yes" } else { "no (source changed or moved)" });
}

fn list(config: &RouterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let table = build(&load_source(&config.routing.definitions)?)?;
    for route in table.routes() {
        let methods: Vec<&str> = route.methods.iter().map(|m| m.as_str()).collect();
        let middleware: Vec<&str> = route.middleware.iter().filter_map(|m| m.name()).collect();
        println!(
            "{:<16} {:<40} {:<32} {:<24} {}",
            methods.join("|"),
            route.pattern,
            route.handler.to_string(),
            route.name.as_deref().unwrap_or("-"),
            middleware.join(",")
        );
    }
    for (status, target) in table.fallbacks() {
        println!("{:<16} {:<40} {}", "fallback", status, target);
    }
    Ok(())
}
