use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use modeldb::{SchemaDocument, SchemaRegistry, Store, StoreConfig, slugify};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "modeldb-tool")]
#[command(about = "Developer tooling for modeldb schemas and storage")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct Target {
    /// Connection URL, e.g. sqlite://localhost/blog?path=blog.db
    #[arg(long, conflicts_with = "config")]
    url: Option<String>,
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// SQLite file, overriding the configured path
    #[arg(long)]
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a schema document and list its entities
    Check { schema: PathBuf },
    /// Create every table and link table of a schema document
    CreateStorage {
        schema: PathBuf,
        #[command(flatten)]
        target: Target,
    },
    /// Load a fixture document into storage
    LoadFixtures {
        schema: PathBuf,
        fixtures: PathBuf,
        #[command(flatten)]
        target: Target,
        /// Variable substituted for %name% in fixture values, as name=value
        #[arg(long = "var")]
        vars: Vec<String>,
    },
    /// Print the token a text would normalize to
    Slug { text: String },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Check { schema } => check(&schema),
        Command::CreateStorage { schema, target } => create_storage(&schema, &target),
        Command::LoadFixtures {
            schema,
            fixtures,
            target,
            vars,
        } => load_fixtures(&schema, &fixtures, &target, &vars),
        Command::Slug { text } => {
            println!("{}", slugify(&text));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("modeldb=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_registry(schema: &Path) -> Result<SchemaRegistry> {
    let document = SchemaDocument::from_file(schema)
        .with_context(|| format!("Failed to load schema '{}'", schema.display()))?;
    document
        .into_registry()
        .with_context(|| format!("Schema '{}' is inconsistent", schema.display()))
}

fn load_config(target: &Target) -> Result<StoreConfig> {
    let mut config = match (&target.url, &target.config) {
        (Some(url), _) => StoreConfig::from_url(url)?,
        (None, Some(path)) => StoreConfig::from_json_file(path)?,
        (None, None) => StoreConfig::from_env()?,
    };
    if let Some(path) = &target.path {
        config = config.path(path);
    }
    config.validate()?;
    Ok(config)
}

fn open_store(schema: &Path, target: &Target) -> Result<Store> {
    let registry = load_registry(schema)?;
    let config = load_config(target)?;
    let url = config.to_url();
    Store::connect(config, registry).with_context(|| format!("Failed to connect to {}", url))
}

fn check(schema: &Path) -> Result<()> {
    let registry = load_registry(schema)?;
    println!("Schema: {}", schema.display());
    for entity_type in registry.entity_types() {
        let descriptor = registry.describe(entity_type)?;
        let fields = descriptor.field_names().collect::<Vec<_>>().join(", ");
        println!("- {} (table {}): {}", entity_type, descriptor.table(), fields);
        for other in descriptor.linked_entities() {
            println!("    many-to-many with {}", other);
        }
    }
    println!("Entities: {}", registry.len());
    Ok(())
}

fn create_storage(schema: &Path, target: &Target) -> Result<()> {
    let store = open_store(schema, target)?;
    store.ensure_database()?;
    let created = store.create_all_storage()?;
    println!("Created {} table(s) in '{}'", created, store.config().database);
    Ok(())
}

fn load_fixtures(schema: &Path, fixtures: &Path, target: &Target, vars: &[String]) -> Result<()> {
    let vars = parse_vars(vars)?;
    let store = open_store(schema, target)?;
    store.ensure_database()?;
    store.create_all_storage()?;

    let json = fs::read_to_string(fixtures)
        .with_context(|| format!("Failed to read fixtures '{}'", fixtures.display()))?;
    let inserted = store.load_fixtures(&json, &vars)?;
    for (entity_type, id) in &inserted {
        println!("{}#{}", entity_type, id);
    }
    println!("Inserted {} record(s)", inserted.len());
    Ok(())
}

fn parse_vars(input: &[String]) -> Result<BTreeMap<String, String>> {
    input
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(name, value)| (name.trim().to_string(), value.to_string()))
                .ok_or_else(|| anyhow!("Invalid variable '{}'. Expected format: name=value", pair))
        })
        .collect()
}
