use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tandem_config::{find_config_path, load_config, save_config, Config};
use tandem_core::{Bundle, BundleLoader, BundleType, SharedMemoryStore, StackManager};

#[derive(Parser)]
#[command(name = "tandem", about = "Compose capability bundles into one stack", version)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging for the engine
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Browse the bundle catalog
    Bundles {
        #[command(subcommand)]
        action: BundleCommands,
    },
    /// Inspect stack composition
    Stack {
        #[command(subcommand)]
        action: StackCommands,
    },
}

#[derive(Subcommand)]
enum BundleCommands {
    /// List known bundles
    List {
        /// Only bundles of this type (official, community, custom)
        #[arg(long = "type", group = "filter")]
        bundle_type: Option<String>,
        /// Only bundles with a tag containing this text
        #[arg(long, group = "filter")]
        tag: Option<String>,
        /// Only bundles by this author
        #[arg(long, group = "filter")]
        author: Option<String>,
    },
    /// Search bundle names and descriptions
    Search {
        query: String,
    },
    /// Print a bundle as JSON
    Show {
        id: String,
    },
    /// Validate a bundle descriptor file
    Validate {
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum StackCommands {
    /// Compose the given bundles in order and report conflicts
    Check {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let base_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = if cli.verbose {
        format!("{base_filter},tandem_core=debug")
    } else {
        base_filter
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.unwrap_or_else(find_config_path);
    if let Commands::Init { force } = cli.command {
        return run_init(&config_path, force);
    }
    let config = load_config(&config_path)?;
    tracing::debug!("Using config {}", config_path.display());

    match cli.command {
        Commands::Init { .. } => unreachable!(),
        Commands::Bundles { action } => run_bundle_command(action, &config),
        Commands::Stack { action } => run_stack_command(action, &config),
    }
}

fn run_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    save_config(path, &Config::default())?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn run_bundle_command(action: BundleCommands, config: &Config) -> Result<()> {
    match action {
        BundleCommands::List {
            bundle_type,
            tag,
            author,
        } => {
            let loader = BundleLoader::from_config(&config.bundles);
            let bundles = if let Some(t) = bundle_type {
                let t = BundleType::from_str(&t).ok_or_else(|| {
                    anyhow::anyhow!(
                        "unknown bundle type '{t}' (expected official, community or custom)"
                    )
                })?;
                loader.get_by_type(t)
            } else if let Some(tag) = tag {
                loader.search_by_tag(&tag)
            } else if let Some(author) = author {
                loader.get_by_author(&author)
            } else {
                loader.get_all()
            };
            print_bundles(&bundles);
        }
        BundleCommands::Search { query } => {
            let loader = BundleLoader::from_config(&config.bundles);
            print_bundles(&loader.search(&query));
        }
        BundleCommands::Show { id } => {
            let loader = BundleLoader::from_config(&config.bundles);
            let bundle = loader
                .get_bundle(&id)
                .with_context(|| format!("no bundle with id '{id}'"))?;
            println!("{}", serde_json::to_string_pretty(bundle)?);
        }
        BundleCommands::Validate { path } => {
            let mut loader = BundleLoader::new();
            let bundle = loader.load_custom_bundle(&path)?;
            println!(
                "{} is valid: '{}' ({}, {} agents, {} memory categories)",
                path.display(),
                bundle.id,
                bundle.bundle_type,
                bundle.agents.len(),
                bundle.memory_categories.len()
            );
        }
    }
    Ok(())
}

fn run_stack_command(action: StackCommands, config: &Config) -> Result<()> {
    match action {
        StackCommands::Check { ids } => {
            let loader = BundleLoader::from_config(&config.bundles);
            let memory = Arc::new(SharedMemoryStore::from_config(&config.memory));
            let stack = StackManager::from_config(&config.stack, memory.clone());

            let mut failures = 0usize;
            for id in &ids {
                let Some(bundle) = loader.get_bundle(id) else {
                    println!("  ✗ {id}: unknown bundle");
                    failures += 1;
                    continue;
                };
                match stack.add_to_stack(bundle.clone()) {
                    Ok(()) => println!("  ✓ {id}"),
                    Err(e) => {
                        println!("  ✗ {id}: {e}");
                        failures += 1;
                    }
                }
            }

            println!("\nAgents:");
            for scoped in stack.get_all_agents() {
                println!("  {:<20} ({})", scoped.agent.role, scoped.bundle_id);
            }

            let skills: Vec<String> = stack.get_all_skills().into_iter().collect();
            println!("\nSkills: {}", skills.join(", "));

            println!("\nAutomations:");
            for scoped in stack.resolved_automations() {
                println!(
                    "  {:<20} ({})",
                    scoped.automation.trigger, scoped.bundle_id
                );
            }

            println!("\nMemory categories:");
            for category in memory.registered_categories() {
                println!(
                    "  {:<20} owners: {}",
                    category,
                    memory.get_category_owners(&category).join(", ")
                );
            }

            println!("\n{}", serde_json::to_string_pretty(&stack.summary())?);

            if failures > 0 {
                anyhow::bail!("{failures} of {} bundles could not be added", ids.len());
            }
        }
    }
    Ok(())
}

fn print_bundles(bundles: &[&Bundle]) {
    if bundles.is_empty() {
        println!("No bundles found.");
        return;
    }
    for b in bundles {
        let author = b.author.as_deref().unwrap_or("-");
        println!(
            "{:<20} {:<10} {:<24} {}",
            b.id, b.bundle_type, b.name, author
        );
    }
}
