//! Symdex CLI - Command-line interface for the symbol indexing engine

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use symdex::config::{self, SymdexConfig};
use symdex::index::{Indexer, DEFAULT_INDEX_FILE};
use symdex::store::IndexStore;
use symdex::{resolve, Extractor};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "symdex")]
#[command(version = "0.1.0")]
#[command(about = "Symbol indexing and scope resolution for Python source trees")]
#[command(long_about = r#"
Symdex parses Python source trees into symbol tables and maintains a
persisted dependency/coverage index, enabling:
  • "What scopes enclose line N" queries with properly nested results
  • Conservative dependency sets per class/function/method
  • Test-coverage inference from test-file naming conventions

Example usage:
  symdex index --path ./myproject
  symdex context --file src/component.py --line 42
  symdex deps --file src/component.py --symbol MyComponent.process
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter symdex.toml config
    Init {
        /// Config file path
        #[arg(short, long, default_value = "symdex.toml")]
        config: PathBuf,

        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Rescan a project tree and update the persisted index
    Index {
        /// Project root to index
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Index file path (defaults to <root>/codebase_index.json)
        #[arg(short, long)]
        index_file: Option<PathBuf>,
    },

    /// Show the scope context enclosing a line
    Context {
        /// Source file to analyze
        #[arg(short, long)]
        file: PathBuf,

        /// Line number (1-indexed)
        #[arg(short, long)]
        line: u32,
    },

    /// Show the dependency set of a symbol
    Deps {
        /// Source file to analyze
        #[arg(short, long)]
        file: PathBuf,

        /// Symbol name (dotted Class.method for methods)
        #[arg(short, long)]
        symbol: String,
    },

    /// Find line numbers referencing a symbol
    Refs {
        /// Source file to scan
        #[arg(short, long)]
        file: PathBuf,

        /// Symbol name
        #[arg(short, long)]
        symbol: String,
    },

    /// Show a summary of the persisted index
    Stats {
        /// Index file path
        #[arg(short, long, default_value = DEFAULT_INDEX_FILE)]
        index_file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { config, force } => {
            let defaults = SymdexConfig {
                index_file: Some(DEFAULT_INDEX_FILE.to_string()),
                ..SymdexConfig::default()
            };
            config::write_config(&config, &defaults, force)?;
            println!("✅ Wrote config to {:?}", config);
        }

        Commands::Index { path, index_file } => {
            let loaded = config::load_project_config(&path)?;
            let store_path = index_file
                .or_else(|| loaded.index_file.as_ref().map(|f| path.join(f)))
                .unwrap_or_else(|| path.join(DEFAULT_INDEX_FILE));

            println!("🚀 Indexing project: {:?}", path);
            println!("🗄️  Index file: {:?}", store_path);

            let store = IndexStore::new(&store_path);
            let mut indexer =
                Indexer::with_store(&path, store)?.with_policy(loaded.policy());
            let report = indexer.update_index()?;

            println!("\n📊 Scan complete:");
            println!("   Files indexed: {}", report.files_indexed);
            println!("   Update cycle: {}", report.update_counter);
            if !report.failed.is_empty() {
                println!("   Files skipped: {}", report.failed.len());
                for (file, reason) in &report.failed {
                    println!("   ⚠️  {}: {}", file, reason);
                }
            }
        }

        Commands::Context { file, line } => {
            let mut extractor = Extractor::new()?;
            let ctx = extractor.extract_file(&file)?;
            let resolved = resolve::resolve_at(&ctx, line);

            println!("🔍 Scope at {}:{}", file.display(), line);
            if resolved.scope_stack.is_empty() {
                println!("∅ No enclosing scope (file-level context)");
            } else {
                for (depth, name) in resolved.scope_stack.iter().enumerate() {
                    let symbol = &resolved.symbols[name];
                    println!(
                        "{}- [{}] {} (lines {}-{})",
                        "  ".repeat(depth),
                        symbol.kind,
                        name,
                        symbol.start_line,
                        symbol.end_line
                    );
                }
            }

            let visible: Vec<_> = resolved
                .symbols
                .keys()
                .filter(|name| !resolved.scope_stack.contains(*name))
                .collect();
            if !visible.is_empty() {
                println!("\nReferenced symbols:");
                for name in visible {
                    println!("  {}", name);
                }
            }
        }

        Commands::Deps { file, symbol } => {
            let mut extractor = Extractor::new()?;
            let ctx = extractor.extract_file(&file)?;
            let deps = resolve::symbol_dependencies(&ctx, &symbol);

            println!("📦 Dependencies of {} in {}:", symbol, file.display());
            if deps.is_empty() {
                println!("∅ No dependencies found.");
            } else {
                for dep in deps {
                    println!("- {}", dep);
                }
            }
        }

        Commands::Refs { file, symbol } => {
            let source = std::fs::read_to_string(&file)?;
            let lines = resolve::find_references(&source, &symbol);

            println!("🔗 References to {} in {}:", symbol, file.display());
            if lines.is_empty() {
                println!("∅ No references found.");
            } else {
                for line in lines {
                    println!("- line {}", line);
                }
            }
        }

        Commands::Stats { index_file } => {
            let store = IndexStore::new(&index_file);
            let index = store.load();

            println!("📊 Symdex index ({:?})", index_file);
            println!("------------------------------------");
            println!("Last updated:   {}", index.metadata.last_updated);
            println!("Update counter: {}", index.metadata.update_counter);
            println!("Format version: {}", index.metadata.version);
            println!("Components:     {}", index.components.len());
            println!("Dependencies:   {}", index.dependencies.len());
            println!("Covered:        {}", index.test_coverage.len());

            for (path, record) in &index.components {
                println!(
                    "- {} ({} classes, {} functions, cycle {})",
                    path,
                    record.classes.len(),
                    record.functions.len(),
                    record.last_update
                );
            }
        }
    }

    Ok(())
}
