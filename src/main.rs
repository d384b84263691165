use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use mosaic_core::PageId;
use mosaic_engine::{ComponentRegistry, PageRef, Renderer};
use mosaic_registry::ModuleRegistry;
use mosaic_store::{Database, PageRepo};
use mosaic_telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser)]
#[command(name = "mosaic", about = "Modular page composition engine", version)]
struct Cli {
    /// Site root containing the modules/ directory and asset files.
    #[arg(long, default_value = ".", global = true)]
    site_root: PathBuf,

    /// Modules directory. Defaults to <site-root>/modules.
    #[arg(long, global = true)]
    modules_dir: Option<PathBuf>,

    /// Database file. Defaults to <site-root>/mosaic.db.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Emit JSON log lines instead of the human-readable format.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a page to stdout.
    Render {
        /// Page slug, or a page ID when --preview is set.
        page: String,
        /// Treat the argument as a page ID and render regardless of status.
        #[arg(long)]
        preview: bool,
    },
    /// Inspect and validate the module registry.
    Modules {
        #[command(subcommand)]
        command: ModuleCommands,
    },
    /// Inspect pages.
    Pages {
        #[command(subcommand)]
        command: PageCommands,
    },
}

#[derive(Subcommand)]
enum ModuleCommands {
    /// List known modules with aliases and active flags.
    List,
    /// Check the registry for alias collisions, unknown dependencies and
    /// missing asset files. Exits nonzero when anything is found.
    Validate,
}

#[derive(Subcommand)]
enum PageCommands {
    /// List pages with slug and status.
    List,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_telemetry(&TelemetryConfig {
        json_output: cli.json_logs,
        ..TelemetryConfig::default()
    });

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let modules_dir = cli
        .modules_dir
        .clone()
        .unwrap_or_else(|| cli.site_root.join("modules"));
    let db_path = cli.db.unwrap_or_else(|| cli.site_root.join("mosaic.db"));

    match cli.command {
        Commands::Render { page, preview } => {
            let db = open_db(&db_path)?;
            let registry = Arc::new(ModuleRegistry::load(&modules_dir));
            let components = Arc::new(ComponentRegistry::with_generic_fallback());
            let renderer = Renderer::new(db, registry, components, &cli.site_root);

            let id = PageId::from_raw(page.clone());
            let page_ref = if preview { PageRef::Id(&id) } else { PageRef::Slug(&page) };
            let rendered = renderer
                .render_page(page_ref)
                .with_context(|| format!("failed to render '{page}'"))?;
            tracing::info!(page = %page, preview, "page rendered");

            println!("{}", rendered.document);
            println!();
            if rendered.css_variables.as_object().is_some_and(|o| !o.is_empty()) {
                println!("css-variables: {}", rendered.css_variables);
            }
            for path in &rendered.assets.css {
                println!("css: {path}");
            }
            for path in &rendered.assets.js {
                println!("js: {path}");
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Modules { command: ModuleCommands::List } => {
            let registry = ModuleRegistry::load(&modules_dir);
            for def in registry.list() {
                let aliases = if def.aliases.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", def.aliases.join(", "))
                };
                let state = if def.active { "active" } else { "inactive" };
                println!("{}{aliases} [{state}]", def.slug);
            }
            for error in registry.scan_errors() {
                eprintln!("warning: {}: {}", error.path, error.message);
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Modules { command: ModuleCommands::Validate } => {
            let registry = ModuleRegistry::load(&modules_dir);
            let mut findings = registry.scan_errors().len();
            for error in registry.scan_errors() {
                println!("manifest: {}: {}", error.path, error.message);
            }
            let issues = registry.validate(&cli.site_root);
            findings += issues.len();
            for issue in &issues {
                println!("{issue}");
            }
            if findings == 0 {
                println!("ok: {} modules", registry.count());
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }

        Commands::Pages { command: PageCommands::List } => {
            let db = open_db(&db_path)?;
            for page in PageRepo::new(db).list()? {
                println!("{} [{}] {}", page.slug, page.status, page.id);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn open_db(path: &PathBuf) -> anyhow::Result<Database> {
    Database::open(path).with_context(|| format!("failed to open database {}", path.display()))
}
