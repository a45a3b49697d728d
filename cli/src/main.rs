mod commands;
mod config;
mod gemini;
mod logging;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use crate::commands::{
    RecordEdit, cmd_add, cmd_convert, cmd_delete, cmd_edit, cmd_export, cmd_import, cmd_insight,
    cmd_list, cmd_overview, cmd_settings_show, cmd_settings_theme, cmd_settings_toggle_theme,
    cmd_settings_unit,
};
use crate::config::Config;
use crate::gemini::GeminiClient;
use crate::logging::{Verbosity, init_logging};
use sugartrack_core::models::{Category, Theme, Unit};
use sugartrack_core::service::SugarService;

#[derive(Parser)]
#[command(
    name = "sugartrack",
    version,
    about = "A simple blood-glucose log CLI",
    long_about = "\n\n  ███████╗██╗   ██╗ ██████╗  █████╗ ██████╗
  ██╔════╝██║   ██║██╔════╝ ██╔══██╗██╔══██╗
  ███████╗██║   ██║██║  ███╗███████║██████╔╝
  ╚════██║██║   ██║██║   ██║██╔══██║██╔══██╗
  ███████║╚██████╔╝╚██████╔╝██║  ██║██║  ██║
  ╚══════╝ ╚═════╝  ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝
        every reading, in both units.
"
)]
struct Cli {
    /// More diagnostic output on stderr (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Only print warnings and errors on stderr
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a glucose reading
    Add {
        /// Measured value
        value: f64,
        /// When it was taken, e.g. "Before Breakfast" or before-breakfast
        #[arg(short, long)]
        category: Category,
        /// mg/dL or mmol/L (default: your default unit)
        #[arg(short, long)]
        unit: Option<Unit>,
        /// Optional notes
        #[arg(short, long)]
        notes: Option<String>,
        /// Reading time ("YYYY-MM-DD HH:MM", "YYYY-MM-DD" or RFC 3339; default: now)
        #[arg(long)]
        at: Option<String>,
        /// Store the value converted into the other unit
        #[arg(long)]
        convert: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List readings, newest first
    List {
        /// Match against the date (e.g. "3/7/2024") or notes
        #[arg(short, long)]
        search: Option<String>,
        /// Only show this category
        #[arg(short, long)]
        category: Option<Category>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a reading by ID (full ID or the short prefix shown by `list`)
    Edit {
        /// Reading ID
        id: String,
        /// New value
        #[arg(long)]
        value: Option<f64>,
        /// New unit (the value is not converted; see --convert)
        #[arg(short, long)]
        unit: Option<Unit>,
        /// New category
        #[arg(short, long)]
        category: Option<Category>,
        /// New notes (empty string clears them)
        #[arg(short, long)]
        notes: Option<String>,
        /// New reading time
        #[arg(long)]
        at: Option<String>,
        /// Convert the value into the other unit
        #[arg(long)]
        convert: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete one or more readings by ID
    Delete {
        /// Reading IDs
        #[arg(required = true)]
        ids: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Convert a value between mg/dL and mmol/L
    Convert {
        /// Value to convert
        value: f64,
        /// Unit the value is in (default: your default unit)
        #[arg(short, long)]
        unit: Option<Unit>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show average/high/low and the recent trend
    Overview {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export all readings as a JSON backup
    Export {
        /// Output file (default: sugartrack_backup_<date>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write the backup to stdout instead of a file
        #[arg(long, conflicts_with = "output")]
        stdout: bool,
    },
    /// Restore readings from a JSON backup (replaces everything)
    Import {
        /// Path to the backup file
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change preferences
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Ask the AI for a short analysis of your recent readings
    Insight {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show current preferences
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the default unit for new readings
    Unit {
        /// mg/dL or mmol/L
        unit: Unit,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the theme
    Theme {
        /// light or dark
        theme: Theme,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Switch between light and dark
    ToggleTheme {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(Verbosity::from_flags(cli.quiet, cli.verbose));

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let mut svc = SugarService::open(&config.db_path)?;

    match cli.command {
        Commands::Add {
            value,
            category,
            unit,
            notes,
            at,
            convert,
            json,
        } => cmd_add(
            &mut svc,
            value,
            category,
            unit,
            notes,
            at.as_deref(),
            convert,
            json,
        ),
        Commands::List {
            search,
            category,
            json,
        } => cmd_list(&svc, search.as_deref(), category, json),
        Commands::Edit {
            id,
            value,
            unit,
            category,
            notes,
            at,
            convert,
            json,
        } => {
            let edit = RecordEdit {
                value,
                unit,
                category,
                notes,
                at,
                convert,
            };
            cmd_edit(&mut svc, &id, edit, json)
        }
        Commands::Delete { ids, json } => cmd_delete(&mut svc, &ids, json),
        Commands::Convert { value, unit, json } => {
            let unit = unit.unwrap_or(svc.preferences().default_unit);
            cmd_convert(value, unit, json)
        }
        Commands::Overview { json } => cmd_overview(&svc, json),
        Commands::Export { output, stdout } => cmd_export(&svc, output.as_deref(), stdout),
        Commands::Import { file, json } => cmd_import(&mut svc, &file, json),
        Commands::Settings { command } => match command {
            SettingsCommands::Show { json } => cmd_settings_show(&svc, json),
            SettingsCommands::Unit { unit, json } => cmd_settings_unit(&mut svc, unit, json),
            SettingsCommands::Theme { theme, json } => cmd_settings_theme(&mut svc, theme, json),
            SettingsCommands::ToggleTheme { json } => cmd_settings_toggle_theme(&mut svc, json),
        },
        Commands::Insight { json } => {
            let client = GeminiClient::new(config.insight_api_key.clone())?;
            cmd_insight(&svc, &client, json).await
        }
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?.0)
            };
            let client = GeminiClient::new(config.insight_api_key.clone())?;
            server::start_server(svc, client, port, &bind, api_key).await
        }
    }
}
