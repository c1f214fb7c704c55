//! Impex CLI - CSV import/export for store data
//!
//! # Main Commands
//!
//! ```bash
//! impex serve                       # Start HTTP server (port 3000)
//! impex import script.csv           # Run an impex script
//! impex import -m product data.csv  # Import CSV rows into one model
//! impex export product              # Export a model's records as CSV
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! impex map data.csv                # Decode CSV to nested JSON records
//! impex models                      # List registered models
//! ```

use clap::{Parser, Subcommand};
use impex::{
    decode_all, encode_to_string, normalize, CommandRegistry, MemoryModel, Model as _,
    ModelRegistry, ScriptRunner,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "impex")]
#[command(about = "CSV import/export engine for store data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an impex script, or import a CSV file into one model
    Import {
        /// Input CSV file
        input: PathBuf,

        /// Import into a single model (runs `UPDATE <model>`) instead of
        /// treating the file as a script
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Export a model's records as CSV
    Export {
        /// Model name
        model: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode a CSV file into nested JSON records
    Map {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List registered models
    Models,

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

/// In-memory models available out of the box. Host applications embed
/// the library and register their own [`impex::Model`] implementations.
fn default_models() -> Arc<ModelRegistry> {
    let models = ModelRegistry::new();
    for name in ["product", "category", "page", "post"] {
        models.register(Arc::new(MemoryModel::new(name)));
    }
    Arc::new(models)
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Import { input, model } => cmd_import(&input, model.as_deref()),
        Commands::Export { model, output } => cmd_export(&model, output.as_deref()),
        Commands::Map { input, output } => cmd_map(&input, output.as_deref()),
        Commands::Models => cmd_models(),
        Commands::Serve { port } => cmd_serve(port),
    };

    if let Err(e) = result {
        eprintln!("x Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_import(input: &Path, model: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("  Importing: {}", input.display());

    let bytes = fs::read(input)?;
    let content = normalize(&bytes);

    let models = default_models();
    let commands = CommandRegistry::with_builtins();
    let runner = ScriptRunner::new(&commands, &models);

    let summary = match model {
        Some(name) => runner.run_command(&format!("UPDATE {name}"), content.as_bytes())?,
        None => runner.run_script(content.as_bytes())?,
    };

    eprintln!(
        "+ {} record(s) in {} block(s), {} error(s)",
        summary.records, summary.blocks, summary.errors
    );
    Ok(())
}

fn cmd_export(model_name: &str, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let models = default_models();
    let model = models.get(model_name)?;

    let records = model.list_records()?;
    eprintln!("  Exporting {} record(s) from '{}'", records.len(), model_name);

    let csv_text = encode_to_string(&records)?;
    write_output(&csv_text, output)?;
    Ok(())
}

fn cmd_map(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("  Decoding: {}", input.display());

    let bytes = fs::read(input)?;
    let content = normalize(&bytes);
    let records = decode_all(content.as_bytes())?;

    eprintln!("+ {} record(s)", records.len());

    let json = serde_json::to_string_pretty(&records)?;
    write_output(&json, output)?;
    Ok(())
}

fn cmd_models() -> Result<(), Box<dyn std::error::Error>> {
    let models = default_models();
    for name in models.names() {
        let model = models.get(&name)?;
        let caps = model.capabilities();
        let mut flags = Vec::new();
        if caps.storable {
            flags.push("storable");
        }
        if caps.object {
            flags.push("object");
        }
        if caps.listable {
            flags.push("listable");
        }
        if caps.custom_attributes {
            flags.push("custom attributes");
        }
        if caps.media {
            flags.push("media");
        }
        println!("  {} ({})", name, flags.join(", "));
    }
    Ok(())
}

fn cmd_serve(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(impex::server::start_server(
        port,
        default_models(),
        Arc::new(CommandRegistry::with_builtins()),
    ))
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("+ Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
