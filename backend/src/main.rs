//! walletcards CLI - Turn wallet CSV files into QR code cards and a PDF
//!
//! # Main Commands
//!
//! ```bash
//! walletcards serve                         # Start HTTP server (port 3000)
//! walletcards render wallets.csv           # Render crypto_wallets.pdf
//! walletcards render wallets.csv --group-by type --filter coin=bitcoin
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! walletcards parse wallets.csv            # Parse CSV to JSON
//! walletcards groups wallets.csv -g type   # Show how wallets would be grouped
//! walletcards qr 0xAAA -o code.png         # Encode one QR code
//! walletcards cache list                   # List cached coin logos
//! ```

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walletcards::{
    config::AppConfig, group_records, normalize, parse_csv_file_auto, qr, render_file, Field,
    Filter, LogoCache, RenderContext, RenderOptions, Selection, DOCUMENT_FILE_NAME,
};

#[derive(Parser)]
#[command(name = "walletcards")]
#[command(about = "Render wallet CSV files as QR code cards and a printable PDF", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: CSV → cards → PDF
    Render {
        /// Input CSV file
        input: PathBuf,

        /// Group wallets by a field (wallet-type, wallet-name, coin-name, coin-symbol)
        #[arg(short, long)]
        group_by: Option<Field>,

        /// Keep only wallets where FIELD=VALUE ("All" keeps everything)
        #[arg(short, long)]
        filter: Option<Filter>,

        /// Second FIELD=VALUE filter
        #[arg(long = "and")]
        and: Option<Filter>,

        /// PDF output path
        #[arg(short, long, default_value = DOCUMENT_FILE_NAME)]
        output: PathBuf,

        /// Also write the rendered view as JSON
        #[arg(long)]
        view: Option<PathBuf>,

        /// Do not look up coin logos
        #[arg(long)]
        no_logos: bool,
    },

    /// Parse a CSV file and output JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Normalize and group a CSV file, output groups as JSON
    Groups {
        /// Input CSV file
        input: PathBuf,

        #[arg(short, long)]
        group_by: Option<Field>,

        #[arg(short, long)]
        filter: Option<Filter>,

        #[arg(long = "and")]
        and: Option<Filter>,
    },

    /// Encode text as a QR code PNG
    Qr {
        /// Text to encode
        text: String,

        /// PNG output path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Inspect the coin logo cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached logos
    List,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match AppConfig::from_env() {
        Ok(config) => run(cli.command, config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Render {
            input,
            group_by,
            filter,
            and,
            output,
            view,
            no_logos,
        } => {
            let selection = Selection::new(filter, and, group_by);
            cmd_render(&input, selection, &output, view.as_deref(), no_logos, config).await
        }

        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Groups {
            input,
            group_by,
            filter,
            and,
        } => cmd_groups(&input, Selection::new(filter, and, group_by)),

        Commands::Qr { text, output } => cmd_qr(&text, &output),

        Commands::Cache { action } => cmd_cache(action, &config),

        Commands::Serve { port } => walletcards::server::start_server(port, config).await,
    }
}

async fn cmd_render(
    input: &Path,
    selection: Selection,
    output: &Path,
    view: Option<&Path>,
    no_logos: bool,
    config: AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let config = AppConfig {
        logos_enabled: config.logos_enabled && !no_logos,
        ..config
    };
    let ctx = RenderContext::from_config(&config)?;

    let result = match render_file(&ctx, input, RenderOptions::new(selection)).await {
        Ok(result) => result,
        Err(e) if e.is_recoverable() => {
            eprintln!("ℹ️  {}", e.user_message());
            return Ok(());
        }
        Err(e) => return Err(e.user_message().into()),
    };

    eprintln!("   Encoding: {}", result.table.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(result.table.delimiter));
    eprintln!("   Rows: {}", result.table.row_count);
    eprintln!("   Wallets: {} ({} rendered)", result.record_count, result.rendered_count);
    if result.logos.requested > 0 {
        eprintln!(
            "   Logos: {} cached, {} fetched, {} unavailable",
            result.logos.from_cache, result.logos.fetched, result.logos.unavailable
        );
    }
    for skipped in &result.skipped {
        eprintln!("   ⚠️  Skipped {} ({}): {}", skipped.name, skipped.address, skipped.reason);
    }

    fs::write(output, &result.document)?;
    eprintln!("💾 {} page(s) written to: {}", result.page_count, output.display());

    if let Some(view_path) = view {
        let json = serde_json::to_string_pretty(&result.view)?;
        fs::write(view_path, json)?;
        eprintln!("💾 View written to: {}", view_path.display());
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let table = parse_csv_file_auto(input)?;
    eprintln!("   Encoding: {}", table.encoding);
    eprintln!("   Delimiter: '{}' (auto-detected)", format_delimiter(table.delimiter));
    eprintln!("   Columns: {}", table.headers.join(", "));
    eprintln!("✅ Parsed {} rows", table.rows.len());

    let json = serde_json::to_string_pretty(&table)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_groups(input: &Path, selection: Selection) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📦 Grouping: {}", input.display());

    let table = parse_csv_file_auto(input)?;
    let set = normalize(&table).map_err(|e| walletcards::RenderError::from(e).user_message())?;
    eprintln!("   {} wallet records", set.len());

    let groups = match group_records(&set, &selection) {
        Ok(groups) => groups,
        Err(e) => {
            eprintln!("ℹ️  {}", e);
            return Ok(());
        }
    };
    eprintln!("   {} group(s)", groups.len());

    let json = serde_json::to_string_pretty(&groups)?;
    write_output(&json, None)?;

    Ok(())
}

fn cmd_qr(text: &str, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let code = qr::generate(text)?;
    fs::write(output, &code.png)?;
    eprintln!(
        "✅ {}x{} modules, {} px, written to: {}",
        code.modules,
        code.modules,
        code.size_px(),
        output.display()
    );
    Ok(())
}

fn cmd_cache(action: CacheAction, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        CacheAction::List => {
            let cache = LogoCache::open(&config.logo_cache_dir)?;
            let logos = cache.list();
            if logos.is_empty() {
                eprintln!("📋 No logos cached in {}", cache.dir().display());
                return Ok(());
            }

            eprintln!("📋 Cached logos ({}) in {}:\n", logos.len(), cache.dir().display());
            for logo in logos {
                println!("  🪙 {} ({} bytes)", logo.slug, logo.size_bytes);
            }
        }
    }
    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
