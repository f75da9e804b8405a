use clap::{Parser, Subcommand};
use spooltag::crypto::{derive_keys, MasterSecret};
use spooltag::decode::decode;
use spooltag::dump::{default_stem, TagDump};
use spooltag::payload::SpoolmanPayload;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "spooltag", about = "Filament spool RFID tag keys and decoder")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive the 16 sector keys for a tag UID
    Keys {
        /// Tag UID as hex, 4 to 10 bytes
        uid: String,
        /// 16-byte master secret as hex
        #[arg(short, long, env = "SPOOLTAG_MASTER_KEY")]
        master_key: Option<String>,
    },
    /// Decode a dump (.json or raw .bin image) and print it as JSON
    Decode {
        input: PathBuf,
        /// Emit the inventory payload instead of the full record
        #[arg(long)]
        spoolman: bool,
        #[arg(short, long)]
        pretty: bool,
    },
    /// Print the decoded fields of a dump with units
    Show {
        input: PathBuf,
    },
    /// Report which blocks a dump holds
    Coverage {
        input: PathBuf,
    },
    /// Write a dump as both <STEM>.json and <STEM>.bin
    Convert {
        input: PathBuf,
        /// Output stem; defaults to bambu_<UID>_<timestamp>
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {

        // ── Keys ─────────────────────────────────────────────────────────────
        Commands::Keys { uid, master_key } => {
            let uid = hex::decode(uid.trim())?;
            let master = match master_key {
                Some(hex) => hex.parse::<MasterSecret>()?,
                None      => MasterSecret::default(),
            };
            for key in derive_keys(&uid, &master)? {
                println!("{key}");
            }
        }

        // ── Decode ───────────────────────────────────────────────────────────
        Commands::Decode { input, spoolman, pretty } => {
            let spool = decode(&TagDump::load(&input)?.to_table());
            let out = if spoolman {
                to_json(&SpoolmanPayload::from(&spool), pretty)?
            } else {
                to_json(&spool, pretty)?
            };
            println!("{out}");
        }

        // ── Show ─────────────────────────────────────────────────────────────
        Commands::Show { input } => {
            let spool = decode(&TagDump::load(&input)?.to_table());
            println!("── {} ─────────────────────────────────────────", input.display());
            for (label, value) in spool.describe() {
                println!("  {:<22} {}", label, value);
            }
            if spool.is_multicolor() {
                println!("  {:<22} {}", "Colors", spool.color_count());
            }
        }

        // ── Coverage ─────────────────────────────────────────────────────────
        Commands::Coverage { input } => {
            let completeness = TagDump::load(&input)?.to_table().completeness();
            println!("{}", completeness.summary());
            println!("  Present        {:?}", completeness.present());
            println!("  Missing        {:?}", completeness.missing());
            let gaps = completeness.missing_layout_blocks();
            if !gaps.is_empty() {
                println!("  Missing fields in blocks {:?}", gaps);
            }
        }

        // ── Convert ──────────────────────────────────────────────────────────
        Commands::Convert { input, output } => {
            let dump = TagDump::load(&input)?;
            let stem = output.unwrap_or_else(|| PathBuf::from(default_stem(dump.uid_bytes().as_deref())));
            let json = with_extension(&stem, "json");
            let bin  = with_extension(&stem, "bin");
            dump.save_json(&json)?;
            dump.save_bin(&bin)?;
            println!("Wrote {} and {}", json.display(), bin.display());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "spooltag=warn",
        1 => "spooltag=info",
        _ => "spooltag=debug",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}

fn with_extension(stem: &Path, ext: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}
