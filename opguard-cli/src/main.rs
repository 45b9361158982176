mod server;
mod handlers;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "opguard",
    about = "Opguard — exclusive-operation leases for ERP records",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the opguard HTTP lease server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3200")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Storage backend: "memory" or "sqlite:<path>"
        #[arg(long, default_value = "memory", env = "OPGUARD_STORAGE")]
        storage: String,

        /// Lease time-to-live in milliseconds
        #[arg(long, default_value = "300000", env = "OPGUARD_TTL_MS")]
        ttl_ms: u64,

        /// Seconds between expiry sweeps (0 disables the sweeper)
        #[arg(long, default_value = "60")]
        sweep_secs: u64,
    },

    /// Check operation preconditions from a JSON manifest (stdin)
    Check,

    /// Print version information
    Version,
}

#[derive(serde::Deserialize)]
struct CheckManifest {
    record: opguard_core::types::ResourceRecord,
    operation: String,
    #[serde(default)]
    details: opguard_core::types::OperationDetails,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            host,
            storage,
            ttl_ms,
            sweep_secs,
        } => {
            server::run(&host, port, &storage, ttl_ms, sweep_secs).await;
        }
        Commands::Check => {
            eprintln!("Reading check manifest from stdin...");
            let mut input = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut input)
                .expect("Failed to read stdin");

            let manifest: CheckManifest =
                serde_json::from_str(&input).expect("Invalid JSON manifest");
            let operation = opguard_core::types::Operation::parse(&manifest.operation)
                .expect("Unknown operation");

            let verdict = opguard_core::registry::ResourceRegistry::check(
                &manifest.record,
                operation,
                &manifest.details,
            );
            let output = match verdict {
                Ok(()) => serde_json::json!({ "ok": true }),
                Err(e) => serde_json::json!({ "ok": false, "error": e.to_string() }),
            };

            println!("{}", serde_json::to_string_pretty(&output).unwrap());
        }
        Commands::Version => {
            println!("opguard {}", env!("CARGO_PKG_VERSION"));
            println!("Exclusive-operation lease kernel for ERP records");
        }
    }
}
