//! IOU Ledger CLI
//!
//! Rebuilds net IOU balances from a contract's `Iou` event log.
//!
//! Usage:
//!   iou-ledger --contract 0x5fbd... balances --json
//!   iou-ledger query 0xf39f... 0x7099...
//!   iou-ledger position 0xf39f...
//!   iou-ledger events --from-block 100
//!   iou-ledger demo
//!
//! Environment:
//!   IOU_CONFIG_PATH - TOML config file (default: iou_config.toml)
//!   IOU_RPC_URL - JSON-RPC endpoint (default: http://127.0.0.1:8545)
//!   IOU_CONTRACT_ADDRESS - Contract emitting Iou events
//!   IOU_FROM_BLOCK / IOU_TO_BLOCK - Scan range (default: 0 .. latest)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use iou_ledger::{
    reconstruct, Address, BalanceTable, BlockTag, EventSource, IouBook, IouConfig,
    MemoryEventSource, RpcEventSource,
};

#[derive(Parser, Debug)]
#[command(name = "iou-ledger")]
#[command(about = "Reconstruct pairwise IOU balances from ledger events")]
struct Cli {
    /// TOML config file (overrides IOU_CONFIG_PATH)
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON-RPC endpoint
    #[arg(long)]
    rpc_url: Option<String>,

    /// Contract emitting Iou events
    #[arg(long)]
    contract: Option<String>,

    /// First block to scan
    #[arg(long)]
    from_block: Option<u64>,

    /// Last block to scan ("latest" or a number)
    #[arg(long)]
    to_block: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every pair with a non-zero balance
    Balances {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Net amount A owes B (negative: B owes A)
    Query { a: String, b: String },

    /// Net position of one address across all counterparties
    Position { address: String },

    /// List decoded transfers in chronological order
    Events {
        #[arg(long)]
        json: bool,
    },

    /// Replay the reference IOU sequence against an in-memory ledger
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive("iou_ledger=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Balances { json } => {
            let (config, contract, source) = connect(&cli)?;
            let table = reconstruct(&source, &contract, config.range()).await?;
            print_balances(&table, *json)?;
        }
        Commands::Query { a, b } => {
            let a: Address = a.parse()?;
            let b: Address = b.parse()?;
            let (config, contract, source) = connect(&cli)?;
            let table = reconstruct(&source, &contract, config.range()).await?;
            println!("{}", table.try_query(&a, &b)?);
        }
        Commands::Position { address } => {
            let addr: Address = address.parse()?;
            let (config, contract, source) = connect(&cli)?;
            let table = reconstruct(&source, &contract, config.range()).await?;
            for (other, balance) in table.exposures(&addr) {
                println!("{:>8}  {}", balance, other);
            }
            println!("net: {}", table.net_position(&addr));
        }
        Commands::Events { json } => {
            let (config, contract, source) = connect(&cli)?;
            let transfers = source.fetch_transfers(&contract, config.range()).await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&transfers)?);
            } else {
                for t in &transfers {
                    println!(
                        "{:>10} {:>4} {}  {} -> {}",
                        t.block_number,
                        t.log_index,
                        t.transaction_hash,
                        t.event.sender,
                        t.event.recipient
                    );
                }
                println!("{} transfers", transfers.len());
            }
        }
        Commands::Demo => run_demo().await?,
    }

    Ok(())
}

/// Resolved config, contract and RPC source for the node-backed commands.
fn connect(cli: &Cli) -> Result<(IouConfig, Address, RpcEventSource)> {
    let config = build_config(cli)?;
    config.validate().context("invalid configuration")?;
    let contract = config.contract()?;
    let source = RpcEventSource::from_config(&config)?;

    info!(
        rpc = %config.rpc_endpoint,
        contract = %contract,
        range = %config.range(),
        "Reconstructing IOU balances"
    );
    Ok((config, contract, source))
}

fn build_config(cli: &Cli) -> Result<IouConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = IouConfig::load(path)
                .with_context(|| format!("Failed to load config: {:?}", path))?;
            config.apply_env();
            config
        }
        None => IouConfig::from_env(),
    };

    if let Some(url) = &cli.rpc_url {
        config.rpc_endpoint = url.clone();
    }
    if let Some(contract) = &cli.contract {
        config.contract_address = contract.clone();
    }
    if let Some(from) = cli.from_block {
        config.from_block = from;
    }
    if let Some(to) = &cli.to_block {
        config.to_block = to.parse::<BlockTag>()?;
    }
    Ok(config)
}

fn print_balances(table: &BalanceTable, json: bool) -> Result<()> {
    let open = table.open_pairs();
    if json {
        println!("{}", serde_json::to_string_pretty(&open)?);
        return Ok(());
    }

    println!("{:>44} {:>44} {:>8}", "Debtor", "Creditor", "Amount");
    println!("{}", "-".repeat(98));
    for row in &open {
        println!("{:>44} {:>44} {:>8}", row.debtor, row.creditor, row.amount);
    }
    println!(
        "\n{} events, {} pairs touched, {} open",
        table.event_count(),
        table.len(),
        open.len()
    );
    Ok(())
}

/// Submit the reference sequence one transfer at a time and rehydrate from
/// genesis after each step.
async fn run_demo() -> Result<()> {
    let contract = Address::repeat_byte(0xc0);
    let k0 = Address::repeat_byte(0x10);
    let k1 = Address::repeat_byte(0x11);
    let k2 = Address::repeat_byte(0x12);

    let source = Arc::new(MemoryEventSource::new());
    let mut book = IouBook::new(source.clone(), contract, 0);

    let steps = [(k0, k1), (k1, k2), (k0, k1), (k1, k0), (k1, k0), (k2, k1)];
    for (sender, recipient) in steps {
        source.submit_transfer(&contract, sender, recipient);
        book.sync().await?;
        let table = reconstruct(source.as_ref(), &contract, Default::default()).await?;
        anyhow::ensure!(
            &table == book.table(),
            "incremental book diverged from full rehydration"
        );
        println!(
            "{} -> {}   k0/k1 = {:>2}   k1/k2 = {:>2}",
            label(&sender, &[k0, k1, k2]),
            label(&recipient, &[k0, k1, k2]),
            table.query(&k0, &k1),
            table.query(&k1, &k2)
        );
    }
    Ok(())
}

fn label(addr: &Address, accounts: &[Address]) -> String {
    accounts
        .iter()
        .position(|a| a == addr)
        .map(|i| format!("k{}", i))
        .unwrap_or_else(|| addr.to_string())
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv::dotenv();

    // 2) Also try the crate's own .env when run from elsewhere
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_parses_without_node_options() {
        let cli = Cli::try_parse_from(["iou-ledger", "demo"]).unwrap();
        assert!(matches!(cli.command, Commands::Demo));
        assert!(cli.contract.is_none());
    }

    #[tokio::test]
    async fn test_demo_runs_against_memory_source() {
        run_demo().await.unwrap();
    }

    #[test]
    fn test_node_commands_require_contract() {
        let cli = Cli::try_parse_from([
            "iou-ledger",
            "--config",
            "/nonexistent/iou_config.toml",
            "balances",
        ])
        .unwrap();
        assert!(connect(&cli).is_err());
    }
}
