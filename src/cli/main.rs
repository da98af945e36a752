mod commands;

use anyhow::{ensure, Context, Result};
use commands::{Args, Parser};
use exchange_desk::{AdminGate, AmountBand, DeskConfig, ExchangeDesk};

fn main() -> Result<()> {
    // Parse the CLI arguments
    let args = Args::parse();

    // Initialize logger with default level of info (can be overridden with RUST_LOG)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    ensure!(
        args.min_amount <= args.max_amount,
        "--min-amount ({}) must not exceed --max-amount ({})",
        args.min_amount,
        args.max_amount
    );

    // 1. Build the immutable configuration and the desk
    let config = DeskConfig::new(AdminGate::new(args.admins.iter().copied()))
        .with_amount_band(AmountBand::new(args.min_amount, args.max_amount))
        .with_max_proof_bytes(args.max_proof_bytes)
        .with_settlement_proof_required(args.require_settlement_proof);
    let desk = ExchangeDesk::new(config);

    // 2. Seed the user roster
    if let Some(path) = &args.users {
        log::info!("Loading users from {}", path.display());
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open users file: {}", path.display()))?;
        desk.load_users(file).context("Failed to load users")?;
    }

    // 3. Replay the events
    log::info!("Replaying events from {}", args.events_file.display());
    let file = std::fs::File::open(&args.events_file)
        .with_context(|| format!("Failed to open events file: {}", args.events_file.display()))?;
    desk.process_events(file).context("Failed to replay events")?;

    // 4. Export the transactions to stdout
    desk.export_transactions(std::io::stdout())
        .context("Failed to export transactions to stdout")?;

    log::info!("Export complete");

    Ok(())
}
