pub(crate) use clap::Parser;
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "exchange-desk",
    author,
    version,
    about = "Replay exchange desk events and print the resulting transactions",
    long_about = None,
    after_help = "OUTPUT:\n    Transactions are printed to stdout in CSV format.\n    Use shell redirection to save to a file:\n\n    exchange-desk --admins 1,2 --users users.csv events.csv > transactions.csv"
)]
pub struct Args {
    /// Path to the events CSV file
    #[arg(
        index = 1,
        value_name = "FILE",
        help = "Events CSV with columns: actor, action, subject, direction, amount, unit, reference, media, size, country"
    )]
    pub events_file: PathBuf,

    /// Optional user roster to load before replaying
    #[arg(
        long,
        value_name = "FILE",
        help = "Users CSV with columns: id, name, family_name, country, phone, verified, id_document"
    )]
    pub users: Option<PathBuf>,

    /// Administrator identities
    #[arg(long, env = "EXCHANGE_DESK_ADMINS", value_delimiter = ',', required = true)]
    pub admins: Vec<i64>,

    /// Smallest quantity a user may request
    #[arg(long, default_value = "10")]
    pub min_amount: Decimal,

    /// Largest quantity a user may request
    #[arg(long, default_value = "100000")]
    pub max_amount: Decimal,

    /// Largest accepted proof upload, in bytes
    #[arg(long, default_value_t = exchange_desk::DEFAULT_MAX_PROOF_BYTES)]
    pub max_proof_bytes: u64,

    /// Require the administrator's settlement proof before approving
    #[arg(long)]
    pub require_settlement_proof: bool,
}
