//! Basic example of using the `ExchangeDesk`.
//!
//! Run with: `cargo run --example basic`

use exchange_desk::{AdminGate, DeskConfig, ExchangeDesk};
use std::io::Cursor;

fn main() {
    // Initialize logger (optional, but shows what's happening)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let users = r"id,name,family_name,country,phone,verified,id_document
100,Sara,Karimi,Iran,+989120000000,true,ids/100.jpg
200,Emre,Demir,Turkey,+905000000000,true,ids/200.jpg
";

    // Sample events as CSV: admin 1 sets rates, two users trade
    let events = r"actor,action,subject,direction,amount,unit,reference,media,size,country
1,set_rate,,buy,30,,,,,
1,set_rate,,sell,29,,,,,
1,set_bank,,,,,IR-SHEBA-0001,,,Iran
1,set_bank,,,,,TR-IBAN-0001,,,Turkey
100,request,,buy,100,foreign,,,,
1,instruct,1,,,,,,,
100,user_proof,1,,,,proofs/1.jpg,image,180000,
1,approve,1,,,,,,,
200,request,,sell,6000,local,,,,
1,instruct,2,,,,,,,
200,user_proof,2,,,,proofs/2.pdf,document,50000,
200,cancel,2,,,,,,,
";

    // Create the desk and replay
    let desk = ExchangeDesk::new(DeskConfig::new(AdminGate::new([1])));
    desk.load_users(Cursor::new(users))
        .expect("Failed to load users");
    desk.process_events(Cursor::new(events))
        .expect("Failed to replay events");

    // Export results to stdout
    println!("\n=== Final Transactions ===");
    desk.export_transactions(std::io::stdout())
        .expect("Failed to export transactions");
}
