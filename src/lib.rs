//! Transaction lifecycle engine for a currency exchange intermediary.
//!
//! Users ask to buy or sell foreign currency, attach payment proofs, and
//! administrators move each request through its states. See [`ExchangeDesk`].

mod desk;

pub use desk::*;
