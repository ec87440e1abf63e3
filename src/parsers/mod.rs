pub mod kraken;
pub mod star;
