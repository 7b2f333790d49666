pub mod config;
pub mod open;
pub mod run;
pub mod stats;
