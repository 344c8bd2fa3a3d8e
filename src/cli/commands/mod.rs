pub mod config;
pub mod cost;
pub mod generate;
pub mod serve;
