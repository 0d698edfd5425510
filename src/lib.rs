pub mod cli;
pub mod config;
pub mod engine;
pub mod fs;
pub mod hash;
pub mod ids;
pub mod logging;
pub mod output;
pub mod paths;
pub mod patch;
pub mod rebase;
pub mod repository;
pub mod storage;
pub mod user_error;

pub use cli::run;
