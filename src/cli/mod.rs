mod args;
mod commands;
mod dispatch;
mod human;
mod json;
mod util;

pub use dispatch::run;
