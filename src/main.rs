use crate::cli::run;

pub mod cli;
mod config;
pub mod domain;
pub mod gateway;
pub mod http;
pub mod identify;
pub mod storage;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
