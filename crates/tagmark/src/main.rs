//! Command-line surface for Tagmark.
//!
//! Every bookmark operation is sent through the core message dispatcher as an
//! envelope, the same way any other UI surface talks to the storage core.

/// CLI module - argument parsing and command execution
mod cli;

#[tokio::main]
async fn main() {
    env_logger::init();
    std::process::exit(cli::run().await);
}
