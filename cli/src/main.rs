//! ragstack — provision a cloud knowledge-base pipeline.

use clap::Parser;

use ragstack_cli::cli::Cli;
use ragstack_cli::output::json;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;
    if let Err(e) = cli.run().await {
        if json_mode {
            match json::format_error(&format!("{e:#}"), "error") {
                Ok(body) => eprintln!("{body}"),
                Err(_) => eprintln!("Error: {e:#}"),
            }
        } else {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(1);
    }
}
