use std::process::ExitCode;

use clap::Parser;

use leasehold::{exit::EXIT_ERROR, App, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut app = App::new(cli);
    match app.run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}
