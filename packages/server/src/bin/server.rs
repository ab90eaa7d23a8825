//! Development relay server for the Ichiba realtime protocol.
//!
//! Admits WebSocket connections carrying `Authorization: Bearer <credential>`
//! and relays messages, typing signals and proposal updates between them.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin ichiba-server
//! cargo run --bin ichiba-server -- --host 0.0.0.0 --port 3000
//! ```

use std::sync::Arc;

use clap::Parser;

use ichiba_server::{ui::Server, usecase::RelayUseCase};
use ichiba_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "ichiba-server")]
#[command(about = "Development relay server for the Ichiba realtime channel", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(
        env!("CARGO_BIN_NAME"),
        &["ichiba_server", "tower_http"],
        "debug",
    );

    let args = Args::parse();

    let server = Server::new(Arc::new(RelayUseCase::new()));
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
