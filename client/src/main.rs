mod camera;
mod input;
mod interp;
mod network;
mod session;
mod world;

use clap::Parser;
use log::info;
use session::FileTokenStore;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Websocket endpoint of the world server
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080/ws")]
    server: String,

    /// Display name to claim after the welcome handshake
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Path where the session token is persisted across runs
    #[arg(long, default_value = ".wildlands-token")]
    token_file: String,

    /// Reconnect attempts before giving up
    #[arg(long, default_value = "5")]
    max_reconnects: u32,

    /// Canvas width in pixels
    #[arg(short = 'w', long, default_value = "800")]
    width: usize,

    /// Canvas height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);

    let token_store = FileTokenStore::new(&args.token_file);
    let mut client = network::Client::new(
        args.server,
        Box::new(token_store),
        args.width as f32,
        args.height as f32,
    )
    .with_display_name(args.name);

    client.run_with_reconnect(args.max_reconnects).await?;

    Ok(())
}
