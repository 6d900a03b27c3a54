//! parley server - IRC-style chat daemon

use tracing::{error, info};

use parley_server::{bind_listener, run_tcp_accept_loop, ConfigLoader, SharedState};
use parley_utils::{init_logging_with_config, LogConfig, Result};

mod cli;

use cli::Args;

/// Run the server until Ctrl-C
async fn run_server(args: Args) -> Result<()> {
    let mut config = ConfigLoader::load_and_validate(args.config.as_deref())?;
    args.apply(&mut config);

    let listener = bind_listener(&config.listen.addr()).await?;
    let state = SharedState::new(config);

    let signal_state = state.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received");
                signal_state.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    run_tcp_accept_loop(listener, state).await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    init_logging_with_config(LogConfig::server())?;
    info!("parley server starting");

    let result = run_server(args).await;
    match &result {
        Ok(()) => info!("parley server stopped"),
        Err(e) => error!("parley server error: {}", e),
    }
    result
}
