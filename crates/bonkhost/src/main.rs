use bonkhost::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());
    let cfg = ServerConfig::load(&config_path)?;
    tracing::info!(
        config = %config_path,
        port = cfg.port,
        room = %cfg.room_name_on_startup,
        max_players = cfg.max_players,
        "starting bonkhost"
    );

    let server = Server::start(cfg).await?;
    let room = server.room();

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, flushing chat log");
            if let Err(e) = room.save_chat_log().await {
                tracing::warn!(error = %e, "could not save chat log");
            }
        }
    }
    Ok(())
}
