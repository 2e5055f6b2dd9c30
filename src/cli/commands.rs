//! CLI command handler

use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use tokio::signal;
use tracing::warn;

use super::Cli;
use crate::export::{WorkerPool, YoutubeDl};
use crate::openwhyd::OpenwhydClient;

/// Fetch the user's tracks and run them through the download pool
pub async fn export(cli: Cli) -> Result<()> {
    let client = OpenwhydClient::new(&cli.base_url)?;

    let tracks = match &cli.playlist {
        Some(playlist_id) => client.playlist_tracks(&cli.user, playlist_id).await?,
        None => client.user_tracks(&cli.user).await?,
    };

    println!(
        "{}",
        format!("Exporting {} tracks for {}", tracks.len(), cli.user).cyan()
    );

    let invoker = Arc::new(YoutubeDl::new(cli.out_dir, cli.verbose));
    let pool = WorkerPool::start(invoker, cli.parallel);

    // Ctrl-C stops the workers and kills in-flight downloads best-effort
    let cancel = pool.cancel_token();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping workers");
            cancel.cancel();
        }
    });

    let stats = pool.run(tracks).await;

    println!();
    println!("{}", "Export complete".green().bold());
    println!("  Downloaded: {}", stats.downloaded);
    println!("  Skipped:    {}", stats.skipped);
    if stats.failed > 0 {
        println!("  {}", format!("Failed:     {}", stats.failed).yellow());
    }

    Ok(())
}
