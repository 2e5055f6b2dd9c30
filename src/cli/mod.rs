//! CLI for whydl

use std::path::PathBuf;

use clap::Parser;

pub mod commands;

use crate::export::DEFAULT_POOL_SIZE;

#[derive(Parser, Debug)]
#[command(name = "whydl", about = "Export Openwhyd playlists to local audio files")]
#[command(version, author)]
pub struct Cli {
    /// Openwhyd user id (e.g. 5095275a7e91c862b2a83f49)
    #[arg(value_name = "USER_ID")]
    pub user: String,

    /// Export a single playlist instead of the whole profile
    #[arg(short, long, value_name = "PLAYLIST_ID")]
    pub playlist: Option<String>,

    /// Number of concurrent youtube-dl invocations
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
    pub parallel: usize,

    /// Directory the per-user folder tree is created under
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Openwhyd server base URL
    #[arg(long, env = "OPENWHYD_URL", default_value = "https://openwhyd.org")]
    pub base_url: String,

    /// Enable verbose logging and mirror youtube-dl output
    #[arg(short, long)]
    pub verbose: bool,
}
