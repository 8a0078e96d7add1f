use clap::{Parser, Subcommand};
use slotkeeper_database::ContentType;
use std::path::PathBuf;

/// Manage numbered audio slot folders on a storage card and the JSON sidecar
/// describing them.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(long, short, global = true, env = "SLOTKEEPER_CONFIG")]
    pub config: Option<PathBuf>,
    /// Store root holding the slot folders; overrides `store.root`.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
    /// Sidecar database file; overrides `store.database`.
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every slot with its sync status.
    List {
        /// Don't repair fingerprints of slots edited outside the tool first.
        #[arg(long)]
        no_heal: bool,
    },
    /// Check every slot against the database without changing anything.
    Verify,
    /// Repair fingerprints of registered slots that changed on disk.
    Sync,
    /// Print the next free slot number.
    Next,
    /// Copy (or convert) audio into a slot.
    Add {
        /// An audio file, or a folder of audio files.
        source: PathBuf,
        /// Content name shown for the slot.
        #[arg(long, short)]
        name: String,
        /// audiobook, album, story or single.
        #[arg(long = "type", short = 't')]
        content_type: ContentType,
        /// Target slot (1-99); defaults to the next free one.
        #[arg(long, short)]
        slot: Option<u32>,
        /// Activation secret for protected (.aax) audio.
        #[arg(long)]
        secret: Option<String>,
        /// Replace an occupied slot without asking.
        #[arg(long, short)]
        yes: bool,
    },
    /// Remove a slot's folder and record.
    Delete {
        /// Slot number (1-99).
        slot: u32,
        /// Don't ask for confirmation.
        #[arg(long, short)]
        yes: bool,
    },
    /// Show which converter backends are installed.
    Backends,
}
