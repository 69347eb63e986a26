//! Login session commands.
//!
//! Messenger sessions are imported, never created: the user exports the
//! cookies of a logged-in browser and hands them to `session import`.

use clap::Args;
use console::{style, Emoji};
use std::io::Read;
use std::path::{Path, PathBuf};

use courier_core::paths;
use courier_core::types::ThreadId;
use courier_messenger::Session;

static CHECK: Emoji = Emoji("✓", "+");
static CROSS: Emoji = Emoji("✗", "x");

/// Session command arguments.
#[derive(Args)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(clap::Subcommand)]
pub enum SessionCommand {
    /// Import a cookies JSON array exported from a logged-in browser
    Import {
        /// Read cookies from a file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Channel instance to import into
        #[arg(short, long, default_value = "messenger")]
        instance: String,
    },

    /// Check the stored session
    Check {
        /// Channel instance to check
        #[arg(short, long, default_value = "messenger")]
        instance: String,
    },
}

/// Run the session command.
pub async fn run(args: SessionArgs) -> anyhow::Result<()> {
    match args.command {
        SessionCommand::Import { file, instance } => {
            let content = match file {
                Some(path) => std::fs::read_to_string(&path)?,
                None => {
                    let mut buffer = String::new();
                    std::io::stdin().read_to_string(&mut buffer)?;
                    buffer
                }
            };

            paths::ensure_dirs(&instance)?;
            let path = paths::session_file(&instance)?;
            let account_id = import_session(&content, &path)?;

            println!(
                "{} Imported session for account {} into {}",
                style(CHECK).green(),
                account_id,
                path.display()
            );
        }

        SessionCommand::Check { instance } => {
            let path = paths::session_file(&instance)?;
            match check_session(&path) {
                Ok(account_id) => {
                    println!(
                        "{} Session valid for account {}",
                        style(CHECK).green(),
                        account_id
                    );
                }
                Err(e) => {
                    println!("{} {}", style(CROSS).red(), e);
                    anyhow::bail!("session check failed");
                }
            }
        }
    }

    Ok(())
}

/// Parses a cookie JSON array and stores it at `path`, returning the
/// account id. The login cookies are validated before anything is written.
fn import_session(content: &str, path: &Path) -> anyhow::Result<ThreadId> {
    let session = Session::parse(content)?;
    let account_id = session.account_id()?;
    session.save(path)?;
    Ok(account_id)
}

/// Loads the session at `path` and returns the account id it belongs to.
fn check_session(path: &Path) -> anyhow::Result<ThreadId> {
    let session = Session::load(path)?;
    Ok(session.account_id()?)
}
