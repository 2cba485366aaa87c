use clap::Subcommand;

use crate::commands::AppState;
use crate::models::history::Direction;
use crate::storage::history;

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// Newest transfers first.
    List {
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,
    },
    Delete { id: String },
    Clear,
}

pub fn history(cmd: HistoryCommand, state: &AppState) -> crate::error::Result<()> {
    match cmd {
        HistoryCommand::List { limit } => {
            for record in history::get_all(&state.paths)?.into_iter().take(limit) {
                let arrow = match record.direction {
                    Direction::Upload => "->",
                    Direction::Download => "<-",
                };
                println!(
                    "{}  {}  {} {} {} ({} bytes)",
                    record.id,
                    record.transferred_at,
                    record.file_name,
                    arrow,
                    record.location,
                    record.file_size
                );
            }
        }
        HistoryCommand::Delete { id } => history::delete_record(&state.paths, &id)?,
        HistoryCommand::Clear => {
            history::clear(&state.paths)?;
            log::info!("History cleared");
        }
    }
    Ok(())
}
