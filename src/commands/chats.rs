use clap::Subcommand;

use crate::commands::{network, AppState};
use crate::models::chat::ChatKind;
use crate::models::transfer::ChatRef;
use crate::services::explorer;
use crate::storage::chats as chat_store;

#[derive(Debug, Subcommand)]
pub enum ChatsCommand {
    /// Pull new updates and add the chats they mention to the cache.
    Refresh,
    /// List cached chats.
    List {
        /// private, group, supergroup or channel.
        #[arg(long)]
        kind: Option<ChatKind>,
        /// Case-insensitive match on title or username.
        #[arg(long, short = 'q')]
        query: Option<String>,
    },
    /// Live details for one chat.
    Show { chat: String },
}

pub async fn chats(cmd: ChatsCommand, state: &AppState) -> crate::error::Result<()> {
    match cmd {
        ChatsCommand::Refresh => {
            let api = network::connect(state)?;
            let report = explorer::refresh(&api, &state.paths).await?;
            println!(
                "{} update(s), {} new chat(s), {} cached",
                report.updates, report.new_chats, report.total_chats
            );
        }
        ChatsCommand::List { kind, query } => {
            let cache = chat_store::load(&state.paths)?;
            let chats = explorer::list(&cache, kind, query.as_deref());
            if chats.is_empty() {
                println!("No chats cached; run `chats refresh` after posting to the bot");
            }
            for chat in chats {
                let username = chat
                    .username
                    .as_deref()
                    .map(|u| format!(" @{}", u))
                    .unwrap_or_default();
                println!(
                    "{:>15}  {:<10} {}{}",
                    chat.id,
                    format!("{:?}", chat.kind).to_lowercase(),
                    chat.title,
                    username
                );
            }
        }
        ChatsCommand::Show { chat } => {
            let chat: ChatRef = chat.parse()?;
            let api = network::connect(state)?;
            let details = explorer::show(&api, &chat).await?;
            println!("Id:          {}", details.summary.id);
            println!("Title:       {}", details.summary.title);
            println!("Type:        {:?}", details.summary.kind);
            if let Some(username) = &details.summary.username {
                println!("Username:    @{}", username);
            }
            if let Some(count) = details.member_count {
                println!("Members:     {}", count);
            }
            if let Some(description) = &details.description {
                println!("Description: {}", description);
            }
        }
    }
    Ok(())
}
