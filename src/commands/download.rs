//! Download command handler.

use std::path::PathBuf;

use clap::Args;

use crate::api::link::{parse_message_ids, parse_message_link, MessageLink};
use crate::commands::{network, with_progress, AppState};
use crate::error::AppError;
use crate::models::transfer::ChatRef;
use crate::services::{download_engine, file_tools};

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Message links such as https://t.me/name/42 or https://t.me/c/123/42.
    pub links: Vec<String>,
    /// Source chat for `--ids`.
    #[arg(long, short = 'c', requires = "ids")]
    pub chat: Option<String>,
    /// Message ids in `--chat`, e.g. `1,2,5-8`.
    #[arg(long, requires = "chat")]
    pub ids: Option<String>,
    /// Target directory; defaults to `default_download_path`.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
    /// Join downloaded `<name>.part<N>` files into `<name>`.
    #[arg(long)]
    pub combine: bool,
}

/// Every message the arguments name, links first.
pub(crate) fn targets(args: &DownloadArgs) -> crate::error::Result<Vec<MessageLink>> {
    let mut targets = args
        .links
        .iter()
        .map(|link| parse_message_link(link.as_str()))
        .collect::<crate::error::Result<Vec<_>>>()?;
    if let (Some(chat), Some(ids)) = (args.chat.as_deref(), args.ids.as_deref()) {
        let chat: ChatRef = chat.parse()?;
        targets.extend(parse_message_ids(ids)?.into_iter().map(|message_id| MessageLink {
            chat: chat.clone(),
            message_id,
        }));
    }
    if targets.is_empty() {
        return Err(AppError::InvalidInput(
            "Give message links or --chat with --ids".into(),
        ));
    }
    Ok(targets)
}

pub async fn download(args: DownloadArgs, state: &AppState) -> crate::error::Result<()> {
    let targets = targets(&args)?;
    let config = state.config()?;
    let api = network::connect(state)?;
    let ctx = state.context(config);
    let relay = download_engine::relay_chat(&ctx)?;
    let dest_dir = args
        .out
        .clone()
        .unwrap_or_else(|| download_engine::download_dir(&ctx));

    log::info!(
        "Downloading {} message(s) into {}",
        targets.len(),
        dest_dir.display()
    );
    let report = with_progress(
        &ctx,
        download_engine::download_all(&api, &ctx, &relay, &targets, &dest_dir),
    )
    .await;

    for outcome in &report.downloaded {
        println!(
            "saved  {} -> {} ({} bytes)",
            outcome.source,
            outcome.path.display(),
            outcome.file_size
        );
    }
    for failed in &report.failed {
        println!("failed {}: {}", failed.source, failed.error);
    }

    if args.combine {
        let paths: Vec<PathBuf> = report.downloaded.iter().map(|o| o.path.clone()).collect();
        for (output, parts) in file_tools::group_parts(&paths) {
            match file_tools::combine_files(&parts, &output).await {
                Ok(bytes) => println!("joined {} ({} bytes)", output.display(), bytes),
                Err(e) => log::error!("Could not join {}: {}", output.display(), e),
            }
        }
    }

    if ctx.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    if !report.failed.is_empty() {
        return Err(AppError::Internal(format!(
            "{} of {} download(s) failed",
            report.failed.len(),
            targets.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(links: &[&str], chat: Option<&str>, ids: Option<&str>) -> DownloadArgs {
        DownloadArgs {
            links: links.iter().map(|s| s.to_string()).collect(),
            chat: chat.map(str::to_string),
            ids: ids.map(str::to_string),
            out: None,
            combine: false,
        }
    }

    #[test]
    fn targets_from_links_and_ids() {
        let found = targets(&args(
            &["https://t.me/c/1234/9"],
            Some("@files"),
            Some("3,1-2"),
        ))
        .unwrap();
        let rendered: Vec<String> = found
            .iter()
            .map(|t| format!("{}/{}", t.chat, t.message_id))
            .collect();
        assert_eq!(
            rendered,
            vec!["-1001234/9", "@files/3", "@files/1", "@files/2"]
        );
    }

    #[test]
    fn nothing_to_download_is_an_error() {
        assert!(targets(&args(&[], None, None)).is_err());
        assert!(targets(&args(&["https://example.com/1"], None, None)).is_err());
    }
}
