//! BotApiClient: `TelegramApi` over the Telegram Bot API (HTTPS + JSON).

use std::sync::atomic::{AtomicU64, Ordering};

use futures::{StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use super::{
    ApiChat, BotIdentity, DownloadParams, Message, RemoteFile, SendFileParams, TelegramApi,
    Update,
};
use crate::error::AppError;
use crate::models::profile::Profile;
use crate::models::transfer::ChatRef;

const USER_AGENT: &str = concat!("tg-transfer/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT_SECS: u64 = 30;
/// Non-upload calls are small; anything slower than this is a dead connection.
const REQUEST_TIMEOUT_SECS: u64 = 60;

pub struct BotApiClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

impl BotApiClient {
    pub fn new(profile: &Profile) -> crate::error::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS));
        if let Some(proxy) = profile.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| AppError::Config(format!("Invalid proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: profile.api_base_url().to_string(),
            token: profile.bot_token.trim().to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    fn file_url(&self, remote_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.base_url, self.token, remote_path)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> crate::error::Result<T> {
        let resp = self
            .client
            .post(self.method_url(method))
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(&body)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        log::debug!("{} -> HTTP {}", method, status);
        decode_envelope(status, &text)
    }
}

/// Decode a Bot API response body.
///
/// Separated as pub(crate) for unit testing without network.
pub(crate) fn decode_envelope<T: DeserializeOwned>(
    http_status: u16,
    body: &str,
) -> crate::error::Result<T> {
    let envelope: Envelope<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            let snippet: String = body.chars().take(200).collect();
            return Err(AppError::Api {
                code: i64::from(http_status),
                description: format!("Unexpected response ({}): {}", e, snippet),
            });
        }
    };

    if envelope.ok {
        return envelope.result.ok_or_else(|| AppError::Api {
            code: i64::from(http_status),
            description: "Response is missing 'result'".into(),
        });
    }

    let code = envelope.error_code.unwrap_or(i64::from(http_status));
    let retry_after = envelope.parameters.and_then(|p| p.retry_after);
    if code == 429 || retry_after.is_some() {
        return Err(AppError::RateLimited {
            retry_after: retry_after.unwrap_or(1),
        });
    }
    Err(AppError::Api {
        code,
        description: envelope
            .description
            .unwrap_or_else(|| "Unknown error".into()),
    })
}

impl TelegramApi for BotApiClient {
    async fn get_me(&self) -> crate::error::Result<BotIdentity> {
        self.call("getMe", json!({})).await
    }

    async fn send_file(&self, params: SendFileParams) -> crate::error::Result<Message> {
        params.progress.store(0, Ordering::Relaxed);

        let file = tokio::fs::File::open(&params.path).await?;
        let length = file.metadata().await?.len();
        let counter = params.progress.clone();
        let stream = ReaderStream::with_capacity(file, params.chunk_size.max(1)).inspect_ok(
            move |bytes| {
                counter.fetch_add(bytes.len() as u64, Ordering::Relaxed);
            },
        );
        let part = reqwest::multipart::Part::stream_with_length(
            reqwest::Body::wrap_stream(stream),
            length,
        )
        .file_name(params.file_name.clone());

        let kind = params.kind;
        let mut form = reqwest::multipart::Form::new()
            .text("chat_id", params.chat.to_string())
            .part(kind.field(), part);
        if let Some(caption) = params.caption.filter(|c| !c.is_empty()) {
            if kind.supports_caption() {
                form = form.text("caption", caption);
            }
        }
        if params.silent {
            form = form.text("disable_notification", "true");
        }
        if params.protect {
            form = form.text("protect_content", "true");
        }
        if params.spoiler && kind.supports_spoiler() {
            form = form.text("has_spoiler", "true");
        }
        if let Some(thumb) = params.thumbnail.filter(|_| kind.supports_thumbnail()) {
            let data = tokio::fs::read(&thumb).await?;
            let name = thumb
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("thumb.jpg")
                .to_string();
            form = form.part(
                "thumbnail",
                reqwest::multipart::Part::bytes(data).file_name(name),
            );
        }

        let resp = self
            .client
            .post(self.method_url(kind.method()))
            .multipart(form)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let value: serde_json::Value = decode_envelope(status, &text)?;
        Message::from_value(&value)
    }

    async fn copy_message(
        &self,
        to: &ChatRef,
        from: &ChatRef,
        message_id: i64,
        silent: bool,
    ) -> crate::error::Result<i64> {
        let value: serde_json::Value = self
            .call(
                "copyMessage",
                json!({
                    "chat_id": to.to_string(),
                    "from_chat_id": from.to_string(),
                    "message_id": message_id,
                    "disable_notification": silent,
                }),
            )
            .await?;
        value["message_id"]
            .as_i64()
            .ok_or_else(|| AppError::Internal(format!("copyMessage returned {}", value)))
    }

    async fn forward_message(
        &self,
        to: &ChatRef,
        from: &ChatRef,
        message_id: i64,
    ) -> crate::error::Result<Message> {
        let value: serde_json::Value = self
            .call(
                "forwardMessage",
                json!({
                    "chat_id": to.to_string(),
                    "from_chat_id": from.to_string(),
                    "message_id": message_id,
                    "disable_notification": true,
                }),
            )
            .await?;
        Message::from_value(&value)
    }

    async fn delete_message(&self, chat: &ChatRef, message_id: i64) -> crate::error::Result<()> {
        let _: bool = self
            .call(
                "deleteMessage",
                json!({"chat_id": chat.to_string(), "message_id": message_id}),
            )
            .await?;
        Ok(())
    }

    async fn get_updates(&self, offset: i64, limit: u32) -> crate::error::Result<Vec<Update>> {
        let values: Vec<serde_json::Value> = self
            .call(
                "getUpdates",
                json!({"offset": offset, "limit": limit, "timeout": 0}),
            )
            .await?;
        Ok(values.iter().filter_map(Update::from_value).collect())
    }

    async fn get_chat(&self, chat: &ChatRef) -> crate::error::Result<ApiChat> {
        self.call("getChat", json!({"chat_id": chat.to_string()}))
            .await
    }

    async fn get_chat_member_count(&self, chat: &ChatRef) -> crate::error::Result<u64> {
        self.call("getChatMemberCount", json!({"chat_id": chat.to_string()}))
            .await
    }

    async fn get_file(&self, file_id: &str) -> crate::error::Result<RemoteFile> {
        self.call("getFile", json!({"file_id": file_id})).await
    }

    async fn download_file(&self, params: DownloadParams) -> crate::error::Result<u64> {
        params.progress.store(0, Ordering::Relaxed);
        let resp = self.client.get(self.file_url(&params.remote_path)).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Api {
                code: i64::from(status.as_u16()),
                description: format!("File download failed: {}", status),
            });
        }

        save_stream(
            resp.bytes_stream(),
            &params.dest,
            params.chunk_size,
            &params.progress,
        )
        .await
    }
}

/// Write `body` to `<dest>.part` and rename it to `dest` once complete.
/// The partial file is removed on any failure.
pub(crate) async fn save_stream<S, B, E>(
    body: S,
    dest: &std::path::Path,
    chunk_size: usize,
    progress: &AtomicU64,
) -> crate::error::Result<u64>
where
    S: futures::Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    AppError: From<E>,
{
    let mut body = std::pin::pin!(body);
    let tmp = partial_path(dest);
    let result = async {
        let file = tokio::fs::File::create(&tmp).await?;
        let mut out = tokio::io::BufWriter::with_capacity(chunk_size.max(1), file);
        let mut written: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            let chunk = chunk.as_ref();
            out.write_all(chunk).await?;
            written += chunk.len() as u64;
            progress.fetch_add(chunk.len() as u64, Ordering::Relaxed);
        }
        out.flush().await?;
        drop(out);
        tokio::fs::rename(&tmp, dest).await?;
        Ok::<u64, AppError>(written)
    }
    .await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}

/// `<dest>.part`, where an in-flight download is written before the final rename.
pub(crate) fn partial_path(dest: &std::path::Path) -> std::path::PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Lightweight connectivity check against the Bot API server.
///
/// Sends an HTTP HEAD request with a 5-second timeout. Returns `true` if the
/// server responds (any HTTP status), `false` if the request fails.
pub async fn check_connectivity(base_url: &str) -> bool {
    let client = match reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
    {
        Ok(c) => c,
        Err(_) => return false,
    };
    client.head(base_url).send().await.is_ok()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    const TOKEN: &str = "123456789:AAH-abcdefghijklmnopqrstuvwxyz_0123";

    #[test]
    fn decode_ok_result() {
        let me: BotIdentity = decode_envelope(
            200,
            r#"{"ok":true,"result":{"id":1,"is_bot":true,"first_name":"Up","username":"up_bot"}}"#,
        )
        .unwrap();
        assert_eq!(me.id, 1);
        assert_eq!(me.username.as_deref(), Some("up_bot"));
    }

    #[test]
    fn decode_rate_limit() {
        let err = decode_envelope::<bool>(
            429,
            r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 35","parameters":{"retry_after":35}}"#,
        )
        .unwrap_err();
        match err {
            AppError::RateLimited { retry_after } => assert_eq!(retry_after, 35),
            other => panic!("Expected AppError::RateLimited, got: {:?}", other),
        }
    }

    #[test]
    fn decode_rate_limit_without_parameters() {
        let err = decode_envelope::<bool>(429, r#"{"ok":false,"error_code":429}"#).unwrap_err();
        assert!(matches!(err, AppError::RateLimited { retry_after: 1 }));
    }

    #[test]
    fn decode_api_error() {
        let err = decode_envelope::<bool>(
            400,
            r#"{"ok":false,"error_code":400,"description":"Bad Request: message to copy not found"}"#,
        )
        .unwrap_err();
        match err {
            AppError::Api { code, description } => {
                assert_eq!(code, 400);
                assert!(description.contains("not found"));
            }
            other => panic!("Expected AppError::Api, got: {:?}", other),
        }
    }

    #[test]
    fn decode_non_json_body_uses_http_status() {
        let err = decode_envelope::<bool>(502, "<html>Bad Gateway</html>").unwrap_err();
        assert!(err.is_server_error(), "got: {:?}", err);
    }

    #[test]
    fn decode_missing_result() {
        let err = decode_envelope::<bool>(200, r#"{"ok":true}"#).unwrap_err();
        assert!(err.to_string().contains("missing 'result'"));
    }

    #[test]
    fn urls_embed_token() {
        let client = BotApiClient::new(&Profile::new(TOKEN)).unwrap();
        assert_eq!(
            client.method_url("getMe"),
            format!("https://api.telegram.org/bot{}/getMe", TOKEN)
        );
        assert_eq!(
            client.file_url("documents/file_1.zip"),
            format!(
                "https://api.telegram.org/file/bot{}/documents/file_1.zip",
                TOKEN
            )
        );
    }

    #[test]
    fn invalid_proxy_is_config_error() {
        let mut profile = Profile::new(TOKEN);
        profile.proxy = Some("::not a url::".into());
        assert!(matches!(
            BotApiClient::new(&profile),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/d/a.zip")),
            Path::new("/d/a.zip.part")
        );
    }

    #[tokio::test]
    async fn save_stream_renames_when_complete() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.bin");
        let progress = AtomicU64::new(0);
        let body = futures::stream::iter(vec![
            Ok::<_, std::io::Error>(b"abc".to_vec()),
            Ok(b"de".to_vec()),
        ]);

        let written = save_stream(body, &dest, 4, &progress).await.unwrap();
        assert_eq!(written, 5);
        assert_eq!(progress.load(Ordering::Relaxed), 5);
        assert_eq!(std::fs::read(&dest).unwrap(), b"abcde");
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn save_stream_removes_partial_file_on_stream_error() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.bin");
        let body = futures::stream::iter(vec![
            Ok(b"abc".to_vec()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ]);

        assert!(save_stream(body, &dest, 4, &AtomicU64::new(0)).await.is_err());
        assert!(!partial_path(&dest).exists());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn save_stream_removes_partial_file_when_rename_fails() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory at the destination makes the rename fail.
        let dest = dir.path().join("taken");
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("inner"), "x").unwrap();
        let body = futures::stream::iter(vec![Ok::<_, std::io::Error>(b"abc".to_vec())]);

        assert!(save_stream(body, &dest, 4, &AtomicU64::new(0)).await.is_err());
        assert!(!partial_path(&dest).exists());
    }
}
