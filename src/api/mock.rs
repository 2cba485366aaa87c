//! Scriptable in-memory `TelegramApi` for service tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use super::{
    ApiChat, BotIdentity, DownloadParams, MediaRef, Message, RemoteFile, SendFileParams,
    TelegramApi, Update,
};
use crate::error::AppError;
use crate::models::transfer::{ChatRef, MediaKind};

/// What `send_file` received.
#[derive(Debug, Clone)]
pub struct SentFile {
    pub chat: String,
    pub file_name: String,
    pub kind: MediaKind,
    pub caption: Option<String>,
    pub size: u64,
}

pub struct MockApi {
    next_message_id: AtomicI64,
    pub calls: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<SentFile>>,
    pub deleted: Mutex<Vec<(String, i64)>>,
    /// Errors returned by the next `send_file` calls, in order.
    send_errors: Mutex<VecDeque<AppError>>,
    /// File names whose upload always fails.
    rejected_names: Mutex<Vec<String>>,
    /// One-shot errors for `copy_message`, keyed by source message id.
    copy_errors: Mutex<HashMap<i64, VecDeque<AppError>>>,
    /// Source messages by id, served by `forward_message`.
    messages: Mutex<HashMap<i64, serde_json::Value>>,
    /// Remote file contents by file id.
    files: Mutex<HashMap<String, Vec<u8>>>,
    updates: Mutex<Vec<serde_json::Value>>,
    chats: Mutex<HashMap<String, ApiChat>>,
}

impl Default for MockApi {
    fn default() -> Self {
        Self {
            next_message_id: AtomicI64::new(100),
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            send_errors: Mutex::new(VecDeque::new()),
            rejected_names: Mutex::new(Vec::new()),
            copy_errors: Mutex::new(HashMap::new()),
            messages: Mutex::new(HashMap::new()),
            files: Mutex::new(HashMap::new()),
            updates: Mutex::new(Vec::new()),
            chats: Mutex::new(HashMap::new()),
        }
    }
}

impl MockApi {
    pub fn fail_next_send(&self, err: AppError) {
        self.send_errors.lock().unwrap().push_back(err);
    }

    pub fn reject_file(&self, file_name: &str) {
        self.rejected_names.lock().unwrap().push(file_name.to_string());
    }

    pub fn fail_copy(&self, message_id: i64, err: AppError) {
        self.copy_errors
            .lock()
            .unwrap()
            .entry(message_id)
            .or_default()
            .push_back(err);
    }

    /// Register a source message carrying a document with the given content.
    pub fn add_document(&self, message_id: i64, file_name: Option<&str>, content: &[u8]) {
        let file_id = format!("file-{}", message_id);
        let mut document = serde_json::json!({
            "file_id": file_id,
            "file_size": content.len(),
        });
        if let Some(name) = file_name {
            document["file_name"] = serde_json::json!(name);
        }
        self.messages.lock().unwrap().insert(
            message_id,
            serde_json::json!({"message_id": message_id, "document": document}),
        );
        self.files
            .lock()
            .unwrap()
            .insert(file_id, content.to_vec());
    }

    pub fn add_text_message(&self, message_id: i64) {
        self.messages.lock().unwrap().insert(
            message_id,
            serde_json::json!({"message_id": message_id, "text": "hello"}),
        );
    }

    pub fn push_update(&self, update: serde_json::Value) {
        self.updates.lock().unwrap().push(update);
    }

    pub fn add_chat(&self, key: &str, chat: ApiChat) {
        self.chats.lock().unwrap().insert(key.to_string(), chat);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn not_found() -> AppError {
        AppError::Api {
            code: 400,
            description: "Bad Request: message to copy not found".into(),
        }
    }
}

impl TelegramApi for MockApi {
    async fn get_me(&self) -> crate::error::Result<BotIdentity> {
        self.record("getMe".into());
        Ok(BotIdentity {
            id: 7,
            first_name: "Mock".into(),
            username: Some("mock_bot".into()),
        })
    }

    async fn send_file(&self, params: SendFileParams) -> crate::error::Result<Message> {
        self.record(format!("send:{}", params.file_name));
        if let Some(err) = self.send_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        if self
            .rejected_names
            .lock()
            .unwrap()
            .contains(&params.file_name)
        {
            return Err(AppError::Api {
                code: 400,
                description: "Bad Request: file rejected".into(),
            });
        }
        let size = std::fs::metadata(&params.path)?.len();
        params.progress.store(size, Ordering::Relaxed);
        self.sent.lock().unwrap().push(SentFile {
            chat: params.chat.to_string(),
            file_name: params.file_name.clone(),
            kind: params.kind,
            caption: params.caption.clone(),
            size,
        });
        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        Ok(Message {
            message_id,
            chat_id: 1,
            media: Some(MediaRef {
                kind: params.kind,
                file_id: format!("sent-{}", message_id),
                file_name: Some(params.file_name),
                file_size: Some(size),
            }),
        })
    }

    async fn copy_message(
        &self,
        to: &ChatRef,
        from: &ChatRef,
        message_id: i64,
        _silent: bool,
    ) -> crate::error::Result<i64> {
        self.record(format!("copy:{}:{}->{}", message_id, from, to));
        let scripted = self
            .copy_errors
            .lock()
            .unwrap()
            .get_mut(&message_id)
            .and_then(|queue| queue.pop_front());
        if let Some(err) = scripted {
            return Err(err);
        }
        if !self.messages.lock().unwrap().contains_key(&message_id) {
            return Err(Self::not_found());
        }
        Ok(self.next_message_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn forward_message(
        &self,
        to: &ChatRef,
        from: &ChatRef,
        message_id: i64,
    ) -> crate::error::Result<Message> {
        self.record(format!("forward:{}:{}->{}", message_id, from, to));
        let source = self
            .messages
            .lock()
            .unwrap()
            .get(&message_id)
            .cloned()
            .ok_or_else(|| AppError::Api {
                code: 400,
                description: "Bad Request: message to forward not found".into(),
            })?;
        let mut relayed = source;
        relayed["message_id"] = serde_json::json!(self.next_message_id.fetch_add(1, Ordering::SeqCst));
        Message::from_value(&relayed)
    }

    async fn delete_message(&self, chat: &ChatRef, message_id: i64) -> crate::error::Result<()> {
        self.record(format!("delete:{}:{}", chat, message_id));
        self.deleted
            .lock()
            .unwrap()
            .push((chat.to_string(), message_id));
        Ok(())
    }

    async fn get_updates(&self, offset: i64, limit: u32) -> crate::error::Result<Vec<Update>> {
        self.record(format!("getUpdates:{}", offset));
        Ok(self
            .updates
            .lock()
            .unwrap()
            .iter()
            .filter_map(Update::from_value)
            .filter(|u| u.update_id >= offset)
            .take(limit as usize)
            .collect())
    }

    async fn get_chat(&self, chat: &ChatRef) -> crate::error::Result<ApiChat> {
        self.record(format!("getChat:{}", chat));
        self.chats
            .lock()
            .unwrap()
            .get(&chat.to_string())
            .cloned()
            .ok_or_else(|| AppError::Api {
                code: 400,
                description: "Bad Request: chat not found".into(),
            })
    }

    async fn get_chat_member_count(&self, chat: &ChatRef) -> crate::error::Result<u64> {
        self.record(format!("getChatMemberCount:{}", chat));
        Ok(3)
    }

    async fn get_file(&self, file_id: &str) -> crate::error::Result<RemoteFile> {
        self.record(format!("getFile:{}", file_id));
        let size = self
            .files
            .lock()
            .unwrap()
            .get(file_id)
            .map(|content| content.len() as u64);
        Ok(RemoteFile {
            file_id: file_id.to_string(),
            file_size: size,
            file_path: size.map(|_| file_id.to_string()),
        })
    }

    async fn download_file(&self, params: DownloadParams) -> crate::error::Result<u64> {
        self.record(format!("download:{}", params.remote_path));
        let content = self
            .files
            .lock()
            .unwrap()
            .get(&params.remote_path)
            .cloned()
            .ok_or_else(|| AppError::Api {
                code: 404,
                description: "Not Found".into(),
            })?;
        std::fs::write(&params.dest, &content)?;
        params
            .progress
            .store(content.len() as u64, Ordering::Relaxed);
        Ok(content.len() as u64)
    }
}
