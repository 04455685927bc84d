//! Telegram channel — long-polls the Bot API for updates.
//!
//! Only plain text messages are consumed; replies are sent as plain text
//! so addresses with underscores are not mangled by Markdown parsing.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse, StatusUpdate};
use crate::error::ChannelError;

/// Public Bot API endpoint.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Server-side long-poll timeout for getUpdates.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause after a failed poll before trying again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Client-side limit for every Bot API request; must outlast the long poll.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(POLL_TIMEOUT_SECS + 10);

/// Telegram channel — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    allowed_users: Vec<String>,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, allowed_users: Vec<String>) -> Result<Self, ChannelError> {
        Self::with_api_base(TELEGRAM_API_BASE, bot_token, allowed_users)
    }

    /// Create a channel against a custom Bot API server (self-hosted or testing).
    pub fn with_api_base(
        api_base: &str,
        bot_token: SecretString,
        allowed_users: Vec<String>,
    ) -> Result<Self, ChannelError> {
        Self::with_timeout(api_base, bot_token, allowed_users, REQUEST_TIMEOUT)
    }

    fn with_timeout(
        api_base: &str,
        bot_token: SecretString,
        allowed_users: Vec<String>,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            bot_token,
            allowed_users,
            api_base: api_base.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn api_url(&self, method: &str) -> String {
        method_url(&self.api_base, &self.bot_token, method)
    }

    /// Send a text message, split to fit Telegram's length limit.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            self.send_message_chunk(chat_id, &chunk).await?;
        }
        Ok(())
    }

    async fn send_message_chunk(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.without_url().to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("sendMessage returned {status}: {err}"),
            });
        }

        Ok(())
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let allowed_users = self.allowed_users.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {}", e.without_url());
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                        continue;
                    }
                };

                let data: serde_json::Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {}", e.without_url());
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                        continue;
                    }
                };

                if data.get("ok").and_then(serde_json::Value::as_bool) == Some(false) {
                    let description = data
                        .get("description")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or("unknown error");
                    tracing::warn!("Telegram getUpdates rejected: {description}");
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    continue;
                }

                for incoming in parse_updates(&data, &allowed_users, &mut offset) {
                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let chat_id = msg
            .metadata
            .get("chat_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: "No chat_id in message metadata".into(),
            })?;

        self.send_message(chat_id, &response.content).await
    }

    async fn send_status(
        &self,
        status: StatusUpdate,
        metadata: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        let Some(chat_id) = metadata.get("chat_id").and_then(|v| v.as_str()) else {
            return Ok(());
        };
        match status {
            StatusUpdate::Thinking(_) => {
                // Typing indicator is best-effort
                let _ = self
                    .client
                    .post(self.api_url("sendChatAction"))
                    .json(&serde_json::json!({
                        "chat_id": chat_id,
                        "action": "typing"
                    }))
                    .send()
                    .await;
            }
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.without_url().to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn method_url(api_base: &str, bot_token: &SecretString, method: &str) -> String {
    format!("{api_base}/bot{}/{method}", bot_token.expose_secret())
}

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

/// Turn a getUpdates payload into incoming messages.
///
/// Advances `offset` past every update seen, including skipped ones, so
/// they are not redelivered.
fn parse_updates(
    data: &serde_json::Value,
    allowed_users: &[String],
    offset: &mut i64,
) -> Vec<IncomingMessage> {
    let Some(results) = data.get("result").and_then(serde_json::Value::as_array) else {
        return Vec::new();
    };

    let mut messages = Vec::new();
    for update in results {
        if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64) {
            *offset = (*offset).max(uid + 1);
        }

        let Some(message) = update.get("message") else {
            continue;
        };

        let Some(text) = message.get("text").and_then(serde_json::Value::as_str) else {
            continue;
        };

        let from = message.get("from");
        let username = from
            .and_then(|f| f.get("username"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown");
        let user_id = from
            .and_then(|f| f.get("id"))
            .and_then(serde_json::Value::as_i64)
            .map(|id| id.to_string());

        let mut identities = vec![username];
        if let Some(ref id) = user_id {
            identities.push(id.as_str());
        }
        if !check_user_allowed(allowed_users, identities) {
            tracing::warn!(
                "Telegram: ignoring message from unauthorized user: \
                 username={username}, user_id={}",
                user_id.as_deref().unwrap_or("unknown")
            );
            continue;
        }

        let Some(chat_id) = message
            .get("chat")
            .and_then(|c| c.get("id"))
            .and_then(serde_json::Value::as_i64)
        else {
            continue;
        };

        let first_name = from
            .and_then(|f| f.get("first_name"))
            .and_then(serde_json::Value::as_str);

        let incoming = IncomingMessage::new(
            "telegram",
            user_id.as_deref().unwrap_or(username),
            text,
        )
        .with_metadata(serde_json::json!({
            "chat_id": chat_id.to_string(),
            "username": username,
        }))
        .with_user_name(first_name.unwrap_or(username));

        messages.push(incoming);
    }
    messages
}

/// Split a message into chunks of at most `max_len` characters.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;

    loop {
        let Some((hard_cut, _)) = remaining.char_indices().nth(max_len) else {
            chunks.push(remaining.to_string());
            break;
        };

        let window = &remaining[..hard_cut];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(hard_cut);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
        if remaining.is_empty() {
            break;
        }
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn channel(allowed: &[&str]) -> TelegramChannel {
        TelegramChannel::new(
            SecretString::from("123:ABC"),
            allowed.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap()
    }

    fn update(update_id: i64, username: &str, user_id: i64, text: &str) -> serde_json::Value {
        serde_json::json!({
            "update_id": update_id,
            "message": {
                "message_id": 1,
                "from": {"id": user_id, "username": username, "first_name": "Al"},
                "chat": {"id": 4242, "type": "private"},
                "text": text
            }
        })
    }

    #[test]
    fn telegram_channel_name() {
        assert_eq!(channel(&["*"]).name(), "telegram");
    }

    #[test]
    fn telegram_api_url() {
        assert_eq!(
            channel(&[]).api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    #[test]
    fn custom_api_base_trailing_slash() {
        let ch = TelegramChannel::with_api_base(
            "http://localhost:8081/",
            SecretString::from("t"),
            vec![],
        )
        .unwrap();
        assert_eq!(ch.api_url("sendMessage"), "http://localhost:8081/bott/sendMessage");
    }

    // ── User allowlist tests ────────────────────────────────────────

    fn allowed(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn telegram_user_allowed_wildcard() {
        assert!(check_user_allowed(&allowed(&["*"]), ["anyone"]));
    }

    #[test]
    fn telegram_user_allowed_specific() {
        let list = allowed(&["alice", "bob"]);
        assert!(check_user_allowed(&list, ["alice"]));
        assert!(!check_user_allowed(&list, ["eve"]));
    }

    #[test]
    fn telegram_user_denied_empty() {
        assert!(!check_user_allowed(&[], ["anyone"]));
    }

    #[test]
    fn telegram_user_exact_match_not_substring() {
        let list = allowed(&["alice"]);
        assert!(!check_user_allowed(&list, ["alice_bot"]));
        assert!(!check_user_allowed(&list, ["malice"]));
    }

    #[test]
    fn telegram_user_allowed_by_numeric_id_identity() {
        assert!(check_user_allowed(&allowed(&["123456789"]), ["unknown", "123456789"]));
    }

    #[test]
    fn telegram_user_denied_when_none_of_identities_match() {
        let list = allowed(&["alice", "987654321"]);
        assert!(!check_user_allowed(&list, ["unknown", "123456789"]));
    }

    // ── Update parsing ──────────────────────────────────────────────

    #[test]
    fn parse_updates_builds_messages_and_advances_offset() {
        let data = serde_json::json!({
            "ok": true,
            "result": [update(10, "alice", 1, "https://github.com/octocat"), update(11, "bob", 2, "torvalds")]
        });
        let mut offset = 0;

        let messages = parse_updates(&data, &["*".to_string()], &mut offset);

        assert_eq!(offset, 12);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].channel, "telegram");
        assert_eq!(messages[0].user_id, "1");
        assert_eq!(messages[0].user_name.as_deref(), Some("Al"));
        assert_eq!(messages[0].content, "https://github.com/octocat");
        assert_eq!(messages[0].metadata["chat_id"], "4242");
        assert_eq!(messages[0].metadata["username"], "alice");
        assert_eq!(messages[1].content, "torvalds");
    }

    #[test]
    fn parse_updates_skips_non_text_and_unauthorized() {
        let data = serde_json::json!({
            "ok": true,
            "result": [
                {"update_id": 5, "edited_message": {"text": "x"}},
                {"update_id": 6, "message": {"from": {"id": 1}, "chat": {"id": 1}, "sticker": {}}},
                update(7, "eve", 666, "octocat"),
                update(8, "alice", 1, "octocat")
            ]
        });
        let mut offset = 0;

        let messages = parse_updates(&data, &["alice".to_string()], &mut offset);

        assert_eq!(offset, 9);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].metadata["username"], "alice");
    }

    #[test]
    fn parse_updates_without_result_is_empty() {
        let mut offset = 3;
        let messages = parse_updates(&serde_json::json!({"ok": true}), &[], &mut offset);
        assert!(messages.is_empty());
        assert_eq!(offset, 3);
    }

    // ── Message splitting tests ─────────────────────────────────────

    #[test]
    fn split_message_short() {
        assert_eq!(split_message("Hello", 4096), vec!["Hello"]);
    }

    #[test]
    fn split_message_exact_limit() {
        let msg = "a".repeat(4096);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 4096);
    }

    #[test]
    fn split_message_over_limit_on_newline() {
        let msg = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks, vec!["a".repeat(2000), "b".repeat(3000)]);
    }

    #[test]
    fn split_message_no_good_split_point() {
        let msg = "a".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 904);
    }

    #[test]
    fn split_message_respects_char_boundaries() {
        let msg = "é".repeat(10);
        let chunks = split_message(&msg, 4);
        assert_eq!(chunks, vec!["éééé", "éééé", "éé"]);
    }

    // ── HTTP behavior ───────────────────────────────────────────────

    #[tokio::test]
    async fn respond_posts_plain_text_to_chat() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "4242",
                "text": "octo_cat@example.com"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let ch = TelegramChannel::with_api_base(&server.uri(), SecretString::from("123:ABC"), vec![])
            .unwrap();
        let msg = IncomingMessage::new("telegram", "1", "octocat")
            .with_metadata(serde_json::json!({"chat_id": "4242"}));

        ch.respond(&msg, OutgoingResponse::text("octo_cat@example.com"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn respond_reports_api_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_string("chat not found"))
            .mount(&server)
            .await;

        let ch = TelegramChannel::with_api_base(&server.uri(), SecretString::from("123:ABC"), vec![])
            .unwrap();
        let msg = IncomingMessage::new("telegram", "1", "octocat")
            .with_metadata(serde_json::json!({"chat_id": "1"}));

        let err = ch
            .respond(&msg, OutgoingResponse::text("hi"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("chat not found"), "got: {err}");
    }

    #[tokio::test]
    async fn respond_without_chat_id_fails() {
        let ch = channel(&["*"]);
        let msg = IncomingMessage::new("telegram", "user123", "hello");
        let err = ch
            .respond(&msg, OutgoingResponse::text("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::SendFailed { .. }));
    }

    #[tokio::test]
    async fn health_check_uses_get_me() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bot123:ABC/getMe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let ch = TelegramChannel::with_api_base(&server.uri(), SecretString::from("123:ABC"), vec![])
            .unwrap();
        ch.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn health_check_rejects_bad_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/botbad/getMe"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let ch = TelegramChannel::with_api_base(&server.uri(), SecretString::from("bad"), vec![])
            .unwrap();
        let err = ch.health_check().await.unwrap_err();
        assert!(matches!(err, ChannelError::StartupFailed { .. }));
    }

    #[tokio::test]
    async fn health_check_gives_up_on_stalled_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bot123:ABC/getMe"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": true}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let ch = TelegramChannel::with_timeout(
            &server.uri(),
            SecretString::from("123:ABC"),
            vec![],
            Duration::from_millis(200),
        )
        .unwrap();

        let err = tokio::time::timeout(Duration::from_secs(2), ch.health_check())
            .await
            .expect("request was not cut off by the client timeout")
            .unwrap_err();
        assert!(matches!(err, ChannelError::StartupFailed { .. }));
    }

    #[test]
    fn request_timeout_outlasts_long_poll() {
        assert!(REQUEST_TIMEOUT > Duration::from_secs(POLL_TIMEOUT_SECS));
    }

    #[tokio::test]
    async fn start_streams_polled_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": [update(1, "alice", 7, "octocat")]
            })))
            .mount(&server)
            .await;

        let ch = TelegramChannel::with_api_base(
            &server.uri(),
            SecretString::from("123:ABC"),
            vec!["*".into()],
        )
        .unwrap();
        let mut stream = ch.start().await.unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("no message within timeout")
            .expect("stream ended");
        assert_eq!(msg.content, "octocat");
        assert_eq!(msg.metadata["chat_id"], "4242");
    }
}
