//! Telegram Bot API sink (`sendMessage`).

use super::{DeliveryError, NotificationSink};
use std::time::Duration;
use tracing::{debug, error, info};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram rejects message texts longer than this many characters.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Bot token and destination chat.
#[derive(Clone, Default)]
pub struct Credentials {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl Credentials {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: Some(bot_token.into()),
            chat_id: Some(chat_id.into()),
        }
    }

    /// `BOT_TOKEN` / `CHAT_ID`, falling back to `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(*k))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };
        Self {
            bot_token: first(&["BOT_TOKEN", "TELEGRAM_BOT_TOKEN"]),
            chat_id: first(&["CHAT_ID", "TELEGRAM_CHAT_ID"]),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }
}

/// Delivers notifications through the Telegram Bot API.
pub struct TelegramNotifier {
    client: reqwest::blocking::Client,
    credentials: Credentials,
    api_base: String,
}

impl TelegramNotifier {
    /// Build the HTTP client. Missing credentials fail at send time, not here.
    pub fn new(credentials: Credentials) -> Result<Self, DeliveryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| DeliveryError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            credentials,
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    /// Override the API base URL (tests, proxies).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn send_chunk(&self, token: &str, chat_id: &str, text: &str) -> Result<(), DeliveryError> {
        let url = format!("{}/bot{token}/sendMessage", self.api_base);
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            // reqwest errors embed the URL, which carries the token.
            .map_err(|e| DeliveryError::Network(redact(&e.without_url().to_string(), token)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body: redact(&body, token),
            });
        }
        debug!(chars = text.chars().count(), "telegram chunk delivered");
        Ok(())
    }
}

impl NotificationSink for TelegramNotifier {
    fn send(&self, text: &str) -> Result<(), DeliveryError> {
        let (Some(token), Some(chat_id)) = (&self.credentials.bot_token, &self.credentials.chat_id)
        else {
            error!("bot credentials missing; message not delivered");
            return Err(DeliveryError::MissingCredentials);
        };

        let chunks = split_message(text, TELEGRAM_MESSAGE_LIMIT);
        for chunk in &chunks {
            self.send_chunk(token, chat_id, chunk)?;
        }
        info!(chunks = chunks.len(), "telegram message sent");
        Ok(())
    }
}

fn redact(text: &str, token: &str) -> String {
    if token.is_empty() {
        text.to_string()
    } else {
        text.replace(token, "<redacted>")
    }
}

/// Split text into chunks of at most `limit` characters, on line boundaries
/// where possible. Lines longer than the limit are hard-split.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_lookup_prefers_short_names() {
        let vars: HashMap<&str, &str> = [
            ("BOT_TOKEN", "123:abc"),
            ("TELEGRAM_BOT_TOKEN", "999:zzz"),
            ("TELEGRAM_CHAT_ID", "-10042"),
        ]
        .into_iter()
        .collect();
        let creds = Credentials::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(creds.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(creds.chat_id.as_deref(), Some("-10042"));
        assert!(creds.is_complete());
    }

    #[test]
    fn blank_values_count_as_missing() {
        let creds = Credentials::from_lookup(|k| (k == "BOT_TOKEN").then(|| "  ".to_string()));
        assert_eq!(creds.bot_token, None);
        assert!(!creds.is_complete());
    }

    #[test]
    fn debug_redacts_token() {
        let rendered = format!("{:?}", Credentials::new("123:secret", "42"));
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("42"));
    }

    #[test]
    fn missing_credentials_fail_without_network() {
        let notifier = TelegramNotifier::new(Credentials::default()).unwrap();
        assert!(matches!(
            notifier.send("hello"),
            Err(DeliveryError::MissingCredentials)
        ));
    }

    #[test]
    fn unreachable_api_is_network_error_without_token() {
        let notifier = TelegramNotifier::new(Credentials::new("123:secret", "42"))
            .unwrap()
            .with_api_base("http://127.0.0.1:9");
        match notifier.send("hello") {
            Err(DeliveryError::Network(msg)) => assert!(!msg.contains("secret")),
            other => panic!("expected network error, got {other:?}"),
        }
    }

    /// Serve `responses.len()` HTTP exchanges on a local port, one per
    /// connection, returning each request's (request line, JSON body).
    fn serve(
        responses: Vec<(u16, String)>,
    ) -> (String, std::thread::JoinHandle<Vec<(String, serde_json::Value)>>) {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                let header_end = loop {
                    let n = stream.read(&mut chunk).unwrap();
                    assert!(n > 0, "client closed before sending headers");
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        break pos + 4;
                    }
                };
                let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
                let content_length: usize = head
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse().unwrap())
                    })
                    .unwrap_or(0);
                while buf.len() < header_end + content_length {
                    let n = stream.read(&mut chunk).unwrap();
                    assert!(n > 0, "client closed mid-body");
                    buf.extend_from_slice(&chunk[..n]);
                }
                let request_line = head.lines().next().unwrap_or_default().to_string();
                let json = serde_json::from_slice(&buf[header_end..header_end + content_length])
                    .unwrap();
                requests.push((request_line, json));

                let response = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).unwrap();
            }
            requests
        });
        (base, handle)
    }

    #[test]
    fn non_success_status_is_delivery_error_without_token() {
        let (base, server) = serve(vec![(
            400,
            r#"{"ok":false,"description":"Bad Request: bot 123:secret rejected"}"#.to_string(),
        )]);
        let notifier = TelegramNotifier::new(Credentials::new("123:secret", "42"))
            .unwrap()
            .with_api_base(base);

        match notifier.send("hello") {
            Err(DeliveryError::Status { status, body }) => {
                assert_eq!(status, 400);
                assert!(!body.contains("secret"), "token leaked: {body}");
                assert!(body.contains("<redacted>"));
            }
            other => panic!("expected status error, got {other:?}"),
        }

        let requests = server.join().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].0.starts_with("POST /bot123:secret/sendMessage"));
        assert_eq!(requests[0].1["chat_id"], "42");
        assert_eq!(requests[0].1["text"], "hello");
    }

    #[test]
    fn oversized_message_is_sent_in_chunks() {
        let line = format!("{}\n", "x".repeat(20));
        let text = line.repeat(300);
        let expected = split_message(&text, TELEGRAM_MESSAGE_LIMIT);
        assert_eq!(expected.len(), 2);

        let ok = r#"{"ok":true}"#.to_string();
        let (base, server) = serve(vec![(200, ok.clone()), (200, ok)]);
        let notifier = TelegramNotifier::new(Credentials::new("123:secret", "42"))
            .unwrap()
            .with_api_base(base);
        notifier.send(&text).unwrap();

        let requests = server.join().unwrap();
        let sent: Vec<&str> = requests
            .iter()
            .map(|(_, json)| json["text"].as_str().unwrap())
            .collect();
        assert_eq!(sent, expected);
        assert!(sent
            .iter()
            .all(|t| t.chars().count() <= TELEGRAM_MESSAGE_LIMIT));
        assert_eq!(sent.concat(), text);
    }

    #[test]
    fn short_message_is_single_chunk() {
        assert_eq!(split_message("a\nb", 10), vec!["a\nb".to_string()]);
    }

    #[test]
    fn splits_on_line_boundaries() {
        let chunks = split_message("aaaa\nbbbb\ncccc", 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n".to_string(), "cccc".to_string()]);
        assert_eq!(chunks.concat(), "aaaa\nbbbb\ncccc");
    }

    #[test]
    fn hard_splits_overlong_line() {
        let chunks = split_message("₹₹₹₹₹₹₹", 3);
        assert_eq!(chunks, vec!["₹₹₹", "₹₹₹", "₹"]);
    }
}
