//! Telegram Bot API HTTP client.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bot_core::{Button, OutboundReply, ReplySender, SendError};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::BotConfig;
use crate::error::BotError;
use crate::types::{
    AnswerCallbackParams, ApiResponse, GetUpdatesParams, Message, SendMessageParams, Update, User,
};

/// Client for the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    config: BotConfig,
    connected: Arc<AtomicBool>,
}

impl TelegramClient {
    /// Connect to the Bot API and verify the token with `getMe`.
    pub async fn connect(config: BotConfig) -> Result<Self, BotError> {
        let client = Self::new(config)?;

        let me = client.get_me().await?;
        client.connected.store(true, Ordering::SeqCst);
        info!(
            "Connected to Telegram as @{}",
            me.username.as_deref().unwrap_or(&me.first_name)
        );

        Ok(client)
    }

    /// Build a client without contacting the API.
    pub fn new(config: BotConfig) -> Result<Self, BotError> {
        let http = Client::builder()
            .timeout(config.transport_timeout)
            .build()
            .map_err(BotError::Http)?;

        Ok(Self {
            http,
            config,
            connected: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Whether the last API call succeeded.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Get the bot's own user.
    pub async fn get_me(&self) -> Result<User, BotError> {
        self.call::<(), _>("getMe", None).await
    }

    /// Long-poll for updates starting at `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, BotError> {
        let params = GetUpdatesParams::new(offset, self.config.poll_timeout);
        let url = self.config.method_url("getUpdates");

        let response = self
            .http
            .post(&url)
            .timeout(self.config.poll_request_timeout())
            .json(&params)
            .send()
            .await
            .map_err(BotError::Http)?;

        self.decode(response).await
    }

    /// Send a text message with an optional inline keyboard.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        buttons: &[Vec<Button>],
    ) -> Result<Message, BotError> {
        let params = SendMessageParams::text(chat_id, text).with_keyboard(buttons);
        self.call("sendMessage", Some(params)).await
    }

    /// Send a plain text message.
    pub async fn send_text(&self, chat_id: i64, text: &str) -> Result<Message, BotError> {
        self.send_message(chat_id, text, &[]).await
    }

    /// Upload a local image as a photo message.
    pub async fn send_photo(
        &self,
        chat_id: i64,
        path: &Path,
        caption: Option<&str>,
    ) -> Result<Message, BotError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo.png".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/png")
            .map_err(BotError::Http)?;

        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", part);
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }

        debug!("API call: sendPhoto ({})", path.display());

        let response = self
            .http
            .post(self.config.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(BotError::Http)?;

        self.decode(response).await
    }

    /// Acknowledge a callback query so the client stops its spinner.
    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), BotError> {
        let params = AnswerCallbackParams {
            callback_query_id: callback_query_id.to_string(),
            text: None,
        };
        let _: bool = self.call("answerCallbackQuery", Some(params)).await?;
        Ok(())
    }

    /// Get the configuration.
    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Call a Bot API method with a JSON body.
    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<P>,
    ) -> Result<R, BotError> {
        debug!("API call: {}", method);

        let mut request = self.http.post(self.config.method_url(method));
        if let Some(params) = &params {
            request = request.json(params);
        }

        let response = request.send().await.map_err(|e| {
            self.connected.store(false, Ordering::SeqCst);
            BotError::Http(e)
        })?;

        self.decode(response).await
    }

    async fn decode<R: DeserializeOwned>(&self, response: reqwest::Response) -> Result<R, BotError> {
        let status = response.status();
        let body = response.text().await.map_err(BotError::Http)?;

        let api: ApiResponse<R> = serde_json::from_str(&body).map_err(|e| {
            warn!("Undecodable API response (HTTP {}): {}", status, body);
            BotError::Json(e)
        })?;

        if !api.ok {
            return Err(BotError::Api {
                code: api.error_code.unwrap_or(i64::from(status.as_u16())),
                description: api.description.unwrap_or_default(),
            });
        }

        self.connected.store(true, Ordering::SeqCst);

        api.result.ok_or_else(|| BotError::Api {
            code: -1,
            description: "No result in response".to_string(),
        })
    }
}

#[async_trait]
impl ReplySender for TelegramClient {
    async fn send(&self, reply: &OutboundReply) -> Result<(), SendError> {
        match reply {
            OutboundReply::Text {
                chat_id,
                text,
                buttons,
            } => {
                self.send_message(*chat_id, text, buttons).await?;
            }
            OutboundReply::Photo {
                chat_id,
                path,
                caption,
            } => {
                self.send_photo(*chat_id, path, caption.as_deref()).await?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}
