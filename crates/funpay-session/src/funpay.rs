use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use funpay_protocol::{encode, EncodedPayload, PollAction, PollPayloadBuilder, PollRequestObject};
use funpay_types::{AccountProfile, BOT_MARKER};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE, SET_COOKIE, USER_AGENT};
use reqwest::{Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::{SessionClient, SessionError};

const RUNNER_PATH: &str = "runner/";
const ORDERS_PATH: &str = "orders/trade";
const ERROR_BODY_LIMIT: usize = 512;
const FLOOD_ERRORS: [&str; 3] = [
    "Нельзя отправлять сообщения слишком часто.",
    "You cannot send messages too frequently.",
    "Не можна надсилати повідомлення занадто часто.",
];

#[derive(Debug, Clone)]
/// Public struct `FunPaySessionConfig` used across FunPay runner components.
pub struct FunPaySessionConfig {
    pub base_url: String,
    pub golden_key: String,
    pub user_agent: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, Default)]
/// Public struct `SendMessageOptions` used across FunPay runner components.
pub struct SendMessageOptions {
    /// Send without subscribing to the chat node, so the chat stays unread.
    pub leave_as_unread: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `SentMessage` used across FunPay runner components.
pub struct SentMessage {
    pub chat_id: i64,
    /// Marketplace id of the new message; 0 when sent with `leave_as_unread`.
    pub id: i64,
    pub text: String,
}

#[derive(Debug, Default)]
struct SessionState {
    phpsessid: Option<String>,
    csrf_token: Option<String>,
    last_rate_limited_at: Option<Instant>,
    last_flood_at: Option<Instant>,
}

#[derive(Debug)]
/// Public struct `FunPaySessionClient` used across FunPay runner components.
pub struct FunPaySessionClient {
    client: reqwest::Client,
    config: FunPaySessionConfig,
    state: Mutex<SessionState>,
}

impl FunPaySessionClient {
    pub fn new(config: FunPaySessionConfig) -> Result<Self, SessionError> {
        if config.golden_key.trim().is_empty() {
            return Err(SessionError::MissingGoldenKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(config.user_agent.trim()).map_err(|e| {
                SessionError::InvalidResponse(format!("invalid user agent header: {e}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;

        Ok(Self {
            client,
            config,
            state: Mutex::new(SessionState::default()),
        })
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn url(&self, path: &str) -> String {
        let base = self.config.base_url.trim().trim_end_matches('/');
        format!("{base}/{}", path.trim_start_matches('/'))
    }

    fn cookie_header(&self) -> Result<HeaderValue, SessionError> {
        let mut cookie = format!("golden_key={}; cookie_prefs=1", self.config.golden_key.trim());
        if let Some(phpsessid) = self.lock_state().phpsessid.as_deref() {
            cookie.push_str("; PHPSESSID=");
            cookie.push_str(phpsessid);
        }
        HeaderValue::from_str(&cookie)
            .map_err(|e| SessionError::InvalidResponse(format!("invalid cookie header: {e}")))
    }

    fn csrf_token(&self) -> Result<String, SessionError> {
        self.lock_state()
            .csrf_token
            .clone()
            .ok_or(SessionError::MissingCsrfToken)
    }

    pub fn phpsessid(&self) -> Option<String> {
        self.lock_state().phpsessid.clone()
    }

    /// Stores the csrf token read from the landing page.
    pub fn apply_profile(&self, profile: &AccountProfile) {
        self.lock_state().csrf_token = Some(profile.csrf_token.clone());
    }

    pub fn last_flood_at(&self) -> Option<Instant> {
        self.lock_state().last_flood_at
    }

    /// Fetches the landing page and remembers the session cookie it sets.
    pub async fn fetch_home_page(&self) -> Result<String, SessionError> {
        let response = self
            .client
            .get(self.url(""))
            .header(COOKIE, self.cookie_header()?)
            .send()
            .await?;
        let response = self.check_status(response).await?;
        self.remember_phpsessid(response.headers());
        Ok(response.text().await?)
    }

    fn remember_phpsessid(&self, headers: &HeaderMap) {
        let phpsessid = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|cookie| {
                cookie
                    .split(';')
                    .next()
                    .and_then(|pair| pair.trim().strip_prefix("PHPSESSID="))
                    .map(str::to_string)
            });
        if let Some(phpsessid) = phpsessid {
            debug!("session cookie refreshed");
            self.lock_state().phpsessid = Some(phpsessid);
        }
    }

    async fn check_status(&self, response: Response) -> Result<Response, SessionError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::FORBIDDEN {
            return Err(SessionError::Unauthorized);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            self.lock_state().last_rate_limited_at = Some(Instant::now());
            warn!(status = status.as_u16(), "marketplace rate limited the session");
            return Err(SessionError::RateLimited);
        }
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > ERROR_BODY_LIMIT {
            let cut = (0..=ERROR_BODY_LIMIT)
                .rev()
                .find(|index| body.is_char_boundary(*index))
                .unwrap_or(0);
            body.truncate(cut);
        }
        Err(SessionError::RequestFailed {
            status: status.as_u16(),
            body,
        })
    }

    async fn post_runner(&self, payload: &EncodedPayload) -> Result<Value, SessionError> {
        let csrf_token = self.csrf_token()?;
        let response = self
            .client
            .post(self.url(RUNNER_PATH))
            .header(COOKIE, self.cookie_header()?)
            .header("x-requested-with", "XMLHttpRequest")
            .form(&payload.form_fields(&csrf_token))
            .send()
            .await?;
        let response = self.check_status(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|error| SessionError::InvalidResponse(format!("runner response: {error}")))
    }

    /// Sends a chat message through the runner endpoint's `chat_message` action.
    pub async fn send_chat_message(
        &self,
        chat_id: i64,
        text: &str,
        options: SendMessageOptions,
    ) -> Result<SentMessage, SessionError> {
        let mut builder = PollPayloadBuilder::new(1);
        if !options.leave_as_unread {
            builder.push_object(PollRequestObject::chat_history(chat_id))?;
        }
        let payload = builder
            .with_action(PollAction::chat_message(chat_id, format!("{BOT_MARKER}{text}")))
            .build();
        let encoded = encode(&payload, 1)?;
        let envelope = self.post_runner(&encoded).await?;

        let Some(response) = envelope.get("response").filter(|value| value.is_object()) else {
            return Err(SessionError::MessageNotDelivered {
                chat_id,
                reason: "empty action response".to_string(),
            });
        };
        if let Some(error) = response.get("error").and_then(Value::as_str) {
            if FLOOD_ERRORS.contains(&error) {
                self.lock_state().last_flood_at = Some(Instant::now());
            }
            return Err(SessionError::MessageNotDelivered {
                chat_id,
                reason: error.to_string(),
            });
        }

        if options.leave_as_unread {
            return Ok(SentMessage {
                chat_id,
                id: 0,
                text: text.to_string(),
            });
        }
        let id = envelope
            .pointer("/objects/0/data/messages")
            .and_then(Value::as_array)
            .and_then(|messages| messages.last())
            .and_then(|message| message.get("id"))
            .and_then(|id| {
                id.as_i64()
                    .or_else(|| id.as_str().and_then(|raw| raw.parse().ok()))
            })
            .ok_or_else(|| {
                SessionError::InvalidResponse("sent message id missing from chat node".to_string())
            })?;
        Ok(SentMessage {
            chat_id,
            id,
            text: text.to_string(),
        })
    }
}

#[async_trait]
impl SessionClient for FunPaySessionClient {
    async fn poll(&self, payload: &EncodedPayload) -> Result<Value, SessionError> {
        self.post_runner(payload).await
    }

    async fn fetch_orders_page(&self) -> Result<String, SessionError> {
        let response = self
            .client
            .get(self.url(ORDERS_PATH))
            .header(COOKIE, self.cookie_header()?)
            .send()
            .await?;
        let response = self.check_status(response).await?;
        Ok(response.text().await?)
    }

    fn last_rate_limited_at(&self) -> Option<Instant> {
        self.lock_state().last_rate_limited_at
    }
}
