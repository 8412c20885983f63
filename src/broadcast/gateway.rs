use std::time::Duration;

use regex::Regex;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId};
use teloxide::{ApiError, RequestError};

/// The admin-captured message to fan out. Delivery uses copy-message, so
/// text and attachments alike are covered by one primitive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Draft {
    pub from_chat: ChatId,
    pub message_id: MessageId,
}

/// Tagged send failure, switched on by the engine instead of matching a
/// provider exception hierarchy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendError {
    RateLimited { retry_after: Option<Duration> },
    Forbidden { message: String },
    Network(String),
    Other(String),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::RateLimited { retry_after: Some(d) } => {
                write!(f, "rate limited, retry after {:?}", d)
            }
            SendError::RateLimited { retry_after: None } => write!(f, "rate limited"),
            SendError::Forbidden { message } => write!(f, "{}", message),
            SendError::Network(detail) => write!(f, "network error: {}", detail),
            SendError::Other(detail) => write!(f, "{}", detail),
        }
    }
}

/// The one capability the engine needs from the messaging provider.
pub trait Gateway {
    async fn send(&self, recipient: i64, draft: &Draft) -> Result<(), SendError>;
}

/// Production gateway over the Bot API.
#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        TelegramGateway { bot }
    }
}

impl Gateway for TelegramGateway {
    async fn send(&self, recipient: i64, draft: &Draft) -> Result<(), SendError> {
        match self
            .bot
            .copy_message(ChatId(recipient), draft.from_chat, draft.message_id)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => Err(classify(e)),
        }
    }
}

fn classify(error: RequestError) -> SendError {
    match error {
        RequestError::RetryAfter(secs) => SendError::RateLimited {
            retry_after: Some(secs.duration()),
        },
        RequestError::Api(ApiError::BotBlocked) => SendError::Forbidden {
            message: "bot was blocked by the user".to_string(),
        },
        RequestError::Api(ApiError::UserDeactivated) => SendError::Forbidden {
            message: "user is deactivated".to_string(),
        },
        RequestError::Api(ApiError::Unknown(text)) => {
            if let Some(seconds) = extract_retry_after(&text) {
                SendError::RateLimited {
                    retry_after: Some(Duration::from_secs(seconds)),
                }
            } else if text.contains("Forbidden") {
                SendError::Forbidden { message: text }
            } else {
                SendError::Other(text)
            }
        }
        RequestError::Api(api) => SendError::Other(api.to_string()),
        RequestError::Network(e) => SendError::Network(e.to_string()),
        other => SendError::Other(other.to_string()),
    }
}

fn extract_retry_after(error_str: &str) -> Option<u64> {
    let re = Regex::new(r"retry after (\d+)").ok()?;
    re.captures(error_str)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_retry_after_seconds() {
        assert_eq!(
            extract_retry_after("Too Many Requests: retry after 17"),
            Some(17)
        );
        assert_eq!(extract_retry_after("Forbidden: bot was blocked"), None);
    }

    #[test]
    fn unknown_forbidden_text_classifies_as_forbidden() {
        let err = classify(RequestError::Api(ApiError::Unknown(
            "Forbidden: user is deactivated".to_string(),
        )));
        assert_eq!(
            err,
            SendError::Forbidden {
                message: "Forbidden: user is deactivated".to_string()
            }
        );
    }

    #[test]
    fn unknown_flood_text_classifies_as_rate_limited() {
        let err = classify(RequestError::Api(ApiError::Unknown(
            "Too Many Requests: retry after 5".to_string(),
        )));
        assert_eq!(
            err,
            SendError::RateLimited {
                retry_after: Some(Duration::from_secs(5))
            }
        );
    }
}
