/// Whether a failed chat delivery should cost the recipient its subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryErrorKind {
    /// Recipient blocked the bot, left, or no longer exists.
    Permanent,
    /// Rate limits, network blips, server hiccups.
    Transient,
}

/// Core error type for the watcher.
///
/// Adapter crates map their specific errors into this type so the notify cycle
/// can tell per-recipient failures apart from cycle-level ones.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("notification options unavailable: {0}")]
    ConfigUnavailable(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("delivery failed ({kind:?}): {message}")]
    Delivery {
        kind: DeliveryErrorKind,
        message: String,
    },

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn permanent_delivery(message: impl Into<String>) -> Self {
        Self::Delivery {
            kind: DeliveryErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn transient_delivery(message: impl Into<String>) -> Self {
        Self::Delivery {
            kind: DeliveryErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn is_permanent_delivery(&self) -> bool {
        matches!(
            self,
            Self::Delivery {
                kind: DeliveryErrorKind::Permanent,
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_permanent_delivery_is_permanent() {
        assert!(Error::permanent_delivery("blocked").is_permanent_delivery());
        assert!(!Error::transient_delivery("429").is_permanent_delivery());
        assert!(!Error::External("boom".into()).is_permanent_delivery());
    }
}
