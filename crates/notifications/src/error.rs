use thiserror::Error;

/// Errors raised while publishing or consuming notifications.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The channel behind the publisher was shut down.
    #[error("Notification channel closed")]
    ChannelClosed,

    /// An event could not be encoded for delivery.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A projection rejected an event.
    #[error("Projection {projection} failed: {message}")]
    Projection {
        projection: &'static str,
        message: String,
    },
}

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, NotificationError>;
