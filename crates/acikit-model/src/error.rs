use thiserror::Error;

/// Errors from the object model and its query layer.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A constraint on the model was violated (wrong parent kind,
    /// missing required field, invalid value).
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The object graph could not be rendered or a controller reply
    /// could not be interpreted.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// The operation has no meaning for this entity (e.g. pushing a
    /// read-only inventory object).
    #[error("Operation not implemented for this entity")]
    NotImplemented,

    /// A session-level failure bubbled up from the API crate.
    #[error(transparent)]
    Api(#[from] acikit_api::Error),
}

impl ModelError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}
