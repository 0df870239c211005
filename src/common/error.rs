use async_graphql::ErrorExtensions;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShopError {
    #[error("Database error: {message}")]
    Database { message: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Password hashing failed: {0}")]
    Password(String),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShopError {
    pub fn database(message: impl Into<String>) -> Self {
        ShopError::Database {
            message: message.into(),
        }
    }

    /// Machine-readable code exposed as `extensions.code` on GraphQL errors.
    pub fn code(&self) -> &'static str {
        match self {
            ShopError::NotFound(_) => "NOT_FOUND",
            ShopError::Validation(_) => "BAD_USER_INPUT",
            ShopError::Conflict(_) => "CONFLICT",
            ShopError::EmptyCart => "EMPTY_CART",
            _ => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl ErrorExtensions for ShopError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", self.code()))
    }
}

pub type Result<T> = std::result::Result<T, ShopError>;
