use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("A similar alert already exists for this stock")]
    DuplicateAlert,

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Invalid(String),

    #[error("db error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        // Mongo reports unique-index violations as E11000 write errors.
        if err.to_string().contains("E11000") {
            StoreError::DuplicateAlert
        } else {
            StoreError::Database(err.to_string())
        }
    }
}

/// No usable live price for a symbol. Recoverable: the alert is retried next cycle.
#[derive(Debug, Clone, Error)]
pub enum QuoteError {
    #[error("quote unavailable for {symbol}: {reason}")]
    Unavailable { symbol: String, reason: String },
}

impl QuoteError {
    pub fn unavailable(symbol: &str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }
}

/// News could not be fetched. The digest for that user is skipped this run.
#[derive(Debug, Clone, Error)]
pub enum NewsError {
    #[error("news unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail rejected: {status} {body}")]
    Rejected { status: u16, body: String },

    #[error("mail transport error: {0}")]
    Transport(String),

    #[error("mail send timed out")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[error("render error: {0}")]
    Render(#[from] handlebars::RenderError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is missing in environment")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}
