use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] cryptofolio_core::ValidationError),

    #[error(transparent)]
    Config(#[from] cryptofolio_core::ConfigError),

    #[error(transparent)]
    Ledger(#[from] cryptofolio_core::LedgerError),

    #[error("command error: {0}")]
    Command(String),

    #[error("failed to initialise logging: {0}")]
    Logging(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Config(_) => 2,
            Self::Command(_) => 2,
            Self::Ledger(cryptofolio_core::LedgerError::Validation(_)) => 2,
            Self::Ledger(cryptofolio_core::LedgerError::Persistence(_)) => 10,
            Self::Logging(_) => 6,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptofolio_core::{LedgerError, PersistenceError, ValidationError};

    #[test]
    fn ledger_errors_split_exit_codes_by_cause() {
        let invalid = CliError::from(LedgerError::from(ValidationError::EmptyImport));
        assert_eq!(invalid.exit_code(), 2);

        let storage = CliError::from(LedgerError::from(PersistenceError::Unavailable(
            String::from("read-only"),
        )));
        assert_eq!(storage.exit_code(), 10);
    }
}
