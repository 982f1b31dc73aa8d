use std::fmt::{self, Display, Formatter};

use mason_core::{DatabaseError, Error as CoreError};

/// A `ERR_Packet` reported by the server, carrying its numeric error code and SQLSTATE.
#[derive(Debug, Clone)]
pub struct MySqlDatabaseError {
    pub(crate) code: u16,
    pub(crate) sql_state: Option<String>,
    pub(crate) message: String,
}

impl MySqlDatabaseError {
    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn sql_state(&self) -> Option<&str> {
        self.sql_state.as_deref()
    }

    /// `true` for the server error codes that indicate a statement can be retried
    /// verbatim against a fresh connection (e.g. the server is shutting down), as
    /// opposed to ones where retrying would just repeat the same failure.
    pub fn is_connection_error(&self) -> bool {
        matches!(self.code, 1053 /* ER_SERVER_SHUTDOWN */ | 2013 /* CR_SERVER_LOST */)
    }
}

impl Display for MySqlDatabaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.sql_state {
            Some(state) => write!(f, "{} ({}): {}", self.code, state, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl std::error::Error for MySqlDatabaseError {}

impl DatabaseError for MySqlDatabaseError {
    fn message(&self) -> &str {
        &self.message
    }

    fn code(&self) -> Option<&str> {
        self.sql_state.as_deref()
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }
}

impl From<MySqlDatabaseError> for CoreError {
    fn from(e: MySqlDatabaseError) -> Self {
        CoreError::Server(Box::new(e))
    }
}

pub(crate) fn protocol(msg: impl Into<String>) -> CoreError {
    CoreError::protocol(msg)
}
