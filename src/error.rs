use miette::Diagnostic;
use thiserror::Error;

/// Failures reported by the persistence gateway.
///
/// These never leave the application layer: services translate them into
/// [`Error`] before returning to a caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    AlreadyExists,
    #[error("no transaction bound to the request context")]
    NoTransaction,
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors returned by the identity and pickup-point services.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("already exists")]
    #[diagnostic(code(pvz::already_exists))]
    AlreadyExists,

    #[error("not found")]
    #[diagnostic(code(pvz::not_found))]
    NotFound,

    #[error("user not found")]
    #[diagnostic(code(pvz::user_not_found))]
    UserNotFound,

    #[error("invalid credentials")]
    #[diagnostic(code(pvz::invalid_credentials))]
    InvalidCredentials,

    #[error("invalid role: {0}")]
    #[diagnostic(code(pvz::invalid_role), help("accepted roles are `employee` and `moderator`"))]
    InvalidRole(String),

    #[error("invalid city: {0}")]
    #[diagnostic(code(pvz::invalid_city))]
    InvalidCity(String),

    #[error("reception already open")]
    #[diagnostic(code(pvz::already_open))]
    AlreadyOpen,

    #[error("all receptions closed")]
    #[diagnostic(code(pvz::all_receptions_closed))]
    AllReceptionsClosed,

    #[error("reception is empty")]
    #[diagnostic(code(pvz::reception_empty))]
    ReceptionEmpty,

    #[error("invalid token: {0}")]
    #[diagnostic(code(pvz::invalid_token))]
    InvalidToken(String),

    #[error("operation cancelled")]
    #[diagnostic(code(pvz::cancelled))]
    Cancelled,

    #[error("{action}: {source}")]
    #[diagnostic(code(pvz::storage))]
    Storage {
        action: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("internal error: {0}")]
    #[diagnostic(code(pvz::internal))]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The kind of an [`Error`], detached from its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AlreadyExists,
    NotFound,
    UserNotFound,
    InvalidCredentials,
    InvalidRole,
    InvalidCity,
    AlreadyOpen,
    AllReceptionsClosed,
    ReceptionEmpty,
    InvalidToken,
    Cancelled,
    Unexpected,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AlreadyExists => ErrorKind::AlreadyExists,
            Error::NotFound => ErrorKind::NotFound,
            Error::UserNotFound => ErrorKind::UserNotFound,
            Error::InvalidCredentials => ErrorKind::InvalidCredentials,
            Error::InvalidRole(_) => ErrorKind::InvalidRole,
            Error::InvalidCity(_) => ErrorKind::InvalidCity,
            Error::AlreadyOpen => ErrorKind::AlreadyOpen,
            Error::AllReceptionsClosed => ErrorKind::AllReceptionsClosed,
            Error::ReceptionEmpty => ErrorKind::ReceptionEmpty,
            Error::InvalidToken(_) => ErrorKind::InvalidToken,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Storage { .. } | Error::Internal(_) => ErrorKind::Unexpected,
        }
    }

    /// Builds a translator for a failed gateway call.
    ///
    /// `NotFound` and `AlreadyExists` become their service-level kinds, every
    /// other store failure is wrapped as an opaque storage error tagged with
    /// `action`.
    pub fn storage(action: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| match source {
            StoreError::NotFound => Error::NotFound,
            StoreError::AlreadyExists => Error::AlreadyExists,
            source => Error::Storage { action, source },
        }
    }
}

impl From<StoreError> for Error {
    fn from(source: StoreError) -> Self {
        Error::storage("storage access")(source)
    }
}
