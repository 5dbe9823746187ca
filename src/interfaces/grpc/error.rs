use crate::error::{Error, ErrorKind};
use tonic::{Code, Status};
use tracing::error;

/// gRPC code for every error kind a service can return.
pub fn code_for(kind: ErrorKind) -> Code {
    match kind {
        ErrorKind::AlreadyExists | ErrorKind::AlreadyOpen => Code::AlreadyExists,
        ErrorKind::NotFound => Code::NotFound,
        ErrorKind::UserNotFound | ErrorKind::InvalidCredentials | ErrorKind::InvalidToken => {
            Code::Unauthenticated
        }
        ErrorKind::InvalidRole | ErrorKind::InvalidCity => Code::InvalidArgument,
        ErrorKind::AllReceptionsClosed | ErrorKind::ReceptionEmpty => Code::FailedPrecondition,
        ErrorKind::Cancelled => Code::Unavailable,
        ErrorKind::Unexpected => Code::Internal,
    }
}

/// Renders a service error as a status, hiding the detail of unexpected ones.
pub fn status_from(err: Error) -> Status {
    let kind = err.kind();
    let message = match kind {
        ErrorKind::Unexpected => {
            error!(error = %err, "rpc failed");
            "internal server error".to_owned()
        }
        _ => err.to_string(),
    };
    Status::new(code_for(kind), message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn test_business_errors_keep_their_message() {
        let status = status_from(Error::AlreadyOpen);
        assert_eq!(status.code(), Code::AlreadyExists);
        assert_eq!(status.message(), "reception already open");
    }

    #[test]
    fn test_unexpected_errors_are_redacted() {
        let status = status_from(Error::storage("list pickup points")(StoreError::Backend(
            "relation \"pvz\" does not exist".to_owned(),
        )));
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "internal server error");
    }

    #[test]
    fn test_code_mapping() {
        assert_eq!(code_for(ErrorKind::NotFound), Code::NotFound);
        assert_eq!(code_for(ErrorKind::InvalidCity), Code::InvalidArgument);
        assert_eq!(code_for(ErrorKind::ReceptionEmpty), Code::FailedPrecondition);
        assert_eq!(code_for(ErrorKind::Cancelled), Code::Unavailable);
    }
}
