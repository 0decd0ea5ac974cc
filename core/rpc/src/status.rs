//! Translate tree errors into RPC status codes.
use tonic::Code;
use tonic::Status;

use netauth_context::Context;
use netauth_errors::Error;

/// Convert a failed operation into the [`Status`] reported to clients.
///
/// Errors without a client facing meaning are logged and reported as internal.
pub fn status(context: &Context, error: anyhow::Error) -> Status {
    let mapped = Error::find(&error)
        .and_then(|found| code_for(found).map(|code| (code, found.to_string())));
    match mapped {
        Some((code, message)) => Status::new(code, message),
        None => internal(context, error),
    }
}

fn code_for(error: &Error) -> Option<Code> {
    let code = match error {
        Error::UnknownEntity(_) | Error::UnknownGroup(_) | Error::NoSuchKey(_) => Code::NotFound,
        Error::DuplicateEntityID(_)
        | Error::DuplicateGroupName(_)
        | Error::DuplicateNumber(_)
        | Error::KeyExists(_)
        | Error::ExistingExpansion(_) => Code::AlreadyExists,
        Error::AuthorizationFailure | Error::Unauthenticated(_) => Code::Unauthenticated,
        Error::RequestorUnqualified(_) => Code::PermissionDenied,
        Error::EntityLocked(_) | Error::ReadOnly | Error::FailedPrecondition(_) => {
            Code::FailedPrecondition
        }
        Error::BadSearch(_) | Error::MalformedRequest(_) | Error::UnknownCapability(_) => {
            Code::InvalidArgument
        }
        Error::Cancelled => Code::Cancelled,
        _ => return None,
    };
    Some(code)
}

fn internal(context: &Context, error: anyhow::Error) -> Status {
    slog::error!(
        context.logger, "Request failed with an internal error";
        "error" => format!("{:#}", error),
    );
    Status::internal("internal error")
}
