//! Pre-send request checks.

use crate::logging::Logger;
use crate::types::CompletionRequest;
use crate::{Error, ErrorContext, Result, ValidationKind};

/// Reject requests the service would never accept, before any network activity.
///
/// The offending request is logged as YAML next to the error.
pub(crate) fn validate_request(request: &CompletionRequest, logger: &Logger) -> Result<()> {
    let (kind, field) = if request.messages.is_empty() {
        (ValidationKind::EmptyMessages, "request.messages")
    } else if !request.has_role(crate::types::MessageRole::System) {
        (ValidationKind::MissingSystemMessage, "request.system_messages")
    } else {
        return Ok(());
    };

    logger.error(format!(
        "{}:\n{}",
        kind,
        crate::normalize::to_yaml_string(request)
    ));
    Err(Error::validation(
        kind,
        ErrorContext::new()
            .with_field_path(field)
            .with_source("request_validator"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{Diagnostics, LogFormat, MemorySink};
    use crate::types::Message;
    use std::sync::Arc;

    fn logger() -> (Logger, MemorySink) {
        let mem = MemorySink::new("mem");
        let diag = Arc::new(
            Diagnostics::builder()
                .sink(Arc::new(mem.clone()))
                .format(LogFormat::new("{level} {message}"))
                .build(),
        );
        (Logger::new("validation", diag), mem)
    }

    #[test]
    fn empty_messages() {
        let (log, mem) = logger();
        let err = validate_request(&CompletionRequest::new("m"), &log).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationKind::EmptyMessages));
        assert!(mem
            .contents()
            .starts_with("ERROR request.messages is null or empty:\n"));
    }

    #[test]
    fn missing_system_message() {
        let (log, mem) = logger();
        let req = CompletionRequest::new("m").with_message(Message::user("hi"));
        let err = validate_request(&req, &log).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationKind::MissingSystemMessage));
        assert!(mem.contents().contains("content: hi"));
    }

    #[test]
    fn system_only_is_valid() {
        let (log, mem) = logger();
        let req = CompletionRequest::new("m").with_message(Message::system("rules"));
        assert!(validate_request(&req, &log).is_ok());
        assert_eq!(mem.contents(), "");
    }
}
