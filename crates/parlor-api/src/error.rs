use axum::http::StatusCode;
use parlor_types::CoreError;
use tracing::{error, warn};

/// Map an engine error onto the HTTP status the client sees.
pub fn status_for(err: CoreError) -> StatusCode {
    match err {
        CoreError::NotFound(what) => {
            warn!("Not found: {}", what);
            StatusCode::NOT_FOUND
        }
        CoreError::WrongJoinPassword => StatusCode::FORBIDDEN,
        CoreError::ChannelUnavailable(reason) => {
            warn!("Push channel unavailable: {}", reason);
            StatusCode::SERVICE_UNAVAILABLE
        }
        CoreError::ConcurrentModification => StatusCode::CONFLICT,
        CoreError::UnsupportedConversationKind(kind) => {
            error!("Refusing request over corrupt conversation kind '{}'", kind);
            StatusCode::INTERNAL_SERVER_ERROR
        }
        CoreError::Storage(e) => {
            error!("Storage failure: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        assert_eq!(status_for(CoreError::not_found("x")), StatusCode::NOT_FOUND);
        assert_eq!(status_for(CoreError::WrongJoinPassword), StatusCode::FORBIDDEN);
        assert_eq!(
            status_for(CoreError::ChannelUnavailable("down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_for(CoreError::ConcurrentModification), StatusCode::CONFLICT);
        assert_eq!(
            status_for(CoreError::UnsupportedConversationKind("bot".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
