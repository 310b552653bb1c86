//! The request state machine.
//!
//! Every operation call advances through an explicit finite-state machine
//! rather than ad hoc control flow. Each state declares an accept
//! transition and a fail transition; failure in a non-terminal state
//! re-enters the retry path, failure in a terminal state is unrecoverable
//! and surfaces to the caller. The driving loop lives in
//! [`Request::send`](crate::client::Request::send).

/// States of one request execution, in acceptance order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Pre-flight parameter validation; no I/O has happened yet.
    Validate,
    /// Codec builds the wire request from the operation and params.
    Build,
    /// Post-build fixups (content length, user agent).
    AfterBuild,
    /// Signer adds authentication material; may await credentials.
    Sign,
    /// Transport round-trip; the second asynchronous suspension point.
    Send,
    /// Success predicate, integrity check, redirect and abort handling.
    ValidateResponse,
    /// Decode typed data from a successful response.
    ExtractData,
    /// Decode a structured error from a failed response.
    ExtractError,
    /// Re-enters `Build` after a redirect or retry.
    Restart,
    /// Decides whether the recorded error is retryable.
    Retry,
    /// Waits out the computed backoff delay.
    AfterRetry,
    /// Terminal: data decoded.
    Success,
    /// Terminal: error recorded.
    Error,
    /// Terminal: resources released, caller notified.
    Complete,
}

impl State {
    /// The state entered when this state's handler succeeds.
    #[must_use]
    pub const fn accept(self) -> Self {
        match self {
            Self::Validate => Self::Build,
            Self::Build => Self::AfterBuild,
            Self::AfterBuild => Self::Sign,
            Self::Sign => Self::Send,
            Self::Send => Self::ValidateResponse,
            Self::ValidateResponse => Self::ExtractData,
            Self::ExtractData => Self::Success,
            Self::ExtractError => Self::Retry,
            Self::Restart => Self::Build,
            Self::Retry => Self::AfterRetry,
            Self::AfterRetry => Self::Restart,
            Self::Success | Self::Error => Self::Complete,
            Self::Complete => Self::Complete,
        }
    }

    /// The state entered when this state's handler fails.
    #[must_use]
    pub const fn fail(self) -> Self {
        match self {
            // Validation failures are local and never retried.
            Self::Validate => Self::Error,
            Self::Build | Self::AfterBuild | Self::Sign | Self::Send | Self::ExtractData => {
                Self::Retry
            }
            Self::ValidateResponse => Self::ExtractError,
            Self::ExtractError => Self::Retry,
            Self::Restart => Self::Error,
            Self::Retry | Self::AfterRetry => Self::Error,
            Self::Success | Self::Error | Self::Complete => Self::Complete,
        }
    }

    /// Terminal states cannot loop back into the retry path.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acceptance_order_reaches_success() {
        // Following accept transitions from Validate walks the documented
        // happy path.
        let mut state = State::Validate;
        let mut path = vec![state];
        while state != State::Complete {
            state = state.accept();
            path.push(state);
        }
        assert_eq!(
            path,
            vec![
                State::Validate,
                State::Build,
                State::AfterBuild,
                State::Sign,
                State::Send,
                State::ValidateResponse,
                State::ExtractData,
                State::Success,
                State::Complete,
            ]
        );
    }

    #[test]
    fn test_failures_enter_retry_path() {
        assert_eq!(State::Send.fail(), State::Retry);
        assert_eq!(State::Sign.fail(), State::Retry);
        assert_eq!(State::ExtractData.fail(), State::Retry);
        assert_eq!(State::ValidateResponse.fail(), State::ExtractError);
    }

    #[test]
    fn test_validation_failure_is_not_retried() {
        assert_eq!(State::Validate.fail(), State::Error);
    }

    #[test]
    fn test_retry_path_re_enters_build() {
        assert_eq!(State::Retry.accept(), State::AfterRetry);
        assert_eq!(State::AfterRetry.accept(), State::Restart);
        assert_eq!(State::Restart.accept(), State::Build);
    }

    #[test]
    fn test_terminal_states_only_complete() {
        for state in [State::Success, State::Error, State::Complete] {
            assert!(state.is_terminal());
            assert_eq!(state.accept(), State::Complete);
            assert_eq!(state.fail(), State::Complete);
        }
    }
}
