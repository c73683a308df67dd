//! The "session gone" predicate named in the redesign notes: a single,
//! named function any caller can use to ask "should I treat this session
//! id as no longer addressable", instead of re-deriving the check inline
//! at each call site.

use akd_domain::error::Error;

pub fn is_session_gone(err: &Error) -> bool {
    matches!(err, Error::SessionNotFound(_) | Error::SessionGone(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_not_found_is_gone() {
        assert!(is_session_gone(&Error::SessionNotFound("s1".into())));
    }

    #[test]
    fn timeout_is_not_gone() {
        assert!(!is_session_gone(&Error::Timeout("slow".into())));
    }
}
