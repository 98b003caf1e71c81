//! Error taxonomy for the FTX-1 bridge.
//!
//! The variants follow the failure modes the daemon actually distinguishes,
//! because each maps to a different externally visible behavior:
//!
//! | Variant | rigctl surface | effect on the session |
//! |---|---|---|
//! | [`Error::InvalidArgument`] | `RPRT -1` | none |
//! | [`Error::NotAvailable`] | `RPRT -11` | none |
//! | [`Error::Protocol`] | `RPRT -2` | none |
//! | [`Error::Timeout`] | `RPRT -2` | none |
//! | [`Error::LinkClosed`] | `RPRT -2`, then close | all sessions close |
//! | [`Error::Io`] | `RPRT -2`, then close | all sessions close |
//!
//! `Transport` covers setup failures (a port or device that cannot be
//! opened), before any session exists. `StreamClosed` is internal to the
//! audio pipeline: one side of a frame channel went away while the other
//! was still producing.

/// The error type for all bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The physical endpoint could not be opened or configured: a missing
    /// serial port, a socket that will not bind, an absent audio device.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The radio rejected a command with `?;`, or its reply did not decode
    /// as a CAT frame.
    #[error("CAT protocol error: {0}")]
    Protocol(String),

    /// A responding command produced no frame within the configured
    /// window. The link itself is still considered alive.
    #[error("response timed out")]
    Timeout,

    /// The feature is absent on the detected head configuration, e.g. the
    /// internal tuner anywhere but the Optima/SPA-1.
    #[error("not available on this head: {0}")]
    NotAvailable(String),

    /// A malformed verb, an unknown level or function name, or a value
    /// outside its range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The serial link to the radio is gone. In-flight commands fail with
    /// this, subsequent ones fail immediately, and every rigctl session
    /// closes after its next reply.
    #[error("serial link closed")]
    LinkClosed,

    /// An audio frame channel was closed while the stream was active.
    #[error("audio stream closed")]
    StreamClosed,

    /// An underlying I/O error not classified above.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the radio is unreachable for everyone,
    /// not just the caller.
    pub fn is_link_fatal(&self) -> bool {
        matches!(self, Error::LinkClosed | Error::Io(_))
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("no such port /dev/ttyUSB7".into());
        assert_eq!(e.to_string(), "transport failure: no such port /dev/ttyUSB7");
    }

    #[test]
    fn error_display_protocol() {
        let e = Error::Protocol("radio returned error response (?;)".into());
        assert_eq!(
            e.to_string(),
            "CAT protocol error: radio returned error response (?;)"
        );
    }

    #[test]
    fn error_display_timeout() {
        assert_eq!(Error::Timeout.to_string(), "response timed out");
    }

    #[test]
    fn error_display_not_available() {
        let e = Error::NotAvailable("internal tuner".into());
        assert_eq!(e.to_string(), "not available on this head: internal tuner");
    }

    #[test]
    fn error_display_invalid_argument() {
        let e = Error::InvalidArgument("power 200 W out of range".into());
        assert_eq!(e.to_string(), "invalid argument: power 200 W out of range");
    }

    #[test]
    fn error_display_link_closed() {
        assert_eq!(Error::LinkClosed.to_string(), "serial link closed");
    }

    #[test]
    fn error_display_stream_closed() {
        assert_eq!(Error::StreamClosed.to_string(), "audio stream closed");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn link_fatal_classification() {
        assert!(Error::LinkClosed.is_link_fatal());
        assert!(Error::Io(std::io::Error::other("x")).is_link_fatal());

        assert!(!Error::Timeout.is_link_fatal());
        assert!(!Error::Protocol("?;".into()).is_link_fatal());
        assert!(!Error::InvalidArgument("x".into()).is_link_fatal());
        assert!(!Error::NotAvailable("x".into()).is_link_fatal());
        assert!(!Error::Transport("x".into()).is_link_fatal());
        assert!(!Error::StreamClosed.is_link_fatal());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<Error>();
    }

    #[test]
    fn result_alias_works() {
        let ok: Result<u32> = Ok(42);
        match ok {
            Ok(val) => assert_eq!(val, 42),
            Err(_) => panic!("expected Ok"),
        }

        let err: Result<u32> = Err(Error::LinkClosed);
        assert!(err.is_err());
    }
}
