use std::fmt::Display;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Unknown,

    InvalidParameter,

    InvalidHex,

    /// No attestation backend is enabled.
    ConfigurationError,

    UnsupportedTeeMode,

    /// The relay could not be reached, timed out, or answered with a bad status.
    RelayTransportError,

    /// The relay answered with an explicit `error` field.
    RelayApplicationError,

    RelayMalformedResponse,

    ExtractionIncomplete,

    /// A backend is configured but produced no quote.
    AttestationUnavailable,

    TdxAttesterGenerateQuoteFailed,

    SgxAttesterGenerateQuoteFailed,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", describe(.kind, .msg))]
pub struct Error {
    kind: ErrorKind,
    msg: Option<String>,
}

fn describe<'a>(kind: &ErrorKind, msg: &'a Option<String>) -> std::borrow::Cow<'a, str> {
    match msg {
        Some(msg) => msg.as_str().into(),
        None => format!("{:?}", kind).into(),
    }
}

impl Error {
    /// Create an Error with the specific kind
    pub fn kind(kind: ErrorKind) -> Self {
        Error { kind, msg: None }
    }

    /// Create an Error with the specific kind and message
    pub fn kind_with_msg<M>(kind: ErrorKind, msg: M) -> Self
    where
        M: Display,
    {
        Error {
            kind,
            msg: Some(msg.to_string()),
        }
    }

    /// Set kind of self to a specific kind, and return this Error.
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set message of self to a specific message, and return this Error.
    pub fn with_msg<M>(mut self, msg: M) -> Self
    where
        M: Display,
    {
        self.msg = Some(msg.to_string());
        self
    }

    /// Get kind of this Error. If kind is not set, the default value is
    /// `Unknown`.
    pub fn get_kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get a const ref msg of this Error. If msg is not set, None is returned.
    pub fn get_msg_ref(&self) -> &Option<String> {
        &self.msg
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Error {
        Error::kind_with_msg(ErrorKind::Unknown, error)
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Error {
        Error::kind_with_msg(ErrorKind::RelayTransportError, error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Error {
        Error::kind_with_msg(ErrorKind::RelayMalformedResponse, error)
    }
}

impl From<hex::FromHexError> for Error {
    fn from(error: hex::FromHexError) -> Error {
        Error::kind_with_msg(ErrorKind::InvalidHex, error)
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(error: std::num::ParseIntError) -> Error {
        Error::kind_with_msg(ErrorKind::InvalidParameter, error)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(error: tokio::task::JoinError) -> Error {
        Error::kind_with_msg(ErrorKind::Unknown, error)
    }
}

pub trait WithContext<T> {
    fn kind(self, kind: ErrorKind) -> Result<T>;

    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display;

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display,
        F: FnOnce() -> C;
}

impl<T, E> WithContext<T> for std::result::Result<T, E>
where
    Error: From<E>,
{
    fn kind(self, kind: ErrorKind) -> Result<T> {
        self.map_err(|error| Into::<Error>::into(error).with_kind(kind))
    }

    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display,
    {
        self.map_err(|error| {
            let error = Into::<Error>::into(error);
            if let Some(ref msg) = error.msg {
                let new_msg = format!("{}: {}", context, msg);
                error.with_msg(new_msg)
            } else {
                error.with_msg(context)
            }
        })
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display,
        F: FnOnce() -> C,
    {
        match self {
            Ok(t) => Ok(t),
            Err(e) => Err(e).context(f()),
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn test_context_prefixes_message() {
        let res: Result<()> = Err(Error::kind_with_msg(
            ErrorKind::RelayTransportError,
            "connection refused",
        ));
        let err = res.context("query assets").unwrap_err();
        assert_eq!(err.get_kind(), ErrorKind::RelayTransportError);
        assert_eq!(err.to_string(), "query assets: connection refused");
    }

    #[test]
    fn test_kind_overrides_converted_error() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));
        let err = res.kind(ErrorKind::SgxAttesterGenerateQuoteFailed).unwrap_err();
        assert_eq!(err.get_kind(), ErrorKind::SgxAttesterGenerateQuoteFailed);
        assert_eq!(err.get_msg_ref().as_deref(), Some("no such file"));
    }

    #[test]
    fn test_display_without_message_names_kind() {
        assert_eq!(
            Error::kind(ErrorKind::ConfigurationError).to_string(),
            "ConfigurationError"
        );
    }
}
