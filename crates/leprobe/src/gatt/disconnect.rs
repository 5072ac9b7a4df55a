//! Session termination reasons and their classification

use std::fmt;

/// Why a GATT session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// Orderly close requested by us or by the peer
    ConnectionClosed,
    ConnectionFailed,
    UnexpectedError,
    /// The peer sent a PDU that does not answer the outstanding request
    UnexpectedResponse,
    WriteError,
    ReadError,
    /// A configured connect or session timeout expired
    Timeout,
}

impl DisconnectReason {
    pub fn description(&self) -> &'static str {
        match self {
            DisconnectReason::ConnectionClosed => "Connection closed",
            DisconnectReason::ConnectionFailed => "Connection failed",
            DisconnectReason::UnexpectedError => "Unexpected error",
            DisconnectReason::UnexpectedResponse => "Unexpected response",
            DisconnectReason::WriteError => "Write error",
            DisconnectReason::ReadError => "Read error",
            DisconnectReason::Timeout => "Timed out",
        }
    }
}

/// A session termination, produced once per session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub reason: DisconnectReason,
    /// OS or protocol level detail, when there is one
    pub detail: Option<String>,
}

impl Disconnect {
    pub fn new(reason: DisconnectReason) -> Self {
        Self {
            reason,
            detail: None,
        }
    }

    pub fn with_detail(reason: DisconnectReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: Some(detail.into()),
        }
    }

    /// Disconnect carrying the text of an I/O error, without the errno suffix
    pub fn from_io(reason: DisconnectReason, err: &std::io::Error) -> Self {
        let text = err.to_string();
        let detail = match text.find(" (os error") {
            Some(at) => text[..at].to_string(),
            None => text,
        };
        Self::with_detail(reason, detail)
    }

    pub fn classify(&self) -> DisconnectClass {
        classify(self)
    }
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.reason.description(), detail),
            None => f.write_str(self.reason.description()),
        }
    }
}

/// Whether a termination was the normal end of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectClass {
    Normal,
    Error(String),
}

impl DisconnectClass {
    pub fn is_error(&self) -> bool {
        matches!(self, DisconnectClass::Error(_))
    }
}

/// Only an orderly close is normal; every other reason is an error
pub fn classify(disconnect: &Disconnect) -> DisconnectClass {
    match disconnect.reason {
        DisconnectReason::ConnectionClosed => DisconnectClass::Normal,
        _ => DisconnectClass::Error(disconnect.to_string()),
    }
}
