// ===== Types and Structures =====

use core::fmt;

use crate::sdi::DataStatus;

/// Failures surfaced by one SDI command execution. Exactly one outcome per
/// `execute` call; nothing is retried at this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdiError {
    /// The command status never reported sent/response-finished.
    CommandTimeout,
    /// The data phase made no progress before its deadline, or the
    /// transfer-finished bit never asserted.
    DataTimeout { bytes_remaining: usize },
    /// The controller flagged a data error mid-transfer. The whole command
    /// must be retreated; no partial bytes are returned.
    DataFault {
        status: DataStatus,
        bytes_remaining: usize,
    },
    /// Request rejected before any register was touched.
    InvalidConfig(&'static str),
}

impl fmt::Display for SdiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdiError::CommandTimeout => write!(f, "Command timeout error"),
            SdiError::DataTimeout { bytes_remaining } => {
                write!(f, "Data timeout error ({} bytes left)", bytes_remaining)
            }
            SdiError::DataFault {
                status,
                bytes_remaining,
            } => write!(
                f,
                "Data error (status 0x{:X}, {} bytes left)",
                status.bits(),
                bytes_remaining
            ),
            SdiError::InvalidConfig(reason) => write!(f, "Invalid configuration: {}", reason),
        }
    }
}

/// Fatal device bring-up failures. There is no degraded mode: any of these
/// aborts the whole board init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeError {
    /// No node with a matching compatible string.
    MissingNode(&'static str),
    /// The node lacks a usable `reg` property.
    MissingReg,
    /// The upstream clock resolved to a zero rate.
    ClockUnavailable,
    /// A pin reference is outside the bank/pin range.
    InvalidPin,
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::MissingNode(compatible) => {
                write!(f, "No node compatible with \"{}\"", compatible)
            }
            ProbeError::MissingReg => write!(f, "Node has no usable reg entry"),
            ProbeError::ClockUnavailable => write!(f, "Upstream clock unavailable"),
            ProbeError::InvalidPin => write!(f, "Pin reference out of range"),
        }
    }
}
