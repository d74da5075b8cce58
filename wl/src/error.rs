use std::io;

/// Failures surfaced by the runtime.
///
/// Operations on a wrapper that has become inert are not errors; they are
/// silent no-ops and never produce one of these.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The handle is null, unknown, or already bound to another wrapper.
    #[error("invalid object handle {0}")]
    InvalidHandle(u32),

    /// The transport has no free object handle left.
    #[error("no free object handles left")]
    ResourceExhausted,

    /// A request was sent with arguments that do not match its signature.
    #[error("{interface}.{message}: {reason}")]
    InvalidArgument {
        interface: &'static str,
        message: &'static str,
        reason: String,
    },

    /// The request is newer than the version the object was created with.
    #[error("{interface}.{message} needs version {since}, object has version {version}")]
    UnsupportedVersion {
        interface: &'static str,
        message: &'static str,
        since: u32,
        version: u32,
    },

    /// An inbound message could not be decoded against its descriptor.
    #[error("protocol violation on object {object}, opcode {opcode}: {reason}")]
    ProtocolViolation { object: u32, opcode: u16, reason: String },

    /// The peer reported a fatal error through `wl_display.error`.
    #[error("server error on object {object}, code {code}: {message}")]
    Server { object: u32, code: u32, message: String },

    /// A descriptor carries a malformed signature string.
    #[error("bad signature {signature:?}: {reason}")]
    InvalidSignature {
        signature: &'static str,
        reason: &'static str,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
