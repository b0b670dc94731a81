//! Unified error type for blelink.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.

/// Top-level error type used across the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A required input is missing or malformed (empty device name,
    /// zero-capacity buffer, duplicate connection handle).
    InvalidArgument,

    /// The connection table or a subscription set is full.
    CapacityExceeded,

    /// An event referenced a connection handle we do not track.
    NotFound,

    /// A push was requested while no peer is connected.
    NoConnections,

    /// The transport rejected a request.
    Platform(PlatformError),

    /// Outbound message (plus its terminator) does not fit the caller buffer.
    MessageTooLong,

    /// Inbound payload is empty or does not fit the caller buffer.
    SizeExceeded,
}

/// Subset of transport errors we propagate (keeps the enum `Copy`-friendly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlatformError {
    /// Advertising (or another exclusive GAP procedure) is already running.
    Busy,
    /// Advertising or scan-response fields exceed the 31-byte budget.
    PayloadTooLarge,
    /// No usable identity address is available.
    NoAddress,
    /// The transport refused the supplied address.
    InvalidAddress,
    /// Raw error code from the transport.
    Rejected(i32),
}

impl Error {
    /// Identity setup failures cannot be recovered from once the host has
    /// synced; the firmware halts on them.
    pub fn is_fatal_at_bringup(&self) -> bool {
        matches!(
            self,
            Error::Platform(PlatformError::NoAddress | PlatformError::InvalidAddress)
        )
    }
}

// Convenience conversions

impl From<PlatformError> for Error {
    fn from(e: PlatformError) -> Self {
        Error::Platform(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_error_converts() {
        let err: Error = PlatformError::Busy.into();
        assert_eq!(err, Error::Platform(PlatformError::Busy));
    }

    #[test]
    fn only_identity_failures_are_fatal() {
        assert!(Error::from(PlatformError::NoAddress).is_fatal_at_bringup());
        assert!(Error::from(PlatformError::InvalidAddress).is_fatal_at_bringup());
        assert!(!Error::from(PlatformError::Busy).is_fatal_at_bringup());
        assert!(!Error::from(PlatformError::Rejected(-1)).is_fatal_at_bringup());
        assert!(!Error::CapacityExceeded.is_fatal_at_bringup());
    }
}
