//! Inbound writes (peer -> us).
//!
//! Copies the payload of a characteristic write into an application
//! buffer and NUL-terminates it so it can be handed to C-string consumers
//! as-is.

use crate::error::Error;

/// Copy `payload` into `buffer` followed by a NUL. Returns the payload length.
///
/// Nothing is written on error.
pub fn ingest(payload: &[u8], buffer: &mut [u8]) -> Result<usize, Error> {
    if buffer.is_empty() {
        return Err(Error::InvalidArgument);
    }

    let len = payload.len();
    if len == 0 || len >= buffer.len() {
        debug!("[rx] rejecting {} byte payload for {} byte buffer", len, buffer.len());
        return Err(Error::SizeExceeded);
    }

    buffer[..len].copy_from_slice(payload);
    buffer[len] = 0;
    Ok(len)
}

/// [`ingest`] and view the result as text.
pub fn ingest_str<'b>(payload: &[u8], buffer: &'b mut [u8]) -> Result<&'b str, Error> {
    let len = ingest(payload, buffer)?;
    core::str::from_utf8(&buffer[..len]).map_err(|_| Error::InvalidArgument)
}
