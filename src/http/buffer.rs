//! Growable response buffer with recoverable capacity failures

use bytes::Bytes;

use crate::error::TransferError;

/// Accumulates a response body chunk by chunk
///
/// Growth is bounded by a size cap, and a failed allocation is reported as
/// [`TransferError::Allocation`] instead of aborting the process.
#[derive(Debug)]
pub struct ResponseBuffer {
    data: Vec<u8>,
    limit: usize,
}

impl ResponseBuffer {
    /// Create an empty buffer that refuses to grow past `limit` bytes
    pub fn with_limit(limit: usize) -> Self {
        Self { data: Vec::new(), limit }
    }

    /// Reserve room for `additional` more bytes
    ///
    /// # Errors
    ///
    /// - `ResponseTooLarge` if the cap would be exceeded
    /// - `Allocation` if the allocator refuses
    pub fn reserve(&mut self, additional: usize) -> Result<(), TransferError> {
        let requested = self
            .data
            .len()
            .checked_add(additional)
            .ok_or(TransferError::Allocation { requested: usize::MAX })?;

        if requested > self.limit {
            return Err(TransferError::ResponseTooLarge { limit: self.limit });
        }

        self.data
            .try_reserve(additional)
            .map_err(|_| TransferError::Allocation { requested })
    }

    /// Append a received chunk
    pub fn append(&mut self, chunk: &[u8]) -> Result<(), TransferError> {
        self.reserve(chunk.len())?;
        self.data.extend_from_slice(chunk);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Finish accumulation
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.data)
    }
}
