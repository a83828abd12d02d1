//! The unit of streaming between the service and a store.

use bytes::Bytes;

use crate::traits::StorageError;

/// A bounded byte buffer travelling through a streaming channel, plus the
/// terminator and error markers. Each chunk makes a single traversal; the
/// payload is an owned copy so producers may reuse their read buffers.
#[derive(Debug)]
pub struct Chunk {
    pub bytes: Bytes,
    pub is_final: bool,
    pub err: Option<StorageError>,
}

impl Chunk {
    /// A payload-carrying chunk.
    pub fn data(bytes: Bytes) -> Self {
        Chunk {
            bytes,
            is_final: false,
            err: None,
        }
    }

    /// The empty chunk that ends a successful stream.
    pub fn terminator() -> Self {
        Chunk {
            bytes: Bytes::new(),
            is_final: true,
            err: None,
        }
    }

    /// A final chunk signalling that the stream broke.
    pub fn failed(err: StorageError) -> Self {
        Chunk {
            bytes: Bytes::new(),
            is_final: true,
            err: Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminator_is_empty_and_final() {
        let chunk = Chunk::terminator();
        assert!(chunk.is_final);
        assert!(chunk.bytes.is_empty());
        assert!(chunk.err.is_none());
    }

    #[test]
    fn failed_chunk_is_final_and_carries_error() {
        let chunk = Chunk::failed(StorageError::NotFound("xyz".into()));
        assert!(chunk.is_final);
        assert!(chunk.err.is_some());
    }
}
