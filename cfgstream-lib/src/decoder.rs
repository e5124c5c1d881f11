//! Splits the streaming response body into config blocks.
//!
//! The server pushes one JSON document per topology change and terminates
//! each of them with [`BLOCK_DELIMITER`]. Network chunks do not line up with
//! documents, so bytes are buffered until a delimiter shows up.

/// Terminates every config document in the stream
pub const BLOCK_DELIMITER: &[u8] = b"\n\n\n\n";

/// Accumulates stream chunks and yields complete config blocks in order.
#[derive(Debug, Default)]
pub(crate) struct BlockDecoder {
    buf: Vec<u8>,
    /// Everything before this offset is known not to start a delimiter
    scanned: usize,
}

impl BlockDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a chunk received from the network
    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Remove and return the next complete block, without its delimiter.
    ///
    /// Call this repeatedly after every [`push`](Self::push); a single chunk
    /// can complete more than one block.
    pub(crate) fn next_block(&mut self) -> Option<Vec<u8>> {
        let Some(offset) = self.buf[self.scanned..]
            .windows(BLOCK_DELIMITER.len())
            .position(|window| window == BLOCK_DELIMITER)
        else {
            // The tail may hold the first bytes of a delimiter split across chunks
            self.scanned = self
                .buf
                .len()
                .saturating_sub(BLOCK_DELIMITER.len() - 1);
            return None;
        };

        let end = self.scanned + offset;
        let block = self.buf[..end].to_vec();
        self.buf.drain(..end + BLOCK_DELIMITER.len());
        self.scanned = 0;
        Some(block)
    }

    /// Bytes received after the last complete block
    pub(crate) fn pending(&self) -> &[u8] {
        &self.buf
    }
}
