//! Bounded, sequence-numbered per-session replay log.
//!
//! Invariants: `newestSequence - oldestSequence + 1 == chunkCount`; total
//! stored bytes `<= max_bytes`; chunk count `<= max_chunks`. Eviction never
//! blocks writers — it's a plain `VecDeque::pop_front` loop.

use std::collections::VecDeque;

use termstream_proto::payloads::control::CompressionType;

use crate::{config::RingBufferConfig, errors::RingBufferError};

/// One stored output chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    /// Monotonic, unique-per-session sequence number, starting at 1.
    pub sequence_number: u64,
    /// Chunk payload, possibly compressed.
    pub data: Vec<u8>,
    /// Whether `data` is compressed.
    pub compressed: bool,
    /// Compression scheme used, if any.
    pub compression_type: CompressionType,
    /// Sender's wall clock at write time, Unix milliseconds.
    pub timestamp_ms: u64,
}

/// Aggregate counters over the buffer's current contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingBufferStatistics {
    /// Number of chunks currently stored.
    pub chunk_count: usize,
    /// Total bytes currently stored across all chunks.
    pub total_bytes: usize,
    /// Oldest sequence number stored, if non-empty.
    pub oldest_sequence: Option<u64>,
    /// Newest sequence number stored, if non-empty.
    pub newest_sequence: Option<u64>,
}

/// Bounded FIFO of [`OutputChunk`]s for a single session.
#[derive(Debug, Clone)]
pub struct OutputRingBuffer {
    chunks: VecDeque<OutputChunk>,
    total_bytes: usize,
    max_bytes: usize,
    max_chunks: usize,
    next_sequence: u64,
}

impl OutputRingBuffer {
    /// Create a new buffer honoring `config`'s bounds.
    ///
    /// # Errors
    ///
    /// Returns [`RingBufferError::InvalidBound`] if either bound is zero.
    pub fn new(config: RingBufferConfig) -> Result<Self, RingBufferError> {
        if config.max_bytes == 0 {
            return Err(RingBufferError::InvalidBound("max_bytes must be > 0"));
        }
        if config.max_chunks == 0 {
            return Err(RingBufferError::InvalidBound("max_chunks must be > 0"));
        }

        Ok(Self {
            chunks: VecDeque::new(),
            total_bytes: 0,
            max_bytes: config.max_bytes,
            max_chunks: config.max_chunks,
            next_sequence: 1,
        })
    }

    /// Append a new chunk, assigning it the next sequence number, then evict
    /// the oldest chunks until both bounds hold. Returns the assigned
    /// sequence. O(1) amortized.
    pub fn write(
        &mut self,
        data: Vec<u8>,
        compressed: bool,
        compression_type: CompressionType,
        timestamp_ms: u64,
    ) -> u64 {
        let sequence_number = self.next_sequence;
        self.next_sequence += 1;

        self.total_bytes += data.len();
        self.chunks.push_back(OutputChunk {
            sequence_number,
            data,
            compressed,
            compression_type,
            timestamp_ms,
        });

        while self.total_bytes > self.max_bytes || self.chunks.len() > self.max_chunks {
            let Some(evicted) = self.chunks.pop_front() else { break };
            self.total_bytes -= evicted.data.len();
        }

        sequence_number
    }

    /// Chunks with `sequenceNumber >= from_sequence`, in order. If
    /// `from_sequence` is older than [`Self::oldest_sequence`], returns
    /// chunks starting from the oldest available — callers detect the gap
    /// by comparing the first returned sequence against `from_sequence`.
    #[must_use]
    pub fn read_from(&self, from_sequence: u64) -> Vec<OutputChunk> {
        self.chunks.iter().filter(|chunk| chunk.sequence_number >= from_sequence).cloned().collect()
    }

    /// Concatenation of the most recent chunks whose total size doesn't
    /// exceed `max_bytes`, in order.
    #[must_use]
    pub fn latest_bytes(&self, max_bytes: usize) -> Vec<u8> {
        let mut budget = max_bytes;
        let mut selected: Vec<&OutputChunk> = Vec::new();

        for chunk in self.chunks.iter().rev() {
            if chunk.data.len() > budget {
                break;
            }
            budget -= chunk.data.len();
            selected.push(chunk);
        }

        selected.iter().rev().flat_map(|chunk| chunk.data.iter().copied()).collect()
    }

    /// Oldest sequence number currently stored.
    #[must_use]
    pub fn oldest_sequence(&self) -> Option<u64> {
        self.chunks.front().map(|chunk| chunk.sequence_number)
    }

    /// Newest sequence number currently stored.
    #[must_use]
    pub fn newest_sequence(&self) -> Option<u64> {
        self.chunks.back().map(|chunk| chunk.sequence_number)
    }

    /// Snapshot of current occupancy.
    #[must_use]
    pub fn statistics(&self) -> RingBufferStatistics {
        RingBufferStatistics {
            chunk_count: self.chunks.len(),
            total_bytes: self.total_bytes,
            oldest_sequence: self.oldest_sequence(),
            newest_sequence: self.newest_sequence(),
        }
    }
}
