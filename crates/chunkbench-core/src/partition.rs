use chunkbench_common::ChunkRange;

/// Lazily splits `[0, total)` into consecutive ranges of `per_call` chunks.
/// The last range is truncated to whatever is left.
#[derive(Debug, Clone)]
pub struct Partition {
    next: u64,
    total: u64,
    per_call: u64,
}

pub fn partition(total_chunks: u64, chunks_per_call: u64) -> Partition {
    Partition { next: 0, total: total_chunks, per_call: chunks_per_call }
}

impl Iterator for Partition {
    type Item = ChunkRange;

    fn next(&mut self) -> Option<ChunkRange> {
        if self.per_call == 0 || self.next >= self.total {
            return None;
        }
        let start = self.next;
        let end = start.saturating_add(self.per_call).min(self.total);
        self.next = end;
        Some(ChunkRange::new(start, end))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.per_call == 0 {
            0
        } else {
            (self.total.saturating_sub(self.next)).div_ceil(self.per_call) as usize
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Partition {}
