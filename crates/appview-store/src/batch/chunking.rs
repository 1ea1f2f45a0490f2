//! Order-preserving partition of a batch into chunks

/// Contiguous slice `start..end` of the input, the `index`-th chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl ChunkRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Position in the caller's input of the item at `position` within
    /// this chunk
    pub fn ordinal(&self, position: usize) -> usize {
        self.start + position
    }
}

/// Split `total` items into chunks of `chunk_size` (the last may be short)
///
/// A zero `chunk_size` is treated as one; the batch engine rejects it before
/// getting here.
pub fn chunk_ranges(total: usize, chunk_size: usize) -> Vec<ChunkRange> {
    let chunk_size = chunk_size.max(1);
    (0..total)
        .step_by(chunk_size)
        .enumerate()
        .map(|(index, start)| ChunkRange {
            index,
            start,
            end: (start + chunk_size).min(total),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_2500_items_in_chunks_of_1000() {
        let chunks = chunk_ranges(2500, 1000);
        assert_eq!(
            chunks,
            vec![
                ChunkRange {
                    index: 0,
                    start: 0,
                    end: 1000,
                },
                ChunkRange {
                    index: 1,
                    start: 1000,
                    end: 2000,
                },
                ChunkRange {
                    index: 2,
                    start: 2000,
                    end: 2500,
                },
            ]
        );
        assert_eq!(chunks[1].ordinal(200), 1200);
    }

    #[test]
    fn test_empty_input_has_no_chunks() {
        assert!(chunk_ranges(0, 10).is_empty());
    }

    proptest! {
        #[test]
        fn prop_chunks_cover_input_in_order(total in 0usize..5000, chunk_size in 1usize..700) {
            let chunks = chunk_ranges(total, chunk_size);

            let mut next = 0;
            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.index, i);
                prop_assert_eq!(chunk.start, next);
                prop_assert!(!chunk.is_empty());
                prop_assert!(chunk.len() <= chunk_size);
                next = chunk.end;
            }
            prop_assert_eq!(next, total);
        }

        #[test]
        fn prop_ordinal_is_chunk_index_times_size_plus_position(
            total in 1usize..5000,
            chunk_size in 1usize..700,
            pick in any::<prop::sample::Index>(),
        ) {
            let ordinal = pick.index(total);
            let chunks = chunk_ranges(total, chunk_size);
            let chunk = chunks[ordinal / chunk_size];
            let position = ordinal - chunk.start;

            prop_assert!(position < chunk.len());
            prop_assert_eq!(chunk.ordinal(position), chunk.index * chunk_size + position);
            prop_assert_eq!(chunk.ordinal(position), ordinal);
        }
    }
}
