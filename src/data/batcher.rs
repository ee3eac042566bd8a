// ============================================================
// Layer 4 — Batch Collator
// ============================================================
// Stacks variable-length prompts into one uniform-width batch
// for the completion service.
//
// Why LEFT padding?
//   A causal model generates by appending to the right edge of
//   every row. With right padding, the new tokens of a short row
//   would follow a run of [PAD]s. Left padding lines every row's
//   last real token up at the same column:
//
//     row 0: [PAD] [PAD]  t1   t2   t3     mask: 0 0 1 1 1
//     row 1:  t1    t2    t3   t4   t5     mask: 1 1 1 1 1
//
// The attention-mask row sum therefore gives back each row's
// true length, and `width - row_sum` its amount of padding.
//
// Reference: Rust Book §8 (Vectors)

/// A batch of left-padded rows ready for generation.
/// Every row in `input_ids` and `attention_mask` has length `width()`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaddedBatch {
    /// Token ID rows, shape: [batch_size, width]
    pub input_ids: Vec<Vec<u32>>,

    /// 1 = real token, 0 = padding, shape: [batch_size, width]
    pub attention_mask: Vec<Vec<u32>>,
}

impl PaddedBatch {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Common row width (0 for an empty batch)
    pub fn width(&self) -> usize {
        self.input_ids.first().map_or(0, Vec::len)
    }

    /// Real (unpadded) length of every row: the mask row sums
    pub fn input_lengths(&self) -> Vec<usize> {
        self.attention_mask
            .iter()
            .map(|row| row.iter().map(|&m| m as usize).sum())
            .collect()
    }

    /// Number of leading pad positions in every row
    pub fn padding_lengths(&self) -> Vec<usize> {
        let width = self.width();
        self.input_lengths()
            .into_iter()
            .map(|len| width - len)
            .collect()
    }
}

/// Left-pads prompts with the tokenizer's pad id.
#[derive(Debug, Clone, Copy)]
pub struct BatchCollator {
    pad_token_id: u32,
}

impl BatchCollator {
    pub fn new(pad_token_id: u32) -> Self {
        Self { pad_token_id }
    }

    /// Convert a Vec of token sequences into a single PaddedBatch.
    ///
    /// Steps:
    ///   1. Find the longest sequence
    ///   2. Prefix each row with pad ids up to that width
    ///   3. Build the mask the same way with 0s then 1s
    pub fn collate(&self, sequences: Vec<Vec<u32>>) -> PaddedBatch {
        let width = sequences.iter().map(Vec::len).max().unwrap_or(0);

        let mut input_ids      = Vec::with_capacity(sequences.len());
        let mut attention_mask = Vec::with_capacity(sequences.len());

        for seq in sequences {
            let pad_len = width - seq.len();

            let mut ids = vec![self.pad_token_id; pad_len];
            ids.extend(seq.iter().copied());

            let mut mask = vec![0u32; pad_len];
            mask.resize(width, 1);

            input_ids.push(ids);
            attention_mask.push(mask);
        }

        PaddedBatch { input_ids, attention_mask }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_left_padded() {
        let c = BatchCollator::new(9);
        let b = c.collate(vec![vec![1, 2], vec![3, 4, 5, 6]]);

        assert_eq!(b.width(), 4);
        assert_eq!(b.input_ids[0], vec![9, 9, 1, 2]);
        assert_eq!(b.input_ids[1], vec![3, 4, 5, 6]);
        assert_eq!(b.attention_mask[0], vec![0, 0, 1, 1]);
        assert_eq!(b.attention_mask[1], vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_mask_row_sums_recover_original_lengths() {
        let seqs: Vec<Vec<u32>> = [7usize, 1, 12, 0, 12, 3]
            .iter()
            .map(|&n| (0..n as u32).map(|x| x + 100).collect())
            .collect();
        let lengths: Vec<usize> = seqs.iter().map(Vec::len).collect();

        let b = BatchCollator::new(0).collate(seqs.clone());

        assert_eq!(b.input_lengths(), lengths);
        for ((row, orig), pad) in b.input_ids.iter().zip(&seqs).zip(b.padding_lengths()) {
            assert_eq!(row.len(), 12);
            // right edge holds the original tokens untouched
            assert_eq!(&row[pad..], orig.as_slice());
        }
    }

    #[test]
    fn test_empty_batch() {
        let b = BatchCollator::new(0).collate(Vec::new());
        assert!(b.is_empty());
        assert_eq!(b.width(), 0);
    }
}
