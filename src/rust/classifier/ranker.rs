use std::cmp::Ordering;

/// Descending by value, ties broken by the lower index.
///
/// `-0.0` and `0.0` tie. NaN ranks below every number.
fn by_confidence(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    let by_value = b.1.partial_cmp(&a.1).unwrap_or_else(|| a.1.is_nan().cmp(&b.1.is_nan()));
    by_value.then(a.0.cmp(&b.0))
}

/// Returns the `(index, value)` pairs of the `n` largest values, highest first.
///
/// Only the first `n` entries are ordered; the rest of the vector is merely
/// partitioned. Equal values keep their index order. `n` larger than the
/// output is clamped to its length.
pub fn top_n(output: &[f32], n: usize) -> Vec<(usize, f32)> {
    let n = n.min(output.len());
    if n == 0 {
        return Vec::new();
    }

    let mut pairs: Vec<(usize, f32)> = output.iter().copied().enumerate().collect();
    if n < pairs.len() {
        pairs.select_nth_unstable_by(n - 1, by_confidence);
        pairs.truncate(n);
    }
    pairs.sort_unstable_by(by_confidence);
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference ranking: full stable sort.
    fn reference(output: &[f32], n: usize) -> Vec<(usize, f32)> {
        let mut pairs: Vec<(usize, f32)> = output.iter().copied().enumerate().collect();
        pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
        pairs.truncate(n);
        pairs
    }

    #[test]
    fn test_top_n_basic() {
        let output = [0.1, 0.7, 0.05, 0.9, 0.3];
        assert_eq!(top_n(&output, 3), vec![(3, 0.9), (1, 0.7), (4, 0.3)]);
    }

    #[test]
    fn test_ties_prefer_lower_index() {
        let output = [0.5, 0.2, 0.5, 0.5, 0.1];
        assert_eq!(top_n(&output, 2), vec![(0, 0.5), (2, 0.5)]);
        assert_eq!(top_n(&output, 4), vec![(0, 0.5), (2, 0.5), (3, 0.5), (1, 0.2)]);
    }

    #[test]
    fn test_matches_reference_on_many_vectors() {
        // deterministic pseudo-random values with plenty of duplicates
        let mut seed = 0x2545_f491_u32;
        for len in 1..40 {
            let output: Vec<f32> = (0..len)
                .map(|_| {
                    seed ^= seed << 13;
                    seed ^= seed >> 17;
                    seed ^= seed << 5;
                    (seed % 7) as f32 / 7.0
                })
                .collect();
            for n in 1..=len {
                let ranked = top_n(&output, n);
                assert_eq!(ranked.len(), n);
                assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
                assert_eq!(ranked, reference(&output, n), "len {} n {}", len, n);
            }
        }
    }

    #[test]
    fn test_signed_zeros_tie() {
        assert_eq!(top_n(&[-0.0, 0.0], 1), vec![(0, -0.0)]);
        assert_eq!(top_n(&[0.0, -0.0, 0.0], 2), vec![(0, 0.0), (1, -0.0)]);
    }

    #[test]
    fn test_nan_ranks_last() {
        let ranked = top_n(&[f32::NAN, 0.1, f32::NAN, -1.0], 4);
        let indices: Vec<usize> = ranked.iter().map(|&(i, _)| i).collect();
        assert_eq!(indices, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_n_clamped() {
        assert_eq!(top_n(&[0.2, 0.4], 5), vec![(1, 0.4), (0, 0.2)]);
        assert!(top_n(&[0.2, 0.4], 0).is_empty());
        assert!(top_n(&[], 5).is_empty());
    }
}
