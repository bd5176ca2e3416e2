//! Per-viewer choice shuffling
//!
//! Every viewer of a question sees the choices in their own stable order,
//! so a player cannot usefully announce "the answer is the third one".
//! The order is derived only from (question, viewer), so it survives a
//! reconnect within the round. This PRNG is deliberately separate from
//! the gameplay RNG; it must stay deterministic per seed.

/// FNV-1a 32-bit hash of a seed key
fn fnv1a(key: &str) -> u32 {
    let mut hash: u32 = 0x811c9dc5;
    for b in key.bytes() {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Mulberry32 counter-based generator
#[derive(Clone, Debug)]
pub struct Mulberry32 {
    seed: u32,
}

impl Mulberry32 {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    pub fn next_f64(&mut self) -> f64 {
        self.seed = self.seed.wrapping_add(0x6d2b_79f5);
        let mut t = self.seed;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        let out = t ^ (t >> 14);
        f64::from(out) / 4_294_967_296.0
    }

    /// Uniform index in `0..bound`
    pub fn index(&mut self, bound: usize) -> usize {
        if bound <= 1 {
            return 0;
        }
        let idx = (self.next_f64() * bound as f64).floor() as usize;
        idx.min(bound - 1)
    }
}

/// Return the indices of `len` choices in the order this viewer sees them
pub fn shuffled_order(question_id: &str, viewer_id: &str, len: usize) -> Vec<usize> {
    let mut rng = Mulberry32::new(fnv1a(&format!("{question_id}:{viewer_id}")));
    let mut order: Vec<usize> = (0..len).collect();
    // Fisher-Yates
    for i in (1..len).rev() {
        let j = rng.index(i + 1);
        order.swap(i, j);
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_for_same_seed() {
        let a = shuffled_order("q1", "viewer1", 4);
        let b = shuffled_order("q1", "viewer1", 4);
        assert_eq!(a, b);
    }

    #[test]
    fn test_is_a_permutation() {
        let order = shuffled_order("q1", "viewer1", 6);
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_viewers_disagree_somewhere() {
        // With 8 choices a collision across 20 viewers is vanishingly rare
        let base = shuffled_order("q1", "viewer0", 8);
        let any_different = (1..20)
            .map(|i| shuffled_order("q1", &format!("viewer{i}"), 8))
            .any(|o| o != base);
        assert!(any_different);
    }

    #[test]
    fn test_question_changes_the_order() {
        let orders: Vec<_> = (0..20)
            .map(|i| shuffled_order(&format!("q{i}"), "viewer1", 8))
            .collect();
        assert!(orders.iter().any(|o| o != &orders[0]));
    }

    #[test]
    fn test_single_choice_is_stable() {
        assert_eq!(shuffled_order("q1", "v1", 1), vec![0]);
        assert_eq!(shuffled_order("q1", "v1", 0), Vec::<usize>::new());
    }
}
