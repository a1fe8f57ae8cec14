use avalon_core::belief::Belief;
use avalon_core::game::HiddenId;
use rand::Rng;

/// One candidate move with its probability and its value under every hidden
/// state.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveEntry<M> {
    pub action: M,
    pub probability: f64,
    pub values: Vec<f64>,
}

/// Mixed strategy produced by a solve, plus the expected value of playing it
/// under each hidden state.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveSet<M> {
    entries: Vec<MoveEntry<M>>,
    values: Vec<f64>,
}

impl<M: Clone + PartialEq> MoveSet<M> {
    pub fn new(entries: Vec<MoveEntry<M>>, values: Vec<f64>) -> Self {
        Self { entries, values }
    }

    /// Strategy at a finished game: no moves, zero value everywhere.
    pub fn terminal(hidden_count: usize) -> Self {
        Self {
            entries: Vec::new(),
            values: vec![0.0; hidden_count],
        }
    }

    /// Fixed policy carrying no value information.
    pub fn from_policy(policy: Vec<(M, f64)>, hidden_count: usize) -> Self {
        let entries = policy
            .into_iter()
            .map(|(action, probability)| MoveEntry {
                action,
                probability,
                values: vec![0.0; hidden_count],
            })
            .collect();
        Self {
            entries,
            values: vec![0.0; hidden_count],
        }
    }

    pub fn entries(&self) -> &[MoveEntry<M>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn moves(&self) -> impl Iterator<Item = &M> + '_ {
        self.entries.iter().map(|entry| &entry.action)
    }

    /// Expected value under each hidden state.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn value(&self, hidden: HiddenId) -> f64 {
        self.values.get(hidden).copied().unwrap_or(0.0)
    }

    /// Probability of `action`; zero when it is not in the set.
    pub fn probability(&self, action: &M) -> f64 {
        self.entries
            .iter()
            .find(|entry| &entry.action == action)
            .map_or(0.0, |entry| entry.probability)
    }

    /// Most probable entry; the earliest wins ties.
    pub fn best(&self) -> Option<&MoveEntry<M>> {
        let mut best: Option<&MoveEntry<M>> = None;
        for entry in &self.entries {
            if best.is_none_or(|top| entry.probability > top.probability) {
                best = Some(entry);
            }
        }
        best
    }

    /// Value of the strategy averaged over `belief`.
    pub fn expected_value(&self, belief: &Belief) -> f64 {
        self.values
            .iter()
            .enumerate()
            .map(|(h, v)| belief.prob(h) * v)
            .sum()
    }

    pub fn total_probability(&self) -> f64 {
        self.entries.iter().map(|entry| entry.probability).sum()
    }

    /// Draws a move according to the strategy.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&M> {
        let total = self.total_probability();
        if !(total > 0.0) {
            return None;
        }
        let mut choice = rng.gen_range(0.0..total);
        let mut last = None;
        for entry in &self.entries {
            if entry.probability <= 0.0 {
                continue;
            }
            if choice < entry.probability {
                return Some(&entry.action);
            }
            choice -= entry.probability;
            last = Some(&entry.action);
        }
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sample_set() -> MoveSet<char> {
        MoveSet::new(
            vec![
                MoveEntry {
                    action: 'a',
                    probability: 0.25,
                    values: vec![1.0, 3.0],
                },
                MoveEntry {
                    action: 'b',
                    probability: 0.75,
                    values: vec![2.0, -1.0],
                },
            ],
            vec![1.75, 0.0],
        )
    }

    #[test]
    fn lookup_and_best() {
        let set = sample_set();
        assert_eq!(set.probability(&'a'), 0.25);
        assert_eq!(set.probability(&'z'), 0.0);
        assert_eq!(set.best().map(|e| e.action), Some('b'));
        assert_eq!(set.moves().copied().collect::<Vec<_>>(), vec!['a', 'b']);
    }

    #[test]
    fn expected_value_weights_by_belief() {
        let set = sample_set();
        let belief = Belief::from_probs(vec![0.5, 0.5]).unwrap();
        assert!((set.expected_value(&belief) - 0.875).abs() < 1e-12);
    }

    #[test]
    fn terminal_set_is_empty_with_zero_values() {
        let set: MoveSet<char> = MoveSet::terminal(3);
        assert!(set.is_empty());
        assert_eq!(set.values(), &[0.0, 0.0, 0.0]);
        assert!(set.best().is_none());
        let mut rng = StdRng::seed_from_u64(1);
        assert!(set.sample(&mut rng).is_none());
    }

    #[test]
    fn sampling_follows_probabilities() {
        let set = sample_set();
        let mut rng = StdRng::seed_from_u64(42);
        let draws = 4_000;
        let b_count = (0..draws)
            .filter(|_| set.sample(&mut rng) == Some(&'b'))
            .count();
        let freq = b_count as f64 / draws as f64;
        assert!((freq - 0.75).abs() < 0.05, "frequency {freq}");
    }

    #[test]
    fn sampling_skips_zero_probability_moves() {
        let set = MoveSet::from_policy(vec![('x', 0.0), ('y', 1.0)], 1);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            assert_eq!(set.sample(&mut rng), Some(&'y'));
        }
    }
}
