//! Grid-search configuration

use serde::{Deserialize, Serialize};

/// How the search resolves two grid points with the same mean score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TieBreak {
    /// `>=`: the later point in iteration order wins, favouring larger `k`/`p`.
    /// Reproduces the historical BDshape runs.
    #[default]
    LastSeen,
    /// `>`: the earlier point in iteration order wins
    FirstSeen,
}

impl TieBreak {
    pub(crate) fn prefers(self, candidate: f64, best: f64) -> bool {
        match self {
            TieBreak::LastSeen => candidate >= best,
            TieBreak::FirstSeen => candidate > best,
        }
    }
}

/// Configuration for the KNN hyperparameter grid search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Neighbor counts to try, in iteration order
    pub k_values: Vec<usize>,
    /// Minkowski orders to try for every `k`
    pub p_candidates: Vec<u32>,
    /// Cross-validation runs averaged per grid point
    pub repeats: usize,
    /// Folds per cross-validation run
    pub folds: usize,
    /// Tie-break policy between equal mean scores
    pub tie_break: TieBreak,
    /// Master seed; every repeat derives its own seed from it
    pub random_state: Option<u64>,
    /// Run the repeats of a grid point on the rayon pool
    pub parallel: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            k_values: (1..=20).collect(),
            p_candidates: vec![1, 2],
            repeats: 15,
            folds: 5,
            tie_break: TieBreak::LastSeen,
            random_state: None,
            parallel: true,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_k_values(mut self, k_values: impl IntoIterator<Item = usize>) -> Self {
        self.k_values = k_values.into_iter().collect();
        self
    }

    pub fn with_p_candidates(mut self, p_candidates: Vec<u32>) -> Self {
        self.p_candidates = p_candidates;
        self
    }

    pub fn with_repeats(mut self, repeats: usize) -> Self {
        self.repeats = repeats;
        self
    }

    pub fn with_folds(mut self, folds: usize) -> Self {
        self.folds = folds;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SearchConfig::default();
        assert_eq!(config.k_values.first(), Some(&1));
        assert_eq!(config.k_values.last(), Some(&20));
        assert_eq!(config.p_candidates, vec![1, 2]);
        assert_eq!(config.repeats, 15);
        assert_eq!(config.folds, 5);
        assert_eq!(config.tie_break, TieBreak::LastSeen);
    }

    #[test]
    fn test_tie_break_policies() {
        assert!(TieBreak::LastSeen.prefers(0.5, 0.5));
        assert!(!TieBreak::FirstSeen.prefers(0.5, 0.5));
        assert!(TieBreak::FirstSeen.prefers(0.6, 0.5));
        assert!(!TieBreak::LastSeen.prefers(0.4, 0.5));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SearchConfig = serde_json::from_str(r#"{"repeats": 3, "tie_break": "FirstSeen"}"#).unwrap();
        assert_eq!(config.repeats, 3);
        assert_eq!(config.tie_break, TieBreak::FirstSeen);
        assert_eq!(config.folds, 5);
    }
}
