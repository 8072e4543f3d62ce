use std::collections::{HashMap, HashSet};

/// Standard RRF constant
pub const DEFAULT_RRF_K: f64 = 60.0;

/// One document after fusion
#[derive(Debug, Clone, PartialEq)]
pub struct FusedEntry {
    pub id: String,
    pub score: f64,
    /// 1-based rank in each input list, `None` where the document was absent
    pub ranks: Vec<Option<usize>>,
}

/// Reciprocal Rank Fusion over any number of ranked id lists.
///
/// score(d) = Σ 1 / (k + rank_i(d)), summed over the lists containing d.
/// Repeated ids inside one list keep their first (best) position; ranks are
/// positions in the deduplicated list. Contributions are added smallest
/// first so the result does not depend on the order of the lists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RrfFusion {
    k: f64,
}

impl RrfFusion {
    #[must_use]
    pub const fn new(k: f64) -> Self {
        Self { k }
    }

    #[must_use]
    pub const fn k(&self) -> f64 {
        self.k
    }

    /// Fuse ranked lists; output sorted by score descending, then id ascending
    ///
    /// Repeated ids keep their first position, and ranks count positions in
    /// the deduplicated list, so items after a duplicate move up one rank.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fuse<L, S>(&self, lists: &[L]) -> Vec<FusedEntry>
    where
        L: AsRef<[S]>,
        S: AsRef<str>,
    {
        let mut contributions: HashMap<&str, (Vec<f64>, Vec<Option<usize>>)> = HashMap::new();

        for (source, list) in lists.iter().enumerate() {
            let mut seen: HashSet<&str> = HashSet::new();
            let mut rank = 0usize;
            for id in list.as_ref() {
                let id = id.as_ref();
                if !seen.insert(id) {
                    continue;
                }
                rank += 1;
                let entry = contributions
                    .entry(id)
                    .or_insert_with(|| (Vec::new(), vec![None; lists.len()]));
                entry.0.push(1.0 / (self.k + rank as f64));
                entry.1[source] = Some(rank);
            }
        }

        let mut fused: Vec<FusedEntry> = contributions
            .into_iter()
            .map(|(id, (mut parts, ranks))| {
                parts.sort_by(f64::total_cmp);
                FusedEntry {
                    id: id.to_string(),
                    score: parts.iter().sum(),
                    ranks,
                }
            })
            .collect();

        fused.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        fused
    }
}

impl Default for RrfFusion {
    fn default() -> Self {
        Self::new(DEFAULT_RRF_K)
    }
}
