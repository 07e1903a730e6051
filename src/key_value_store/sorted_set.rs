use std::{
    cmp::Ordering,
    collections::{BTreeSet, HashMap},
};

use crate::key_value_store::list::resolve_range;

#[derive(Debug, Clone)]
struct ScoredMember {
    score: f64,
    member: String,
}

impl PartialEq for ScoredMember {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredMember {}

impl PartialOrd for ScoredMember {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredMember {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.member.cmp(&other.member))
    }
}

/// Members ranked by `(score, member)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortedSet {
    scores: HashMap<String, f64>,
    ranked: BTreeSet<ScoredMember>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Returns true when `member` was not present before.
    pub fn insert(&mut self, member: String, score: f64) -> bool {
        let previous = self.scores.insert(member.clone(), score);

        if let Some(previous) = previous {
            self.ranked.remove(&ScoredMember {
                score: previous,
                member: member.clone(),
            });
        }

        self.ranked.insert(ScoredMember { score, member });

        previous.is_none()
    }

    pub fn remove(&mut self, member: &str) -> bool {
        let Some(score) = self.scores.remove(member) else {
            return false;
        };

        self.ranked.remove(&ScoredMember {
            score,
            member: member.to_string(),
        })
    }

    pub fn score(&self, member: &str) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// Zero-based position in ascending `(score, member)` order.
    pub fn rank(&self, member: &str) -> Option<usize> {
        let score = self.score(member)?;
        let needle = ScoredMember {
            score,
            member: member.to_string(),
        };

        Some(self.ranked.range(..&needle).count())
    }

    /// Members with their scores, lowest score first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.ranked
            .iter()
            .map(|entry| (entry.member.as_str(), entry.score))
    }

    pub fn range(&self, start: isize, stop: isize) -> Vec<String> {
        let Some((start, stop)) = resolve_range(self.len(), start, stop) else {
            return Vec::new();
        };

        self.ranked
            .iter()
            .skip(start)
            .take(stop - start + 1)
            .map(|entry| entry.member.clone())
            .collect()
    }
}
