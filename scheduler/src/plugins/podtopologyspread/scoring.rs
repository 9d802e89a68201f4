use shared::models::node::Node;

use super::args::Weighting;
use super::metadata::SpreadMetadata;
use crate::framework::NodeScore;

/// Raw score of `node`: the weighted, negated number of matching pods in
/// each of its domains. Constraints whose key the node lacks count 0.
pub fn raw_score(meta: &SpreadMetadata, node: &Node, weighting: Weighting) -> i64 {
    meta.constraints()
        .iter()
        .enumerate()
        .filter_map(|(i, c)| {
            let value = node.topology_value(&c.topology_key)?;
            Some(weighting.contribution(meta.matching_in_domain(i, value), c.max_skew))
        })
        .sum()
}

/// Min-max rescale into `0..=max_score`, rounding half up. The least
/// crowded node gets `max_score`, the most crowded 0. Equal scores all
/// get `max_score`.
pub fn normalize(scores: &mut [NodeScore], max_score: i64) {
    let Some((min, max)) = scores.iter().fold(None, |acc, s| match acc {
        None => Some((s.score, s.score)),
        Some((lo, hi)) => Some((s.score.min(lo), s.score.max(hi))),
    }) else {
        return;
    };

    if min == max {
        fill(scores, max_score);
        return;
    }

    let range = i128::from(max) - i128::from(min);
    let max_score_wide = i128::from(max_score);
    for s in scores.iter_mut() {
        let offset = i128::from(s.score) - i128::from(min);
        s.score = ((offset * max_score_wide * 2 + range) / (range * 2)) as i64;
    }
}

pub fn fill(scores: &mut [NodeScore], score: i64) {
    for s in scores.iter_mut() {
        s.score = score;
    }
}
