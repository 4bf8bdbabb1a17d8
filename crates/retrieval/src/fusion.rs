//! Reciprocal-rank fusion.
//!
//! `score(d) = Σᵢ wᵢ / (c + rankᵢ(d))` with `c = 60`. Documents are
//! identified by [`RetrievedItem::dedupe_key`]; the highest-scoring
//! representative of each key survives.

use std::collections::HashMap;

use crate::item::RetrievedItem;

/// The rank-smoothing constant. 60 is the standard value from the RRF
/// literature and what the store-side fusion uses as well.
pub const RRF_C: f64 = 60.0;

/// Fuse `lists` (each already ranked best-first) with per-list `weights`,
/// returning the top `final_k` items renumbered `DOC1..DOCn`.
///
/// Ties in fused score break on the dedupe key so the output ordering is
/// fully deterministic regardless of input list order.
pub fn rrf_fuse(
    lists: &[Vec<RetrievedItem>],
    weights: &[f64],
    final_k: usize,
) -> Vec<RetrievedItem> {
    let mut fused: HashMap<String, f64> = HashMap::new();
    let mut best: HashMap<String, RetrievedItem> = HashMap::new();

    for (list, &weight) in lists.iter().zip(weights.iter()) {
        for (rank, item) in list.iter().enumerate() {
            let key = item.dedupe_key();
            *fused.entry(key.clone()).or_insert(0.0) += weight / (RRF_C + (rank + 1) as f64);
            match best.get(&key) {
                Some(existing) if existing.score >= item.score => {}
                _ => {
                    best.insert(key, item.clone());
                }
            }
        }
    }

    let mut ranked: Vec<(String, f64)> = fused.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    ranked
        .into_iter()
        .take(final_k)
        .enumerate()
        .map(|(i, (key, _))| {
            let mut item = best.remove(&key).unwrap_or_else(|| RetrievedItem {
                doc_id: String::new(),
                score: 0.0,
                content: String::new(),
                metadata: serde_json::Value::Null,
            });
            item.doc_id = format!("DOC{}", i + 1);
            item
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(title: &str, score: f64) -> RetrievedItem {
        RetrievedItem {
            doc_id: "raw".into(),
            score,
            content: format!("content of {title}"),
            metadata: json!({"source": "s", "title": title, "category": "terms"}),
        }
    }

    #[test]
    fn fusion_is_deterministic_for_fixed_inputs() {
        let lists = vec![
            vec![item("a", 0.9), item("b", 0.8), item("c", 0.7)],
            vec![item("b", 0.85), item("c", 0.6), item("a", 0.5)],
            vec![item("c", 0.95), item("a", 0.4)],
        ];
        let weights = [1.0, 1.0, 1.2];

        let first = rrf_fuse(&lists, &weights, 10);
        let second = rrf_fuse(&lists, &weights, 10);

        let titles =
            |items: &[RetrievedItem]| items.iter().map(|i| i.title().to_owned()).collect::<Vec<_>>();
        assert_eq!(titles(&first), titles(&second));
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn item_ranked_high_everywhere_wins() {
        let lists = vec![
            vec![item("winner", 0.9), item("other", 0.8)],
            vec![item("winner", 0.9), item("loser", 0.1)],
        ];
        let fused = rrf_fuse(&lists, &[1.0, 1.0], 10);
        assert_eq!(fused[0].title(), "winner");
    }

    #[test]
    fn dedupe_keeps_highest_scoring_representative() {
        // Same identity (source/title/content head), different scores.
        let low = item("dup", 0.2);
        let high = item("dup", 0.9);
        let fused = rrf_fuse(&[vec![low], vec![high]], &[1.0, 1.0], 10);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn doc_ids_are_renumbered_in_rank_order() {
        let lists = vec![vec![item("a", 0.9), item("b", 0.8)]];
        let fused = rrf_fuse(&lists, &[1.0], 10);
        assert_eq!(fused[0].doc_id, "DOC1");
        assert_eq!(fused[1].doc_id, "DOC2");
    }

    #[test]
    fn final_k_bounds_the_output() {
        let lists = vec![(0..20).map(|i| item(&format!("t{i}"), 0.5)).collect::<Vec<_>>()];
        assert_eq!(rrf_fuse(&lists, &[1.0], 5).len(), 5);
    }
}
