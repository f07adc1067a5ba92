//! Maximal marginal relevance selection.

use crate::index::{SearchHit, cosine_similarity};

/// Select up to `k` hits from `candidates` by maximal marginal relevance.
///
/// The first pick is the candidate most similar to `query`. Every following
/// pick maximizes `lambda * sim(query, c) - (1 - lambda) * max sim(c, s)` over
/// the already selected `s`. Ties keep the earlier candidate, so the result is
/// deterministic for a given candidate order. Candidates without a stored
/// embedding are ranked by their distance alone and never penalized.
pub fn select(query: &[f32], candidates: Vec<SearchHit>, k: usize, lambda: f32) -> Vec<SearchHit> {
    if k == 0 || candidates.is_empty() {
        return Vec::new();
    }

    let relevance: Vec<f32> = candidates
        .iter()
        .map(|hit| {
            if hit.embedding.is_empty() {
                1.0 - hit.distance
            } else {
                cosine_similarity(query, &hit.embedding)
            }
        })
        .collect();

    // Unit vectors make every pairwise similarity a plain dot product.
    let unit: Vec<Option<Vec<f32>>> =
        candidates.iter().map(|hit| normalized(&hit.embedding)).collect();

    let target = k.min(candidates.len());
    let mut picked = vec![false; candidates.len()];
    // Highest similarity to any selected hit; `None` until one with an
    // embedding has been selected.
    let mut max_redundancy: Vec<Option<f32>> = vec![None; candidates.len()];
    let mut selected: Vec<usize> = Vec::with_capacity(target);

    while selected.len() < target {
        let mut best: Option<(usize, f32)> = None;
        for idx in (0..candidates.len()).filter(|&idx| !picked[idx]) {
            let score = if selected.is_empty() {
                relevance[idx]
            } else {
                lambda * relevance[idx] - (1.0 - lambda) * max_redundancy[idx].unwrap_or(0.0)
            };
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((idx, score));
            }
        }

        let Some((choice, _)) = best else { break };
        picked[choice] = true;
        selected.push(choice);

        if let Some(chosen) = &unit[choice] {
            for idx in (0..candidates.len()).filter(|&idx| !picked[idx]) {
                if let Some(vector) = &unit[idx] {
                    let similarity = dot(vector, chosen);
                    let slot = &mut max_redundancy[idx];
                    *slot = Some(slot.map_or(similarity, |current| current.max(similarity)));
                }
            }
        }
    }

    let mut slots: Vec<Option<SearchHit>> = candidates.into_iter().map(Some).collect();
    selected.into_iter().filter_map(|idx| slots[idx].take()).collect()
}

/// Scale `embedding` to unit length; a zero vector stays zero. `None` when the
/// hit carries no embedding.
fn normalized(embedding: &[f32]) -> Option<Vec<f32>> {
    if embedding.is_empty() {
        return None;
    }
    let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return Some(vec![0.0; embedding.len()]);
    }
    Some(embedding.iter().map(|x| x / norm).collect())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn hit(id: Uuid, embedding: Vec<f32>, query: &[f32]) -> SearchHit {
        let distance = crate::index::cosine_distance(query, &embedding);
        SearchHit { opportunity_id: id, text: String::new(), funding: true, distance, embedding }
    }

    #[test]
    fn first_pick_is_most_similar() {
        let query = [1.0, 0.0];
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let candidates = vec![hit(a, vec![0.6, 0.8], &query), hit(b, vec![1.0, 0.05], &query)];
        let picked = select(&query, candidates, 1, 0.5);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].opportunity_id, b);
    }

    #[test]
    fn diversity_beats_near_duplicates() {
        let query = [1.0, 0.0, 0.0];
        let long_doc = Uuid::new_v4();
        let other_doc = Uuid::new_v4();
        let candidates = vec![
            hit(long_doc, vec![1.0, 0.1, 0.0], &query),
            hit(long_doc, vec![1.0, 0.11, 0.0], &query),
            hit(other_doc, vec![0.8, 0.0, 0.6], &query),
        ];
        let picked = select(&query, candidates, 2, 0.5);
        assert_eq!(picked[0].opportunity_id, long_doc);
        assert_eq!(picked[1].opportunity_id, other_doc);
    }

    #[test]
    fn lambda_one_is_plain_similarity_order() {
        let query = [1.0, 0.0, 0.0];
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let candidates = vec![
            hit(ids[0], vec![1.0, 0.1, 0.0], &query),
            hit(ids[1], vec![1.0, 0.11, 0.0], &query),
            hit(ids[2], vec![0.8, 0.0, 0.6], &query),
        ];
        let picked = select(&query, candidates, 3, 1.0);
        let order: Vec<Uuid> = picked.iter().map(|h| h.opportunity_id).collect();
        assert_eq!(order, ids);
    }

    #[test]
    fn never_returns_more_than_available() {
        let query = [1.0, 0.0];
        let candidates = vec![hit(Uuid::new_v4(), vec![1.0, 0.0], &query)];
        assert_eq!(select(&query, candidates, 5, 0.5).len(), 1);
        assert!(select(&query, Vec::new(), 5, 0.5).is_empty());
    }

    #[test]
    fn large_pools_select_every_candidate_once() {
        let dim = 64;
        let query: Vec<f32> = (0..dim).map(|i| if i == 0 { 1.0 } else { 0.0 }).collect();
        let candidates: Vec<SearchHit> = (0..400)
            .map(|n| {
                let embedding: Vec<f32> =
                    (0..dim).map(|i| ((n * 31 + i * 7) % 17) as f32 / 17.0 + 0.01).collect();
                hit(Uuid::from_u128(n as u128), embedding, &query)
            })
            .collect();

        let picked = select(&query, candidates, 200, 0.5);
        assert_eq!(picked.len(), 200);
        let distinct: std::collections::HashSet<Uuid> =
            picked.iter().map(|h| h.opportunity_id).collect();
        assert_eq!(distinct.len(), 200);

        let closest = picked.iter().map(|h| h.distance).fold(f32::INFINITY, f32::min);
        assert!((picked[0].distance - closest).abs() < 1e-6);
    }

    #[test]
    fn hits_without_embeddings_rank_by_distance() {
        let query = [1.0, 0.0];
        let (near, far) = (Uuid::new_v4(), Uuid::new_v4());
        let bare = |id, distance| SearchHit {
            opportunity_id: id,
            text: String::new(),
            funding: true,
            distance,
            embedding: Vec::new(),
        };
        let picked = select(&query, vec![bare(far, 0.6), bare(near, 0.1)], 2, 0.5);
        let order: Vec<Uuid> = picked.iter().map(|h| h.opportunity_id).collect();
        assert_eq!(order, vec![near, far]);
    }
}
