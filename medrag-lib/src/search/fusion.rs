use std::collections::HashSet;

use crate::store::RetrievalHit;

/// Keep the hits whose text the reranker returned.
///
/// Membership is exact string equality. The kept hits stay in retrieval
/// order; the rerank order only decides what survives. No match at all is
/// an empty, successful result.
pub fn fuse(hits: Vec<RetrievalHit>, ranked: &[String]) -> Vec<RetrievalHit> {
    let keep: HashSet<&str> = ranked.iter().map(String::as_str).collect();
    hits.into_iter()
        .filter(|hit| keep.contains(hit.text.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Metadata;

    fn hit(text: &str, score: f32) -> RetrievalHit {
        RetrievalHit {
            text: text.to_string(),
            score,
            metadata: Metadata::new(),
        }
    }

    fn texts(hits: &[RetrievalHit]) -> Vec<&str> {
        hits.iter().map(|h| h.text.as_str()).collect()
    }

    #[test]
    fn test_keeps_only_ranked_texts() {
        let hits = vec![hit("A", 0.9), hit("B", 0.8), hit("C", 0.7)];
        let fused = fuse(hits, &["B".to_string()]);
        assert_eq!(fused, vec![hit("B", 0.8)]);
    }

    #[test]
    fn test_preserves_retrieval_order_not_rerank_order() {
        let hits = vec![hit("A", 0.9), hit("B", 0.8), hit("C", 0.7)];
        let ranked = vec!["C".to_string(), "A".to_string()];
        assert_eq!(texts(&fuse(hits, &ranked)), vec!["A", "C"]);
    }

    #[test]
    fn test_empty_ranking_gives_empty_result() {
        let hits = vec![hit("A", 0.9), hit("B", 0.8)];
        assert!(fuse(hits, &[]).is_empty());
    }

    #[test]
    fn test_no_hits() {
        assert!(fuse(Vec::new(), &["A".to_string()]).is_empty());
    }

    #[test]
    fn test_paraphrased_text_does_not_match() {
        let hits = vec![hit("Sudden chest pain.", 0.9)];
        let ranked = vec!["sudden chest pain".to_string(), "Sudden chest pain".to_string()];
        assert!(fuse(hits, &ranked).is_empty());
    }

    #[test]
    fn test_duplicate_hits_are_all_kept() {
        let hits = vec![hit("A", 0.9), hit("A", 0.5), hit("B", 0.4)];
        let fused = fuse(hits, &["A".to_string()]);
        assert_eq!(fused, vec![hit("A", 0.9), hit("A", 0.5)]);
    }
}
