//! Hybrid search combining lexical and semantic relevance.
//!
//! Each note scores `1.0` for a case-insensitive substring hit in any of its
//! text fields, plus the positive part of the cosine similarity between its
//! embedding and the query embedding. Notes at or below the cut-off are
//! dropped; the rest are returned best first.

use std::cmp::Ordering;

use serde::Serialize;

use crate::config::SimilarityThresholds;
use crate::embeddings::EmbeddingProvider;
use crate::notes::{Category, Note};
use crate::similarity::cosine_similarity;

/// Score contributed by a lexical hit
const LEXICAL_MATCH_SCORE: f32 = 1.0;

/// A note with its combined relevance score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredNote<'a> {
    pub note: &'a Note,
    pub score: f32,
}

/// Ranks notes against a free-text query.
///
/// Holds no state besides its provider and thresholds; safe to call once per
/// keystroke. Debouncing and cancelling superseded calls is up to the caller.
pub struct HybridRanker<'p, P> {
    provider: &'p P,
    cutoff: f32,
}

impl<'p, P: EmbeddingProvider> HybridRanker<'p, P> {
    pub fn new(provider: &'p P, thresholds: &SimilarityThresholds) -> Self {
        Self {
            provider,
            cutoff: thresholds.ranker_cutoff,
        }
    }

    /// Notes relevant to `query`, most relevant first.
    ///
    /// An empty query returns every note passing the category filter, in
    /// input order.
    pub async fn search<'n>(
        &self,
        query: &str,
        notes: &'n [Note],
        category: Option<Category>,
    ) -> Vec<&'n Note> {
        self.search_scored(query, notes, category)
            .await
            .into_iter()
            .map(|scored| scored.note)
            .collect()
    }

    /// Same as [`HybridRanker::search`] but keeps the scores.
    ///
    /// For an empty query every score is `0.0`.
    pub async fn search_scored<'n>(
        &self,
        query: &str,
        notes: &'n [Note],
        category: Option<Category>,
    ) -> Vec<ScoredNote<'n>> {
        let candidates = notes
            .iter()
            .filter(|note| category.map_or(true, |c| note.category == c));

        // whitespace-only queries are deliberately scored
        if query.is_empty() {
            return candidates
                .map(|note| ScoredNote { note, score: 0.0 })
                .collect();
        }

        let candidates: Vec<&Note> = candidates.collect();

        // one embedding call per search, not per note
        let query_embedding = self.provider.embed(query).await;
        if query_embedding.is_none() {
            log::debug!("no query embedding, ranking lexically only");
        }

        let results = rank(query, query_embedding.as_deref(), &candidates, self.cutoff);

        log::debug!(
            "search matched {} of {} candidates (semantic: {})",
            results.len(),
            candidates.len(),
            query_embedding.is_some()
        );

        results
    }
}

/// Score and order `candidates`. Synchronous half of the ranker.
pub fn rank<'n>(
    query: &str,
    query_embedding: Option<&[f32]>,
    candidates: &[&'n Note],
    cutoff: f32,
) -> Vec<ScoredNote<'n>> {
    let query_lower = query.to_lowercase();

    let mut scored: Vec<ScoredNote<'n>> = candidates
        .iter()
        .filter_map(|&note| {
            let mut score = 0.0;

            if lexical_match(&query_lower, note) {
                score += LEXICAL_MATCH_SCORE;
            }

            if let (Some(query_vec), Some(note_vec)) = (query_embedding, note.embedding.as_deref())
            {
                if query_vec.len() != note_vec.len() {
                    log::warn!(
                        "note {} embedding has {} dimensions, query has {}",
                        note.id,
                        note_vec.len(),
                        query_vec.len()
                    );
                }
                let similarity = cosine_similarity(query_vec, note_vec);
                // only positive similarity counts
                if similarity > 0.0 {
                    score += similarity;
                }
            }

            (score > cutoff).then_some(ScoredNote { note, score })
        })
        .collect();

    // stable: ties keep input order
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    scored
}

/// Case-insensitive substring test against title, transcript, then summary.
fn lexical_match(query_lower: &str, note: &Note) -> bool {
    note.text_fields()
        .any(|field| field.to_lowercase().contains(query_lower))
}
