use serde::Serialize;

use crate::notes::NoteId;
use crate::similarity::SimilarityMatrix;

/// A visual connection between two similar notes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub from: NoteId,
    pub to: NoteId,
    pub similarity: f32,
}

/// Pairs whose similarity is strictly above `threshold`.
///
/// Read-only projection of the similarity data; it plays no part in the
/// physics. Pairs missing an embedding on either side never qualify.
pub fn similarity_edges(
    ids: &[NoteId],
    similarities: &SimilarityMatrix,
    threshold: f32,
) -> Vec<Edge> {
    let mut edges = vec![];

    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            if let Some(similarity) = similarities.get(i, j) {
                if similarity > threshold {
                    edges.push(Edge {
                        from: ids[i].clone(),
                        to: ids[j].clone(),
                        similarity,
                    });
                }
            }
        }
    }

    edges
}
