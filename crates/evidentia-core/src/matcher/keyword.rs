//! Keyword-overlap scorer, used when no embedding backend is available.

use std::collections::BTreeSet;

use super::chunk::Chunk;
use crate::text;

/// Jaccard overlap between the standard's terms and the standard terms each
/// chunk mentions. Chunk vocabulary outside the standard's terms is ignored,
/// so page length does not dilute the score.
pub fn score_chunks(standard_terms: &BTreeSet<String>, chunks: &[Chunk]) -> Vec<f64> {
    chunks
        .iter()
        .map(|chunk| {
            let mentioned: BTreeSet<String> = standard_terms
                .intersection(&text::terms(&chunk.text))
                .cloned()
                .collect();
            text::jaccard(standard_terms, &mentioned)
        })
        .collect()
}

/// Standard terms present in any of `chunks`
pub fn matched_terms<'a>(
    standard_terms: &BTreeSet<String>,
    chunks: impl IntoIterator<Item = &'a Chunk>,
) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for chunk in chunks {
        let chunk_terms = text::terms(&chunk.text);
        found.extend(standard_terms.intersection(&chunk_terms).cloned());
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> Chunk {
        Chunk {
            page: None,
            text: text.to_string(),
        }
    }

    #[test]
    fn identical_terms_score_one() {
        let terms = text::terms("Institutional Effectiveness assessment");
        let scores = score_chunks(
            &terms,
            &[chunk("institutional effectiveness assessment"), chunk("parking permits")],
        );
        assert_eq!(scores, vec![1.0, 0.0]);
    }

    #[test]
    fn long_pages_are_not_diluted() {
        let terms = text::terms("Institutional Effectiveness assessment");
        let page = chunk(
            "The institutional effectiveness office completed its annual assessment cycle \
             for every academic program. Results were shared with deans in October, and \
             each department filed an improvement plan with the provost.",
        );
        let partial = chunk("The assessment calendar is published each spring.");

        let scores = score_chunks(&terms, &[page, partial]);
        assert_eq!(scores[0], 1.0);
        assert!((scores[1] - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn collects_shared_terms() {
        let terms = text::terms("assessment of learning outcomes");
        let chunks = [chunk("annual assessment report"), chunk("student learning")];
        let found = matched_terms(&terms, chunks.iter());
        assert_eq!(
            found.into_iter().collect::<Vec<_>>(),
            vec!["assessment".to_string(), "learning".to_string()]
        );
    }
}
