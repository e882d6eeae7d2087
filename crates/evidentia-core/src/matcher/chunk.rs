//! Evidence chunking
//!
//! Documents with page markers split into one chunk per marked page; text
//! before the first marker becomes a page-less preamble chunk. Documents
//! without markers split into paragraphs on blank lines.

use lazy_static::lazy_static;
use regex::Regex;

use crate::citation::PAGE_MARKER;
use crate::model::EvidenceDocument;

lazy_static! {
    static ref BLANK_LINE: Regex = Regex::new(r"\n[ \t]*\r?\n").expect("blank line pattern is valid");
}

/// A scored unit of evidence text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Page this chunk was taken from, if the document is page-marked
    pub page: Option<u32>,
    pub text: String,
}

/// Split `document` into chunks. Whitespace-only spans are dropped.
pub fn chunk_document(document: &EvidenceDocument) -> Vec<Chunk> {
    let content = document.content.as_str();
    let markers: Vec<_> = PAGE_MARKER.captures_iter(content).collect();

    if markers.is_empty() {
        return BLANK_LINE
            .split(content)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| Chunk {
                page: None,
                text: p.to_string(),
            })
            .collect();
    }

    let mut chunks = Vec::with_capacity(markers.len() + 1);

    let first_start = markers[0].get(0).map(|m| m.start()).unwrap_or(0);
    push_chunk(&mut chunks, None, &content[..first_start]);

    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Ok(page) = number.as_str().parse::<u32>() else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(content.len());
        push_chunk(&mut chunks, Some(page), &content[whole.end()..end]);
    }

    chunks
}

fn push_chunk(chunks: &mut Vec<Chunk>, page: Option<u32>, span: &str) {
    let text = span.trim();
    if !text.is_empty() {
        chunks.push(Chunk {
            page,
            text: text.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EvidenceType;
    use chrono::NaiveDate;

    fn doc(content: &str) -> EvidenceDocument {
        EvidenceDocument::new(
            "ev",
            "Doc",
            EvidenceType::Report,
            content,
            0,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn splits_on_page_markers() {
        let chunks = chunk_document(&doc(
            "Cover sheet\n--- Page 1 ---\nfirst page\n--- PAGE 2 ---\n\n--- page 3 ---\nthird",
        ));
        assert_eq!(
            chunks,
            vec![
                Chunk { page: None, text: "Cover sheet".into() },
                Chunk { page: Some(1), text: "first page".into() },
                Chunk { page: Some(3), text: "third".into() },
            ]
        );
    }

    #[test]
    fn splits_unmarked_text_into_paragraphs() {
        let chunks = chunk_document(&doc("alpha line\nstill alpha\n\n  \n beta \n\n"));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "alpha line\nstill alpha");
        assert_eq!(chunks[1].text, "beta");
        assert!(chunks.iter().all(|c| c.page.is_none()));
    }

    #[test]
    fn empty_document_has_no_chunks() {
        assert!(chunk_document(&doc("   ")).is_empty());
    }
}
