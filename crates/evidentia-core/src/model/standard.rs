//! Accreditation standards
//!
//! Standards form a tree per accreditor. Structural validation (acyclic,
//! unique codes, known parents) lives in `corpus::StandardsCorpus`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::Domain;
use crate::error::{CorpusError, Result};
use crate::text;

/// A single accreditor requirement node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standard {
    pub id: String,
    /// Human-readable code, e.g. "3.3.1"
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub accreditor: String,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default)]
    pub domain: Option<Domain>,
}

impl Standard {
    pub fn builder() -> StandardBuilder {
        StandardBuilder::default()
    }

    /// Keywords, derived from title and description when none were supplied
    pub fn effective_keywords(&self) -> BTreeSet<String> {
        if !self.keywords.is_empty() {
            return self.keywords.iter().map(|k| k.to_lowercase()).collect();
        }
        text::terms(&format!("{} {}", self.title, self.description))
    }

    /// Every term the matcher compares against evidence
    pub fn match_terms(&self) -> BTreeSet<String> {
        let mut terms = text::terms(&format!("{} {}", self.title, self.description));
        for keyword in &self.keywords {
            terms.extend(text::terms(keyword));
        }
        terms
    }

    /// Text embedded for this standard: title, description and keywords
    pub fn embedding_text(&self) -> String {
        let keywords: Vec<&str> = self.keywords.iter().map(String::as_str).collect();
        [self.title.as_str(), self.description.as_str(), &keywords.join(" ")]
            .iter()
            .filter(|part| !part.trim().is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// "3.3.1 Institutional Effectiveness"
    pub fn label(&self) -> String {
        format!("{} {}", self.code, self.title)
    }
}

/// Builder for `Standard`
#[derive(Debug, Default)]
pub struct StandardBuilder {
    id: Option<String>,
    code: Option<String>,
    title: Option<String>,
    description: String,
    parent_id: Option<String>,
    accreditor: Option<String>,
    keywords: BTreeSet<String>,
    domain: Option<Domain>,
}

impl StandardBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn accreditor(mut self, accreditor: impl Into<String>) -> Self {
        self.accreditor = Some(accreditor.into());
        self
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.insert(keyword.into());
        self
    }

    pub fn domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Build the standard. The id defaults to the code, the accreditor to
    /// "unspecified".
    ///
    /// # Errors
    ///
    /// Returns `CorpusError::MissingStandardField` if the code or the title
    /// was not supplied.
    pub fn build(self) -> Result<Standard> {
        let code = self.code.ok_or(CorpusError::MissingStandardField("code"))?;
        let title = self.title.ok_or(CorpusError::MissingStandardField("title"))?;
        Ok(Standard {
            id: self.id.unwrap_or_else(|| code.clone()),
            code,
            title,
            description: self.description,
            parent_id: self.parent_id,
            accreditor: self.accreditor.unwrap_or_else(|| "unspecified".to_string()),
            keywords: self.keywords,
            domain: self.domain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvidentiaError;

    #[test]
    fn keywords_derived_when_absent() {
        let standard = Standard::builder()
            .code("3.3.1")
            .title("Institutional Effectiveness")
            .description("The institution identifies expected outcomes")
            .build()
            .unwrap();

        let keywords = standard.effective_keywords();
        assert!(keywords.contains("institutional"));
        assert!(keywords.contains("outcomes"));
        assert!(!keywords.contains("the"));
    }

    #[test]
    fn explicit_keywords_take_precedence() {
        let standard = Standard::builder()
            .code("3.3.1")
            .title("Institutional Effectiveness")
            .keyword("Assessment")
            .build()
            .unwrap();

        assert_eq!(
            standard.effective_keywords().into_iter().collect::<Vec<_>>(),
            vec!["assessment".to_string()]
        );
        assert!(standard.match_terms().contains("effectiveness"));
        assert!(standard.match_terms().contains("assessment"));
    }

    #[test]
    fn builder_defaults_id_to_code() {
        let standard = Standard::builder().code("1.1").title("Mission").build().unwrap();
        assert_eq!(standard.id, "1.1");
        assert_eq!(standard.label(), "1.1 Mission");
    }

    #[test]
    fn builder_reports_the_missing_field() {
        let err = Standard::builder().title("No code").build().unwrap_err();
        assert!(matches!(
            err,
            EvidentiaError::Corpus(CorpusError::MissingStandardField("code"))
        ));

        let err = Standard::builder().code("1.1").build().unwrap_err();
        assert!(err.to_string().contains("'title'"));
    }
}
