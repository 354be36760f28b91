//! The paper record analysed by every role.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A research paper as delivered by the arXiv fetcher.
///
/// Immutable input: the coordinator and roles only read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    /// Abstract text.
    #[serde(alias = "abstract")]
    pub summary: String,
    #[serde(default)]
    pub published: Option<NaiveDate>,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Full-text reference, when one is available.
    #[serde(default)]
    pub pdf_url: Option<String>,
}

impl Paper {
    pub fn new(id: impl Into<String>, title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            authors: Vec::new(),
            summary: summary.into(),
            published: None,
            categories: Vec::new(),
            pdf_url: None,
        }
    }

    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    /// Authors joined for prompts and reports.
    pub fn author_line(&self) -> String {
        if self.authors.is_empty() {
            "unknown".to_string()
        } else {
            self.authors.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paper_accepts_abstract_alias() {
        let raw = r#"{
            "id": "2401.00001",
            "title": "A Paper",
            "authors": ["A. Author"],
            "abstract": "We propose a thing.",
            "published": "2024-01-02"
        }"#;
        let paper: Paper = serde_json::from_str(raw).unwrap();
        assert_eq!(paper.summary, "We propose a thing.");
        assert_eq!(paper.published, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert!(paper.pdf_url.is_none());
    }

    #[test]
    fn test_author_line() {
        let paper = Paper::new("p", "t", "s").with_authors(["Jane Doe", "John Smith"]);
        assert_eq!(paper.author_line(), "Jane Doe, John Smith");
        assert_eq!(Paper::new("p", "t", "s").author_line(), "unknown");
    }
}
