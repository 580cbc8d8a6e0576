//! Issues found on audited pages.

use serde::{Deserialize, Serialize};

/// How much an issue matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Keeps the page out of search results or badly hurts it
    Critical,
    /// Worth fixing soon
    Warning,
    /// Minor improvement
    Notice,
}

/// Kind of issue. Each kind has a fixed severity and base penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// 4xx/5xx response
    HttpError,
    /// No `<title>`
    MissingTitle,
    /// Title under 10 characters
    TitleTooShort,
    /// Title over 60 characters
    TitleTooLong,
    /// No meta description
    MissingMetaDescription,
    /// Meta description under 50 characters
    MetaDescriptionTooShort,
    /// Meta description over 160 characters
    MetaDescriptionTooLong,
    /// No `<h1>`
    MissingH1,
    /// More than one `<h1>`
    MultipleH1,
    /// Under 300 words of text
    ThinContent,
    /// Images without `alt`
    ImagesMissingAlt,
    /// Robots meta says `noindex`
    Noindex,
    /// No canonical link
    MissingCanonical,
    /// No `lang` attribute
    MissingLang,
    /// No viewport meta
    MissingViewport,
    /// No JSON-LD
    NoStructuredData,
    /// Slow server response
    SlowResponse,
    /// Heavy HTML document
    LargePage,
}

impl IssueKind {
    /// Severity of this kind of issue.
    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            Self::HttpError | Self::MissingTitle | Self::Noindex => Severity::Critical,
            Self::MissingMetaDescription
            | Self::MissingH1
            | Self::ThinContent
            | Self::ImagesMissingAlt
            | Self::MissingViewport
            | Self::TitleTooShort
            | Self::TitleTooLong
            | Self::SlowResponse => Severity::Warning,
            Self::MetaDescriptionTooShort
            | Self::MetaDescriptionTooLong
            | Self::MultipleH1
            | Self::MissingCanonical
            | Self::MissingLang
            | Self::NoStructuredData
            | Self::LargePage => Severity::Notice,
        }
    }

    /// Points deducted from the page SEO score.
    #[must_use]
    pub fn penalty(self) -> u32 {
        match self {
            Self::HttpError => 100,
            Self::Noindex => 25,
            Self::MissingTitle => 20,
            Self::MissingMetaDescription | Self::MissingH1 | Self::ThinContent | Self::MissingViewport => 10,
            Self::TitleTooShort | Self::TitleTooLong | Self::MultipleH1 | Self::NoStructuredData => 5,
            Self::MetaDescriptionTooShort
            | Self::MetaDescriptionTooLong
            | Self::MissingCanonical
            | Self::MissingLang => 3,
            // Scaled per image by the SEO rules; performance issues do not
            // affect the SEO score
            Self::ImagesMissingAlt | Self::SlowResponse | Self::LargePage => 0,
        }
    }
}

/// A single finding on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// What is wrong
    pub kind: IssueKind,
    /// How much it matters
    pub severity: Severity,
    /// Points deducted
    pub penalty: u32,
    /// Human-readable detail
    pub message: String,
}

impl Issue {
    /// Issue with the kind's default penalty.
    #[must_use]
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self::with_penalty(kind, kind.penalty(), message)
    }

    /// Issue with an explicit penalty.
    #[must_use]
    pub fn with_penalty(kind: IssueKind, penalty: u32, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            penalty,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_serializes_snake_case() {
        let issue = Issue::new(IssueKind::MissingMetaDescription, "no description");
        let json = serde_json::to_value(&issue).expect("serialize");
        assert_eq!(json["kind"], "missing_meta_description");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["penalty"], 10);
    }

    #[test]
    fn test_critical_kinds() {
        assert_eq!(IssueKind::Noindex.severity(), Severity::Critical);
        assert_eq!(IssueKind::LargePage.severity(), Severity::Notice);
        assert!(Severity::Critical < Severity::Notice);
    }
}
