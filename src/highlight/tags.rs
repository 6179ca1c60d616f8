//! The closed vocabulary of semantic highlight tags
//!
//! Annotation wraps spans of generated content in category tags:
//! - <persona>, <segment> for who the copy addresses
//! - <outcome>, <blocker> for what it promises and what it unblocks
//! - <cta>, <resource>, <personalized> for actions, assets and tailoring
//!
//! The set is closed: markup using any other tag name is treated as literal
//! text everywhere in the pipeline.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Semantic category a highlighted span belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightTag {
    /// A named persona the copy addresses
    Persona,

    /// An audience segment
    Segment,

    /// A desired outcome the copy promises
    Outcome,

    /// A pain point or obstacle the copy speaks to
    Blocker,

    /// A call to action
    Cta,

    /// A referenced asset, such as a case study
    Resource,

    /// A span tailored to the specific recipient
    Personalized,
}

impl HighlightTag {
    /// Every recognized tag, in capture-group order of the pair pattern
    pub const ALL: [HighlightTag; 7] = [
        HighlightTag::Persona,
        HighlightTag::Segment,
        HighlightTag::Outcome,
        HighlightTag::Blocker,
        HighlightTag::Cta,
        HighlightTag::Resource,
        HighlightTag::Personalized,
    ];

    /// Tag name as it appears in markup
    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightTag::Persona => "persona",
            HighlightTag::Segment => "segment",
            HighlightTag::Outcome => "outcome",
            HighlightTag::Blocker => "blocker",
            HighlightTag::Cta => "cta",
            HighlightTag::Resource => "resource",
            HighlightTag::Personalized => "personalized",
        }
    }

    /// Parse a tag name, case-insensitive
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "persona" => Some(HighlightTag::Persona),
            "segment" => Some(HighlightTag::Segment),
            "outcome" => Some(HighlightTag::Outcome),
            "blocker" => Some(HighlightTag::Blocker),
            "cta" => Some(HighlightTag::Cta),
            "resource" => Some(HighlightTag::Resource),
            "personalized" => Some(HighlightTag::Personalized),
            _ => None,
        }
    }

    /// Human-readable label for renderers and tooltips
    pub fn label(&self) -> &'static str {
        match self {
            HighlightTag::Persona => "Persona",
            HighlightTag::Segment => "Audience Segment",
            HighlightTag::Outcome => "Desired Outcome",
            HighlightTag::Blocker => "Known Blocker",
            HighlightTag::Cta => "Call to Action",
            HighlightTag::Resource => "Referenced Resource",
            HighlightTag::Personalized => "Personalization",
        }
    }

    /// What the annotation pass should wrap in this tag
    pub fn guidance(&self) -> &'static str {
        match self {
            HighlightTag::Persona => "mentions of a named persona or job title the copy addresses",
            HighlightTag::Segment => "mentions of an audience segment or market",
            HighlightTag::Outcome => "phrases promising a desired outcome or result",
            HighlightTag::Blocker => "phrases naming a pain point or obstacle",
            HighlightTag::Cta => "calls to action, offers, or next steps",
            HighlightTag::Resource => "references to an asset such as a case study or guide",
            HighlightTag::Personalized => "phrases tailored to the specific recipient",
        }
    }
}

impl std::fmt::Display for HighlightTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Matches any recognized open tag, case-insensitive
pub(crate) fn open_tag_pattern() -> &'static Regex {
    static PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)<(persona|segment|outcome|blocker|cta|resource|personalized)>")
            .expect("Valid open tag regex")
    });
    &PATTERN
}

/// Matches a well-formed open/close pair of the same tag
///
/// One alternation branch per tag (the regex crate has no backreferences);
/// capture group N holds the inner text for `HighlightTag::ALL[N - 1]`.
pub(crate) fn tag_pair_pattern() -> &'static Regex {
    static PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?is)<persona>(.*?)</persona>|<segment>(.*?)</segment>|<outcome>(.*?)</outcome>|<blocker>(.*?)</blocker>|<cta>(.*?)</cta>|<resource>(.*?)</resource>|<personalized>(.*?)</personalized>",
        )
        .expect("Valid tag pair regex")
    });
    &PATTERN
}
