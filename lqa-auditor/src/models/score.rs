//! Audit score model
//!
//! Scores are reported per fixed dimension. Which dimensions an audit is
//! scored on depends on its kind: audits that compare an original against a
//! localized target are scored on all eight, single-target audits skip
//! CONSISTENCY.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Score assigned to a dimension the model output did not cover
///
/// Policy constant: a missing dimension is penalized with a neutral score
/// rather than excluded. The model-reported overall score is kept as-is.
pub const FALLBACK_DIMENSION_SCORE: u8 = 50;

/// Recommendation attached to a synthesized dimension
pub const FALLBACK_RECOMMENDATION: &str = "Unable to assess — fallback";

/// Translation-quality scoring axis, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Dimension {
    Correctness,
    CulturalRelevance,
    IndustryExpertise,
    Fluency,
    Consistency,
    Completeness,
    UiUx,
    Seo,
}

impl Dimension {
    /// All dimensions in canonical order
    pub const ALL: [Dimension; 8] = [
        Dimension::Correctness,
        Dimension::CulturalRelevance,
        Dimension::IndustryExpertise,
        Dimension::Fluency,
        Dimension::Consistency,
        Dimension::Completeness,
        Dimension::UiUx,
        Dimension::Seo,
    ];

    /// Single-target audits have no reference to be consistent with
    pub const WITHOUT_CONSISTENCY: [Dimension; 7] = [
        Dimension::Correctness,
        Dimension::CulturalRelevance,
        Dimension::IndustryExpertise,
        Dimension::Fluency,
        Dimension::Completeness,
        Dimension::UiUx,
        Dimension::Seo,
    ];

    /// Wire name as the model is asked to emit it
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Correctness => "CORRECTNESS",
            Dimension::CulturalRelevance => "CULTURAL_RELEVANCE",
            Dimension::IndustryExpertise => "INDUSTRY_EXPERTISE",
            Dimension::Fluency => "FLUENCY",
            Dimension::Consistency => "CONSISTENCY",
            Dimension::Completeness => "COMPLETENESS",
            Dimension::UiUx => "UI_UX",
            Dimension::Seo => "SEO",
        }
    }

    /// Parse a dimension name, ignoring ASCII case and surrounding whitespace
    pub fn parse(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|d| d.as_str() == upper)
    }

    /// What the model is asked to evaluate for this dimension
    pub fn description(&self) -> &'static str {
        match self {
            Dimension::Correctness => "Translation accuracy, grammar, spelling, terminology fidelity",
            Dimension::CulturalRelevance => "Cultural adaptation, idioms, imagery appropriateness, tone",
            Dimension::IndustryExpertise => "Domain-specific terminology accuracy, compliance, glossary adherence",
            Dimension::Fluency => "Natural reading flow in target language, sentence structure",
            Dimension::Consistency => "Uniform terminology usage throughout, brand terms handling",
            Dimension::Completeness => "Detection of missing/untranslated content, placeholders",
            Dimension::UiUx => "Date/time formats, currency, measurements, layout considerations",
            Dimension::Seo => "Meta tags, keywords localization, title optimization",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of audit; fixes the dimension set it is scored on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditKind {
    /// Original page compared against its localized counterpart
    Comparison,
    /// Single localized page assessed on its own
    Standalone,
    /// Single page assessed for target-language proficiency
    Proficiency,
    /// Uploaded original/localized screenshots compared
    ImageSet,
}

impl AuditKind {
    /// Dimensions this kind is scored on, in canonical order
    pub fn expected_dimensions(&self) -> &'static [Dimension] {
        match self {
            AuditKind::Comparison | AuditKind::ImageSet => &Dimension::ALL,
            AuditKind::Standalone | AuditKind::Proficiency => &Dimension::WITHOUT_CONSISTENCY,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::Comparison => "COMPARISON",
            AuditKind::Standalone => "STANDALONE",
            AuditKind::Proficiency => "PROFICIENCY",
            AuditKind::ImageSet => "IMAGE_SET",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "COMPARISON" => Some(AuditKind::Comparison),
            "STANDALONE" => Some(AuditKind::Standalone),
            "PROFICIENCY" => Some(AuditKind::Proficiency),
            "IMAGE_SET" => Some(AuditKind::ImageSet),
            _ => None,
        }
    }
}

/// Score for one dimension
///
/// `findings`, `good_examples` and `recommendations` are passed through from
/// the model output without interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: Dimension,
    /// 0-100
    pub score: u8,
    #[serde(default)]
    pub findings: Vec<Value>,
    #[serde(default)]
    pub good_examples: Vec<Value>,
    #[serde(default)]
    pub recommendations: Vec<Value>,
}

impl DimensionScore {
    /// Placeholder for a dimension the model output did not cover
    pub fn fallback(dimension: Dimension) -> Self {
        Self {
            dimension,
            score: FALLBACK_DIMENSION_SCORE,
            findings: Vec::new(),
            good_examples: Vec::new(),
            recommendations: vec![Value::String(FALLBACK_RECOMMENDATION.to_string())],
        }
    }
}

/// Normalized audit result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditScore {
    /// 0-100
    pub overall_score: u8,
    /// Exactly one entry per expected dimension, canonical order
    pub dimensions: Vec<DimensionScore>,
}

impl AuditScore {
    pub fn dimension(&self, dimension: Dimension) -> Option<&DimensionScore> {
        self.dimensions.iter().find(|d| d.dimension == dimension)
    }
}

/// Clamp an arbitrary JSON number into the 0-100 score range
pub fn clamp_score(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0).floor() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_parse_is_case_insensitive() {
        assert_eq!(Dimension::parse("ui_ux"), Some(Dimension::UiUx));
        assert_eq!(Dimension::parse(" Seo "), Some(Dimension::Seo));
        assert_eq!(Dimension::parse("CULTURAL_RELEVANCE"), Some(Dimension::CulturalRelevance));
        assert_eq!(Dimension::parse("TONE"), None);
    }

    #[test]
    fn test_dimension_serde_matches_wire_name() {
        for dim in Dimension::ALL {
            let json = serde_json::to_value(dim).unwrap();
            assert_eq!(json, Value::String(dim.as_str().to_string()));
        }
    }

    #[test]
    fn test_expected_dimensions_per_kind() {
        assert_eq!(AuditKind::Comparison.expected_dimensions().len(), 8);
        assert_eq!(AuditKind::ImageSet.expected_dimensions().len(), 8);
        assert_eq!(AuditKind::Standalone.expected_dimensions().len(), 7);
        assert_eq!(AuditKind::Proficiency.expected_dimensions().len(), 7);
        assert!(!AuditKind::Standalone
            .expected_dimensions()
            .contains(&Dimension::Consistency));
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(AuditKind::parse("image-set"), Some(AuditKind::ImageSet));
        assert_eq!(AuditKind::parse("Standalone"), Some(AuditKind::Standalone));
        assert_eq!(AuditKind::parse("bogus"), None);
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(-5.0), 0);
        assert_eq!(clamp_score(85.9), 85);
        assert_eq!(clamp_score(250.0), 100);
        assert_eq!(clamp_score(f64::NAN), 0);
    }

    #[test]
    fn test_fallback_dimension() {
        let fallback = DimensionScore::fallback(Dimension::Seo);
        assert_eq!(fallback.score, 50);
        assert!(fallback.findings.is_empty());
        assert!(fallback.good_examples.is_empty());
        assert_eq!(fallback.recommendations.len(), 1);
    }
}
