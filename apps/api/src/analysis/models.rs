//! Analysis result shape returned by the completion service, plus the
//! derived numbers every consumer shares (score extraction, issue summary).

use std::fmt;

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Dimensions
// ────────────────────────────────────────────────────────────────────────────

/// A named analysis facet the user may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Core compatibility scoring and keyword matching. Needs a job description.
    #[serde(rename = "job_match_analysis")]
    JobMatch,
    AtsCompatibility,
    ImpactStatementReview,
    SkillsGapAssessment,
    FormatOptimization,
    CareerStoryFlow,
}

impl Dimension {
    /// Every dimension other than the core job match, in prompt order.
    pub const OPTIONAL: [Dimension; 5] = [
        Dimension::AtsCompatibility,
        Dimension::ImpactStatementReview,
        Dimension::SkillsGapAssessment,
        Dimension::FormatOptimization,
        Dimension::CareerStoryFlow,
    ];

    pub fn is_core(self) -> bool {
        self == Dimension::JobMatch
    }

    pub fn id(self) -> &'static str {
        match self {
            Dimension::JobMatch => "job_match_analysis",
            Dimension::AtsCompatibility => "ats_compatibility",
            Dimension::ImpactStatementReview => "impact_statement_review",
            Dimension::SkillsGapAssessment => "skills_gap_assessment",
            Dimension::FormatOptimization => "format_optimization",
            Dimension::CareerStoryFlow => "career_story_flow",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Dimension::JobMatch => "Job Match Analysis",
            Dimension::AtsCompatibility => "ATS Compatibility Check",
            Dimension::ImpactStatementReview => "Impact Statement Review",
            Dimension::SkillsGapAssessment => "Skills Gap Assessment",
            Dimension::FormatOptimization => "Format Optimization",
            Dimension::CareerStoryFlow => "Career Story Flow Analysis",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Result payload
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeywordStatus {
    Present,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobKeyword {
    pub keyword: String,
    pub status: KeywordStatus,
}

/// Sub-report shared by ATS compatibility, format optimization and career story flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionReport {
    /// 0 – 10
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactStatementReport {
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub weak_statements: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillsGapReport {
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Structured analysis returned by the completion service.
///
/// Job-match fields are absent when no job description was supplied, so they
/// all default. Optional sections are present only when requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub match_summary: String,
    /// e.g. "72/100"
    #[serde(default)]
    pub match_score: String,
    #[serde(default)]
    pub job_keywords_detected: Vec<JobKeyword>,
    #[serde(default)]
    pub gaps_and_suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ats_compatibility: Option<SectionReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_statement_review: Option<ImpactStatementReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills_gap_assessment: Option<SkillsGapReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_optimization: Option<SectionReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub career_story_flow: Option<SectionReport>,
}

impl AnalysisResult {
    /// Numeric match score, per [`extract_score`].
    pub fn numeric_score(&self) -> u32 {
        extract_score(&self.match_score)
    }

    /// Width of the score bar, 0 – 100.
    pub fn progress_percent(&self) -> u32 {
        self.numeric_score().min(100)
    }

    pub fn present_keywords(&self) -> Vec<String> {
        self.keywords_with(KeywordStatus::Present)
    }

    pub fn missing_keywords(&self) -> Vec<String> {
        self.keywords_with(KeywordStatus::Missing)
    }

    fn keywords_with(&self, status: KeywordStatus) -> Vec<String> {
        self.job_keywords_detected
            .iter()
            .filter(|k| k.status == status)
            .map(|k| k.keyword.clone())
            .collect()
    }

    /// Counts the problems the analysis surfaced, for the premium upsell.
    /// General gaps only count when no specific issue was found.
    pub fn issue_summary(&self) -> IssueSummary {
        let mut summary = IssueSummary::default();

        if let Some(ats) = &self.ats_compatibility {
            summary.add(ats.issues.len(), "ATS compatibility problem");
        }
        summary.add(self.missing_keywords().len(), "missing keyword");
        if let Some(impact) = &self.impact_statement_review {
            summary.add(impact.weak_statements.len(), "weak impact statement");
        }
        if let Some(skills) = &self.skills_gap_assessment {
            summary.add(skills.missing_skills.len(), "skill gap");
        }
        if let Some(format) = &self.format_optimization {
            summary.add(format.issues.len(), "format issue");
        }
        if let Some(story) = &self.career_story_flow {
            summary.add(story.issues.len(), "career story issue");
        }
        if summary.total == 0 {
            summary.add(self.gaps_and_suggestions.len(), "improvement area");
        }

        summary
    }
}

/// Total issue count plus one human-readable phrase per non-empty category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssueSummary {
    pub total: usize,
    pub details: Vec<String>,
}

impl IssueSummary {
    fn add(&mut self, count: usize, noun: &str) {
        if count == 0 {
            return;
        }
        let plural = if count > 1 { "s" } else { "" };
        self.details.push(format!("{count} {noun}{plural}"));
        self.total += count;
    }
}

/// Numeric value of a score string: the first contiguous run of ASCII digits,
/// or 0 when there are none. Saturates at `u32::MAX`.
pub fn extract_score(score: &str) -> u32 {
    score
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .map_while(|c| c.to_digit(10))
        .fold(0u32, |acc, d| acc.saturating_mul(10).saturating_add(d))
}
