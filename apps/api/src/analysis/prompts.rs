// Prompt construction for resume analysis.
// One prompt per call: the core job-match task plus one block and one JSON
// section per requested dimension.

use std::collections::BTreeSet;

use crate::analysis::models::Dimension;

pub const ANALYSIS_PERSONA: &str = "You are an expert resume analyzer.";

/// Analysis is near-deterministic.
pub const ANALYSIS_TEMPERATURE: f32 = 0.1;

const CORE_TASKS: &str = "\
1. Extract the most relevant **keywords** from the job description.
2. Check if these keywords are present in the resume.
3. Identify key **skills or qualifications** that are missing or weakly represented in the resume.
4. Provide a brief **summary** on how well the resume matches the job.
5. Give a **match score out of 100** based on relevance and completeness.";

const CORE_SCHEMA: &str = r#"  "match_summary": "Short paragraph summarizing the overall compatibility",
  "match_score": "XX/100",
  "job_keywords_detected": [
    {"keyword": "JavaScript", "status": "Present"},
    {"keyword": "React", "status": "Missing"}
  ],
  "gaps_and_suggestions": [
    "The resume lacks mention of specific skill/requirement",
    "Add more emphasis on relevant experience/project"
  ]"#;

fn instructions(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::JobMatch => "",
        Dimension::AtsCompatibility => "\
ATS COMPATIBILITY CHECK: Analyze if the resume will pass Applicant Tracking Systems. Check for:
   - Standard section headings
   - Proper formatting
   - Keyword density
   - File format compatibility
   - Parsing issues",
        Dimension::ImpactStatementReview => "\
IMPACT STATEMENT REVIEW: Evaluate the strength of accomplishments and achievements:
   - Identify weak or vague statements
   - Look for quantified results
   - Assess action verbs usage
   - Check for specific examples",
        Dimension::SkillsGapAssessment => "\
SKILLS GAP ASSESSMENT: Compare candidate skills to job requirements:
   - Identify missing technical skills
   - Assess soft skills alignment
   - Check certification requirements
   - Evaluate experience level match",
        Dimension::FormatOptimization => "\
FORMAT OPTIMIZATION: Review resume formatting and structure:
   - Section organization
   - Visual hierarchy
   - Length appropriateness
   - Professional appearance",
        Dimension::CareerStoryFlow => "\
CAREER STORY FLOW: Analyze career progression narrative:
   - Logical career progression
   - Consistency in roles
   - Gap explanations
   - Overall coherence",
    }
}

fn schema(dimension: Dimension) -> String {
    let (list_field, summary) = match dimension {
        Dimension::JobMatch => return String::new(),
        Dimension::AtsCompatibility => ("issues", "Brief summary of ATS compatibility"),
        Dimension::ImpactStatementReview => ("weak_statements", "Brief summary of impact statements"),
        Dimension::SkillsGapAssessment => ("missing_skills", "Brief summary of skills gaps"),
        Dimension::FormatOptimization => ("issues", "Brief summary of format issues"),
        Dimension::CareerStoryFlow => ("issues", "Brief summary of career story flow"),
    };
    format!(
        r#"  "{id}": {{
    "score": 7,
    "summary": "{summary}",
    "{list_field}": ["Item 1", "Item 2"],
    "suggestions": ["Suggestion 1", "Suggestion 2"]
  }}"#,
        id = dimension.id()
    )
}

/// Builds the single analysis prompt. `dimensions` must not contain the core
/// dimension; an empty `job_description` drops every job-match task.
pub fn build_analysis_prompt(
    resume_text: &str,
    job_description: &str,
    dimensions: &BTreeSet<Dimension>,
) -> String {
    let has_jd = !job_description.trim().is_empty();
    let extra: Vec<Dimension> = Dimension::OPTIONAL
        .into_iter()
        .filter(|d| dimensions.contains(d))
        .collect();

    let mut prompt = String::from("You are an expert resume reviewer and job match analyst.\n\n");

    if has_jd {
        prompt.push_str(
            "Given the following **resume** and **job description**, perform the following tasks:\n\n",
        );
        prompt.push_str(CORE_TASKS);
        prompt.push_str("\n\n");
    } else {
        prompt.push_str(
            "Given the following **resume** (no job description was provided), \
             perform the analyses below. Omit job-match fields from the response.\n\n",
        );
    }

    if !extra.is_empty() {
        if has_jd {
            prompt.push_str("Additionally, perform these specific analyses:\n");
        }
        for (index, dimension) in extra.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", index + 1, instructions(*dimension)));
        }
        prompt.push('\n');
    }

    prompt.push_str("RESUME:\n");
    prompt.push_str(resume_text);
    prompt.push_str("\n\n");
    if has_jd {
        prompt.push_str("JOB DESCRIPTION:\n");
        prompt.push_str(job_description);
        prompt.push_str("\n\n");
    }

    let mut sections: Vec<String> = Vec::new();
    if has_jd {
        sections.push(CORE_SCHEMA.to_string());
    }
    sections.extend(extra.iter().map(|d| schema(*d)));

    prompt.push_str("Please provide a JSON response with the following structure:\n{\n");
    prompt.push_str(&sections.join(",\n"));
    prompt.push_str("\n}\n\nBe concise but insightful. Write in plain, helpful English.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_only_prompt() {
        let prompt = build_analysis_prompt("RESUME BODY", "JD BODY", &BTreeSet::new());
        assert!(prompt.contains("match score out of 100"));
        assert!(prompt.contains("JOB DESCRIPTION:\nJD BODY"));
        assert!(prompt.contains("\"match_score\": \"XX/100\""));
        assert!(!prompt.contains("Additionally"));
        assert!(!prompt.contains("ats_compatibility"));
    }

    #[test]
    fn test_requested_dimensions_add_sections() {
        let dims = BTreeSet::from([Dimension::SkillsGapAssessment, Dimension::AtsCompatibility]);
        let prompt = build_analysis_prompt("R", "J", &dims);
        assert!(prompt.contains("ATS COMPATIBILITY CHECK"));
        assert!(prompt.contains("SKILLS GAP ASSESSMENT"));
        assert!(prompt.contains("\"missing_skills\""));
        assert!(!prompt.contains("CAREER STORY FLOW"));
        // ATS comes before skills gap regardless of set order.
        assert!(prompt.find("ATS COMPATIBILITY").unwrap() < prompt.find("SKILLS GAP").unwrap());
    }

    #[test]
    fn test_prompt_without_job_description_omits_job_match() {
        let dims = BTreeSet::from([Dimension::FormatOptimization]);
        let prompt = build_analysis_prompt("R", "   ", &dims);
        assert!(!prompt.contains("JOB DESCRIPTION:"));
        assert!(!prompt.contains("match_score"));
        assert!(prompt.contains("\"format_optimization\""));
    }

    #[test]
    fn test_core_dimension_is_ignored_in_extras() {
        let dims = BTreeSet::from([Dimension::JobMatch]);
        let prompt = build_analysis_prompt("R", "J", &dims);
        assert!(!prompt.contains("Additionally"));
    }
}
