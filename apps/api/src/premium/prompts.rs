// Prompts for paid document generation.
// Findings from the analysis are folded in as instructions so the rewrite
// addresses exactly what the free tier reported.

use crate::analysis::models::AnalysisResult;
use crate::llm_client::prompts::TRUTHFULNESS_INSTRUCTION;

pub const RESUME_WRITER_PERSONA: &str = "You are an expert resume writer.";
pub const COVER_LETTER_PERSONA: &str = "You are an expert cover letter writer.";

/// Generation is creative; analysis is not.
pub const GENERATION_TEMPERATURE: f32 = 0.7;

const FORMATTING_RULES: &str = "\
**Formatting requirements**:
- Use Markdown formatting for better presentation
- Use ## for main section headers (e.g., ## PROFESSIONAL EXPERIENCE)
- Use ### for subsection headers (e.g., ### Job Title at Company Name)
- Use **bold** for emphasis on important details
- Use bullet points (-) for achievements and responsibilities
- Ensure the content is ATS-friendly when converted to plain text";

const RESUME_SCHEMA: &str = r#"Please provide a JSON response with the following structure:
{
  "tailored_resume": "Complete tailored resume text here",
  "improvements": ["improvement1", "improvement2"]
}"#;

const COVER_LETTER_SCHEMA: &str = r#"Please provide a JSON response with the following structure:
{
  "cover_letter": "Complete professional cover letter text here",
  "key_points": ["key point 1", "key point 2"]
}"#;

fn push_section(
    out: &mut String,
    title: &str,
    score: f32,
    summary: &str,
    findings: (&str, &[String]),
    suggestions: (&str, &[String]),
) {
    out.push_str(&format!("\n\n{title} (Score: {score}/10):\n- {summary}"));
    for (label, items) in [findings, suggestions] {
        if !items.is_empty() {
            out.push_str(&format!("\n- {label}: {}", items.join(", ")));
        }
    }
}

/// Turns every reported finding into a rewrite instruction. Empty when there
/// is no analysis to draw on.
pub fn improvement_instructions(analysis: Option<&AnalysisResult>, has_jd: bool) -> String {
    let Some(a) = analysis else {
        return String::new();
    };

    let mut out = String::from(if has_jd {
        "Based on the comprehensive analysis, please address the following specific issues:"
    } else {
        "Based on the comprehensive analysis, please optimize the resume by addressing the following areas:"
    });

    if let Some(r) = &a.ats_compatibility {
        push_section(
            &mut out,
            "ATS COMPATIBILITY",
            r.score,
            &r.summary,
            ("Issues to fix", r.issues.as_slice()),
            ("Apply these suggestions", r.suggestions.as_slice()),
        );
    }
    if let Some(r) = &a.impact_statement_review {
        push_section(
            &mut out,
            "IMPACT STATEMENTS",
            r.score,
            &r.summary,
            ("Strengthen these weak statements", r.weak_statements.as_slice()),
            ("Apply these improvements", r.suggestions.as_slice()),
        );
    }
    if let Some(r) = &a.skills_gap_assessment {
        let label = if has_jd {
            "Address these missing skills"
        } else {
            "Consider highlighting these skills if you have them"
        };
        push_section(
            &mut out,
            "SKILLS GAPS",
            r.score,
            &r.summary,
            (label, r.missing_skills.as_slice()),
            ("Implement these suggestions", r.suggestions.as_slice()),
        );
    }
    if let Some(r) = &a.format_optimization {
        push_section(
            &mut out,
            "FORMAT OPTIMIZATION",
            r.score,
            &r.summary,
            ("Fix these format issues", r.issues.as_slice()),
            ("Apply these format improvements", r.suggestions.as_slice()),
        );
    }
    if let Some(r) = &a.career_story_flow {
        push_section(
            &mut out,
            "CAREER STORY FLOW",
            r.score,
            &r.summary,
            ("Address these career story issues", r.issues.as_slice()),
            ("Implement these improvements", r.suggestions.as_slice()),
        );
    }

    if has_jd {
        let missing = a.missing_keywords();
        if !missing.is_empty() {
            out.push_str(&format!(
                "\n\nMISSING KEYWORDS: Strategically incorporate these keywords where relevant and truthful: {}",
                missing.join(", ")
            ));
        }
    } else {
        let present = a.present_keywords();
        if !present.is_empty() {
            out.push_str(&format!(
                "\n\nSTRENGTH KEYWORDS: Ensure these existing strengths are well-highlighted: {}",
                present.join(", ")
            ));
        }
    }

    if !a.gaps_and_suggestions.is_empty() {
        out.push_str(&format!(
            "\n\nGENERAL IMPROVEMENTS: {}",
            a.gaps_and_suggestions.join(", ")
        ));
    }
    out
}

pub fn build_tailored_resume_prompt(
    resume_text: &str,
    job_description: &str,
    analysis: Option<&AnalysisResult>,
) -> String {
    let has_jd = !job_description.trim().is_empty();
    let instructions = improvement_instructions(analysis, has_jd);

    let (intro, goals) = if has_jd {
        (
            "Act as an expert resume writing assistant. Based on the original resume and \
             job description, generate a tailored, professional resume.",
            "The tailored resume should:
- Emphasize relevant skills and experience
- Incorporate job description keywords naturally and honestly
- Restructure content to match role requirements
- Strengthen weak statements with quantifiable results
- Optimize for ATS compatibility
- Maintain a clear, coherent career narrative",
        )
    } else {
        (
            "Act as an expert resume writing assistant. Based on the original resume, \
             generate an optimized, professional resume that follows best practices.",
            "The optimized resume should:
- Emphasize the strongest skills and most relevant experience
- Use industry-standard keywords and terminology
- Restructure content for maximum impact and readability
- Strengthen weak statements with quantifiable results
- Optimize for ATS compatibility
- Highlight the candidate's unique value proposition",
        )
    };

    let mut prompt = format!("{intro}\n\nORIGINAL RESUME:\n{resume_text}\n\n");
    if has_jd {
        prompt.push_str(&format!("JOB DESCRIPTION:\n{job_description}\n\n"));
    }
    if !instructions.is_empty() {
        prompt.push_str(&instructions);
        prompt.push_str("\n\n");
    }
    prompt.push_str(&format!(
        "{RESUME_SCHEMA}\n\n{goals}\n\n{TRUTHFULNESS_INSTRUCTION}\n\n{FORMATTING_RULES}"
    ));
    prompt
}

/// Cover letters are only written against a job description.
pub fn build_cover_letter_prompt(
    resume_text: &str,
    job_description: &str,
    analysis: Option<&AnalysisResult>,
) -> String {
    let mut emphasis = Vec::new();
    if let Some(a) = analysis {
        let present = a.present_keywords();
        if !present.is_empty() {
            let top: Vec<&str> = present.iter().take(5).map(String::as_str).collect();
            emphasis.push(format!("Highlight these matching skills: {}", top.join(", ")));
        }
        if let Some(gaps) = &a.skills_gap_assessment {
            if !gaps.missing_skills.is_empty() {
                let top: Vec<&str> = gaps.missing_skills.iter().take(3).map(String::as_str).collect();
                emphasis.push(format!("Address learning potential for: {}", top.join(", ")));
            }
        }
        if a.impact_statement_review.is_some() {
            emphasis.push("Emphasize quantified achievements and strong impact statements".to_string());
        }
        if a.career_story_flow.is_some() {
            emphasis.push("Create a compelling narrative that shows logical career progression".to_string());
        }
    }

    let mut prompt = format!(
        "Please create a professional cover letter based on the resume and job description.\n\n\
         RESUME:\n{resume_text}\n\nJOB DESCRIPTION:\n{job_description}\n\n"
    );
    if !emphasis.is_empty() {
        prompt.push_str("Based on the comprehensive analysis, please ensure the cover letter addresses:\n");
        for line in &emphasis {
            prompt.push_str(&format!("- {line}\n"));
        }
        prompt.push('\n');
    }
    prompt.push_str(COVER_LETTER_SCHEMA);
    prompt.push_str(
        "\n\nThe cover letter should:
- Be professional, engaging and concise (3-4 paragraphs)
- Highlight relevant experience from the resume
- Address specific requirements from the job description
- Include a proper salutation and closing
- Use keywords from the job description naturally
- Use Markdown formatting (e.g., **bold** for emphasis)\n\n",
    );
    prompt.push_str(TRUTHFULNESS_INSTRUCTION);
    prompt
}
