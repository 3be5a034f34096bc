//! Prompt text for the criterion-level judge

use super::Polarity;
use crate::model::{parse_criteria, Candidate, JobDocument};

/// Criteria block rendered as `"<n>. <criterion>"` lines, numbered from 0
pub fn numbered_criteria(block: &str) -> String {
    parse_criteria(block)
        .iter()
        .enumerate()
        .map(|(idx, criterion)| format!("{}. {}\n", idx, criterion))
        .collect()
}

/// Job as the judge sees it: title, summary and the criteria of one polarity
pub fn job_prompt(job: &JobDocument, polarity: Polarity) -> String {
    let mut text = format!(
        "Title: {}\nSummary: {}\n",
        job.display_title(),
        job.metadata.summary
    );

    match polarity {
        Polarity::Inclusion => {
            text.push_str("Inclusion criteria:\n");
            text.push_str(&numbered_criteria(&job.metadata.inclusion_criteria));
        }
        Polarity::Exclusion => {
            text.push_str("Exclusion criteria:\n");
            text.push_str(&numbered_criteria(&job.metadata.exclusion_criteria));
        }
    }

    text
}

fn label_instructions(polarity: Polarity) -> &'static str {
    match polarity {
        Polarity::Inclusion => {
            "Choose the label from {\"included\", \"not included\", \"not applicable\", \"not enough information\"}. \
             \"included\" means the candidate meets the criterion and \"not included\" means they do not. \
             Use \"not applicable\" only when the premise of the criterion does not apply to this candidate. \
             Use \"not enough information\" sparingly: when a resume would normally list a qualification \
             and this one does not, assume the candidate lacks it.\n"
        }
        Polarity::Exclusion => {
            "Choose the label from {\"excluded\", \"not excluded\", \"not applicable\", \"not enough information\"}. \
             \"excluded\" means the disqualifying condition holds for the candidate and \"not excluded\" means it does not. \
             Use \"not applicable\" only when the premise of the criterion does not apply to this candidate. \
             Use \"not enough information\" sparingly: when a resume would normally mention a disqualifying \
             condition and this one does not, assume it does not hold.\n"
        }
    }
}

/// System and user prompt for judging one polarity of one job
pub fn matching_prompts(candidate: &Candidate, job: &JobDocument, polarity: Polarity) -> (String, String) {
    let mut system = format!(
        "You screen job applications. Compare the candidate resume against the {} criteria \
         of a job posting and decide the candidate's eligibility one criterion at a time.\n",
        polarity
    );

    system.push_str(match polarity {
        Polarity::Inclusion => {
            "Inclusion criteria are the qualifications, skills, experience and attributes a candidate \
             needs to advance in screening.\n"
        }
        Polarity::Exclusion => {
            "Exclusion criteria are the conditions that disqualify a candidate during initial screening.\n"
        }
    });

    system.push_str(&format!(
        "For every {} criterion produce three elements:\n\
         \t1. A short reasoning. First decide whether the criterion applies at all. Then look for direct \
         evidence in the resume. Without direct evidence, infer from what is there, asking whether a typical \
         resume would leave this information out if the criterion held.\n\
         \t2. The list of resume sentence ids that support your reasoning, or an empty list.\n\
         \t3. The eligibility label. ",
        polarity
    ));
    system.push_str(label_instructions(polarity));
    system.push_str(
        "Reply with a JSON object only, shaped as \
         {\"<criterion number>\": [\"<reasoning>\", [<sentence id>, ...], \"<label>\"]}.",
    );

    let user = format!(
        "Candidate resume, one sentence per line, each led by its sentence id:\n{}\n\n\
         Job posting:\n{}\n\n\
         JSON reply:",
        candidate.numbered_text(),
        job_prompt(job, polarity)
    );

    (system, user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JobMetadata;

    fn job() -> JobDocument {
        JobDocument {
            id: "J1".to_string(),
            title: "Backend Engineer".to_string(),
            text: String::new(),
            metadata: JobMetadata {
                title: "Senior Backend Engineer".to_string(),
                summary: "Own the payments service.".to_string(),
                inclusion_criteria: "Inclusion Criteria:\n\n5+ years of Rust\n\nOn-call rotation".to_string(),
                exclusion_criteria: "No\n\nNon-compete with a competitor".to_string(),
            },
        }
    }

    #[test]
    fn test_numbered_criteria() {
        assert_eq!(
            numbered_criteria(&job().metadata.inclusion_criteria),
            "0. 5+ years of Rust\n1. On-call rotation\n"
        );
    }

    #[test]
    fn test_job_prompt_shows_one_polarity() {
        let inclusion = job_prompt(&job(), Polarity::Inclusion);
        assert!(inclusion.starts_with("Title: Senior Backend Engineer\nSummary: Own the payments service.\n"));
        assert!(inclusion.contains("0. 5+ years of Rust"));
        assert!(!inclusion.contains("Non-compete"));

        let exclusion = job_prompt(&job(), Polarity::Exclusion);
        assert!(exclusion.contains("Exclusion criteria:\n0. Non-compete with a competitor\n"));
    }

    #[test]
    fn test_prompts_carry_numbered_resume_and_labels() {
        let candidate = Candidate::new("c1", "I write Rust. I carry a pager.");
        let (system, user) = matching_prompts(&candidate, &job(), Polarity::Exclusion);

        assert!(system.contains("\"not excluded\""));
        assert!(!system.contains("\"not included\""));
        assert!(user.contains("0. I write Rust.\n1. I carry a pager.\n2. "));
        assert!(user.ends_with("JSON reply:"));
    }
}
