// Prompt templates for the review client. Placeholders in braces are
// substituted by the builders below; the response markers must stay in sync
// with `parse.rs`.

const REVIEW_PROMPT_TEMPLATE: &str = r#"Job Description:
{job_description}

Resume:
{resume_text}

Summarize the resume against the job description. Respond in exactly this layout:

Summary: <a concise summary of the applicant's qualifications>
SCORE: <a number from 0.0 to 1.0 for how well the resume matches the job description>
QUESTIONS: <questions about qualifications the job needs but the resume does not show, all on this one line, or None>
"#;

const REVIEW_WITH_HISTORY_PROMPT_TEMPLATE: &str = r#"Job Description:
{job_description}

Resume:
{resume_text}

Previous Conversation History:
{history}

Questions Previously Asked:
{prior_question}

Re-assess the applicant against the job description, taking the whole conversation into account, including any answers to the earlier questions. Respond in exactly this layout:

Summary: <a concise summary of the applicant's qualifications in light of their answers>
SCORE: <a number from 0.0 to 1.0 for the overall match>
QUESTIONS: <remaining questions about unclear or missing qualifications, all on this one line, or None if nothing is left to ask>
"#;

const CONVERSE_PROMPT_TEMPLATE: &str = "User: {message}\nAssistant:";

pub fn review_prompt(job_description: &str, resume_text: &str) -> String {
    REVIEW_PROMPT_TEMPLATE
        .replace("{job_description}", job_description)
        .replace("{resume_text}", resume_text)
}

pub fn review_with_history_prompt(
    job_description: &str,
    resume_text: &str,
    history: &str,
    prior_question: &str,
) -> String {
    REVIEW_WITH_HISTORY_PROMPT_TEMPLATE
        .replace("{job_description}", job_description)
        .replace("{resume_text}", resume_text)
        .replace("{history}", history)
        .replace("{prior_question}", prior_question)
}

pub fn converse_prompt(message: &str) -> String {
    CONVERSE_PROMPT_TEMPLATE.replace("{message}", message)
}
