//! Review prompt templates.
//!
//! Each prompt is sent as system text; the code context goes in the user
//! message. Both prompts ask for a single JSON object so the parser's first
//! strategy usually matches.

use super::findings::ReviewKind;

const SECURITY_FOCUS: &[&str] = &[
    "Injection (SQL, command, template) and unsafe string interpolation",
    "Authentication or authorization bypass",
    "Secrets, tokens or credentials committed to code or logs",
    "Missing input validation at trust boundaries",
    "Path traversal and unsafe file handling",
    "Insecure deserialization",
    "Weak or misused cryptography",
    "Dependency or supply-chain risks visible in manifests",
];

const QUALITY_FOCUS: &[&str] = &[
    "Correctness bugs and unhandled error paths",
    "Readability and naming",
    "Duplication and dead code",
    "Test coverage of changed behaviour",
    "Unnecessary complexity or over-engineering",
    "Resource handling (leaks, unbounded growth, blocking calls in async code)",
];

/// Build the system prompt for a review kind.
pub fn build_prompt(kind: ReviewKind) -> String {
    match kind {
        ReviewKind::Security => security_prompt(),
        ReviewKind::Quality => quality_prompt(),
    }
}

pub fn security_prompt() -> String {
    let mut prompt = String::from(
        "You are a security reviewer gating a release. Review the code you are given \
         and report concrete, exploitable problems only.\n\n## Focus Areas\n\n",
    );
    push_focus(&mut prompt, SECURITY_FOCUS);
    prompt.push_str(
        "\n## Output\n\n\
         Respond with a single JSON object and nothing else:\n\n\
         ```json\n\
         {\n  \
           \"riskLevel\": \"LOW\" | \"MEDIUM\" | \"HIGH\" | \"CRITICAL\",\n  \
           \"summary\": \"one or two sentences\",\n  \
           \"findings\": [\n    {\n      \
             \"severity\": \"CRITICAL\" | \"HIGH\" | \"MEDIUM\" | \"LOW\",\n      \
             \"file\": \"path/relative/to/repo\",\n      \
             \"symbol\": \"function or type name\",\n      \
             \"description\": \"what is wrong\",\n      \
             \"recommendation\": \"how to fix it\"\n    \
           }\n  \
         ]\n\
         }\n\
         ```\n\n\
         Use riskLevel LOW with an empty findings array when nothing is wrong.\n",
    );
    prompt
}

pub fn quality_prompt() -> String {
    let mut prompt = String::from(
        "You are a senior engineer reviewing code quality before a release. \
         Judge the code you are given on its merits.\n\n## Focus Areas\n\n",
    );
    push_focus(&mut prompt, QUALITY_FOCUS);
    prompt.push_str(
        "\n## Output\n\n\
         Respond with a single JSON object and nothing else:\n\n\
         ```json\n\
         {\n  \
           \"quality\": \"EXCELLENT\" | \"GOOD\" | \"ACCEPTABLE\" | \"NEEDS_WORK\",\n  \
           \"summary\": \"one or two sentences\",\n  \
           \"findings\": [\n    {\n      \
             \"priority\": \"HIGH\" | \"MEDIUM\" | \"LOW\",\n      \
             \"file\": \"path/relative/to/repo\",\n      \
             \"symbol\": \"function or type name\",\n      \
             \"description\": \"what should change\",\n      \
             \"recommendation\": \"suggested change\"\n    \
           }\n  \
         ]\n\
         }\n\
         ```\n\n\
         Reserve NEEDS_WORK for code that should not ship as is.\n",
    );
    prompt
}

fn push_focus(prompt: &mut String, areas: &[&str]) {
    for area in areas {
        prompt.push_str("- ");
        prompt.push_str(area);
        prompt.push('\n');
    }
}
