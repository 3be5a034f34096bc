use regex::Regex;
use std::sync::OnceLock;

/// Appended to every resume so the judge can cite it for procedural criteria
pub const CONSENT_SENTENCE: &str = "The candidate will provide informed consent, and will comply with the company policies and job requirements without any practical issues.";

fn terminator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A run of terminators plus any closing quotes or brackets
    RE.get_or_init(|| Regex::new(r#"[.!?]+["')\]]*"#).expect("valid terminator regex"))
}

/// Whether a terminator followed by `rest` closes a sentence.
///
/// Glued text (`3.5`, `Node.js`) and a lowercase continuation (`e.g. for`)
/// do not.
fn ends_sentence(rest: &str) -> bool {
    match rest.chars().next() {
        None => true,
        Some(c) if !c.is_whitespace() => false,
        Some(_) => rest
            .trim_start()
            .chars()
            .next()
            .map_or(true, |next| !next.is_lowercase()),
    }
}

fn split_line(line: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for terminator in terminator_regex().find_iter(line) {
        if ends_sentence(&line[terminator.end()..]) {
            sentences.push(&line[start..terminator.end()]);
            start = terminator.end();
        }
    }
    sentences.push(&line[start..]);

    sentences
}

/// Split free text into trimmed, non-empty sentences
pub fn split_sentences(text: &str) -> Vec<String> {
    text.lines()
        .flat_map(split_line)
        .map(|s| s.trim().to_string())
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect()
}
