use regex::Regex;
use std::sync::OnceLock;

const MIN_CRITERION_LEN: usize = 5;

fn blank_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t]*\n").expect("valid blank line regex"))
}

/// Split a criteria block into individual criteria.
///
/// Criteria are separated by blank lines. Section headers and fragments
/// shorter than five characters are dropped; the returned position is the
/// criterion number the judge is asked to cite.
pub fn parse_criteria(block: &str) -> Vec<String> {
    blank_line_regex()
        .split(block)
        .map(str::trim)
        .filter(|criterion| {
            let lower = criterion.to_lowercase();
            !lower.contains("inclusion criteria") && !lower.contains("exclusion criteria")
        })
        .filter(|criterion| criterion.chars().count() >= MIN_CRITERION_LEN)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_criteria_blocks() {
        let block = "Inclusion Criteria:\n\nAt least 3 years of backend experience.\n\n  Familiar with PostgreSQL.  \n\nok\n\n";
        let criteria = parse_criteria(block);
        assert_eq!(
            criteria,
            vec![
                "At least 3 years of backend experience.",
                "Familiar with PostgreSQL."
            ]
        );
    }

    #[test]
    fn test_whitespace_only_separator() {
        let criteria = parse_criteria("Speaks German fluently\n  \nHolds a driving licence");
        assert_eq!(criteria.len(), 2);
    }

    #[test]
    fn test_empty_block() {
        assert!(parse_criteria("").is_empty());
    }
}
