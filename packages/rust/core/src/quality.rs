//! Mechanical quality checks for generated text.

use std::fmt;

/// Tokens a generated value must not contain (case-sensitive).
pub const SELF_REFERENCE_TOKENS: &[&str] = &["SEO", "Description"];

/// A single failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// The value is empty (missing or never generated).
    Empty,
    /// The first character is a lowercase letter.
    NotCapitalized,
    /// The value mentions one of [`SELF_REFERENCE_TOKENS`].
    SelfReference(&'static str),
    /// The value contains `\n` or `\r`.
    MultipleLines,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Text is empty."),
            Self::NotCapitalized => write!(f, "First letter is not capitalized."),
            Self::SelfReference(token) => {
                write!(f, "Contains odd punctuation/self-reference: {token}")
            }
            Self::MultipleLines => write!(f, "Contains multiple lines of text."),
        }
    }
}

/// Run every rule against `text`. An empty result means the text passes.
pub fn check(text: &str) -> Vec<Violation> {
    let Some(first) = text.chars().next() else {
        return vec![Violation::Empty];
    };

    let mut violations = Vec::new();

    if first.is_lowercase() {
        violations.push(Violation::NotCapitalized);
    }

    for &token in SELF_REFERENCE_TOKENS {
        if text.contains(token) {
            violations.push(Violation::SelfReference(token));
        }
    }

    if text.contains(['\n', '\r']) {
        violations.push(Violation::MultipleLines);
    }

    violations
}

/// Render violations the way they are logged and reported.
pub fn describe(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_passes() {
        assert!(check("Richmond's best new murals, mapped.").is_empty());
        assert!(check("A").is_empty());
    }

    #[test]
    fn lowercase_start_is_flagged() {
        assert_eq!(check("seo-friendly text."), vec![Violation::NotCapitalized]);
        assert_eq!(
            Violation::NotCapitalized.to_string(),
            "First letter is not capitalized."
        );
    }

    #[test]
    fn non_letter_start_is_not_flagged() {
        assert!(check("2024 in review").is_empty());
        assert!(check("\"Quoted\" start").is_empty());
    }

    #[test]
    fn empty_text_has_dedicated_violation() {
        assert_eq!(check(""), vec![Violation::Empty]);
    }

    #[test]
    fn self_reference_tokens_reported_individually() {
        let violations = check("SEO Description: great show");
        assert_eq!(
            violations,
            vec![
                Violation::SelfReference("SEO"),
                Violation::SelfReference("Description"),
            ]
        );
        assert_eq!(
            violations[0].to_string(),
            "Contains odd punctuation/self-reference: SEO"
        );
    }

    #[test]
    fn self_reference_is_case_sensitive() {
        assert!(check("A description of the seo scene").is_empty());
    }

    #[test]
    fn newline_or_carriage_return_flagged() {
        assert!(check("Line one\nline two").contains(&Violation::MultipleLines));
        assert!(check("Line one\rline two").contains(&Violation::MultipleLines));
        assert!(check("\nLeading newline").contains(&Violation::MultipleLines));
    }

    #[test]
    fn all_violations_are_reported_together() {
        let violations = check("meta Description\nfor SEO");
        assert_eq!(violations.len(), 4);
        assert_eq!(violations[0], Violation::NotCapitalized);
        assert_eq!(violations[3], Violation::MultipleLines);
    }

    #[test]
    fn lowercase_property_over_samples() {
        for sample in ["a", "zebra crossing", "éclair night", "x\ny"] {
            assert!(check(sample).contains(&Violation::NotCapitalized), "{sample}");
        }
    }

    #[test]
    fn describe_joins_messages() {
        let text = describe(&[Violation::NotCapitalized, Violation::MultipleLines]);
        assert_eq!(
            text,
            "First letter is not capitalized. Contains multiple lines of text."
        );
    }
}
