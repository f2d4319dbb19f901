//! Identifier derivation for generated items.

use convert_case::{Case, Casing};
use indexmap::IndexMap;

use crate::errors::EmitError;

const KEYWORDS: [&str; 50] = [
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "static", "struct", "super", "trait", "true", "try", "type", "typeof",
    "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Turns free-form document text into a Rust identifier in `case`.
///
/// Characters outside `[A-Za-z0-9]` become word breaks; a leading digit or
/// an empty result gets a `_` prefix and a keyword gets a `_` suffix.
#[must_use]
pub fn identifier(raw: &str, case: Case) -> String {
    let words: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let mut ident = words.from_case(Case::Snake).to_case(case);
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if KEYWORDS.contains(&ident.as_str()) {
        ident.push('_');
    }
    ident
}

/// `snake_case` identifier.
#[must_use]
pub fn snake(raw: &str) -> String {
    identifier(raw, Case::Snake)
}

/// `UPPER_SNAKE` identifier.
#[must_use]
pub fn upper(raw: &str) -> String {
    identifier(raw, Case::UpperSnake)
}

/// Identifiers already claimed in one generated module.
#[derive(Debug, Default)]
pub struct Namespace {
    claimed: IndexMap<String, String>,
}

impl Namespace {
    /// Claims `ident` for `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Invariant`] if another item already holds it.
    pub fn claim(&mut self, ident: String, owner: impl Into<String>) -> Result<String, EmitError> {
        let owner = owner.into();
        if let Some(other) = self.claimed.get(&ident) {
            return Err(EmitError::Invariant(format!(
                "{owner} and {other} both generate `{ident}`"
            )));
        }
        self.claimed.insert(ident.clone(), owner);
        Ok(ident)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{snake, upper, Namespace};
    use crate::errors::EmitError;

    #[rstest]
    #[case("tmp117", "tmp117", "TMP117")]
    #[case("VDD_CORE", "vdd_core", "VDD_CORE")]
    #[case("inlet-temp", "inlet_temp", "INLET_TEMP")]
    #[case("3v3", "_3v3", "_3V3")]
    fn identifiers_follow_case_conventions(
        #[case] raw: &str,
        #[case] snake_case: &str,
        #[case] upper_case: &str,
    ) {
        assert_eq!(snake(raw), snake_case);
        assert_eq!(upper(raw), upper_case);
    }

    #[test]
    fn keywords_are_escaped() {
        assert_eq!(snake("type"), "type_");
        assert_eq!(snake("box"), "box_");
        assert_eq!(snake("Try"), "try_");
    }

    #[test]
    fn collisions_after_conversion_are_invariant_failures() {
        let mut names = Namespace::default();
        let first = names.claim(snake("a-b"), "name a-b").expect("first claim");
        assert_eq!(first, "a_b");
        let err = names
            .claim(snake("a_b"), "name a_b")
            .expect_err("second claim collides");
        assert!(matches!(err, EmitError::Invariant(message) if message.contains("`a_b`")));
    }
}
