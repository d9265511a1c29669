//! Test extraction from raw source text.
//!
//! [`extract`] runs every [`Strategy`] over a file, scans each match forward
//! to find the test body, and fingerprints it. Bodies are only ever used as
//! hashing input.

use std::{collections::HashSet, path::Path};

use crate::domain::Fingerprint;

mod body;
pub mod strategy;

pub use strategy::{STRATEGIES, Strategy, StrategyKind};

/// A test definition found in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTest {
    /// Project-relative path of the file, with `/` separators.
    pub file: String,
    /// The test's name as written in the source.
    pub identifier: String,
    /// The text after the name up to the end of the registration call,
    /// trimmed.
    pub body: String,
    /// Fingerprint of `body`.
    pub hash: Fingerprint,
    /// 1-based line of the registration call.
    pub line: usize,
    /// The strategy that found the test.
    pub strategy: StrategyKind,
    /// Whether the end of the call could not be found cleanly.
    ///
    /// The body is then a best-effort guess (possibly the rest of the file),
    /// so its fingerprint may change for reasons unrelated to the test.
    pub degraded: bool,
}

/// Render a relative path as a `/`-separated key.
#[must_use]
pub fn path_key(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Extract every test defined in `content`.
///
/// Strategies run in priority order; the first to produce an identifier wins
/// and any later match with the same identifier is discarded. Malformed
/// source never fails the whole file: an affected test is returned with
/// [`ExtractedTest::degraded`] set.
#[must_use]
pub fn extract(content: &str, file_path: &Path, relative_path: &Path) -> Vec<ExtractedTest> {
    let file = path_key(relative_path);
    let mut seen = HashSet::new();
    let mut tests = Vec::new();

    for strategy in STRATEGIES {
        for candidate in strategy.candidates(content) {
            if !seen.insert(candidate.identifier.clone()) {
                tracing::trace!(
                    "Ignoring duplicate test '{}' in {} ({})",
                    candidate.identifier,
                    file_path.display(),
                    strategy.kind()
                );
                continue;
            }

            let span = body::call_body(content, candidate.body_start);
            if span.degraded {
                tracing::warn!(
                    "Could not find the end of test '{}' in {}; its fingerprint may be unreliable",
                    candidate.identifier,
                    file_path.display()
                );
            }

            let body = content[candidate.body_start..span.end].trim().to_string();
            tests.push(ExtractedTest {
                file: file.clone(),
                hash: Fingerprint::of(&body),
                line: line_of(content, candidate.call_start),
                identifier: candidate.identifier,
                body,
                strategy: strategy.kind(),
                degraded: span.degraded,
            });
        }
    }

    tracing::debug!("Extracted {} tests from {}", tests.len(), file_path.display());
    tests
}

fn line_of(content: &str, offset: usize) -> usize {
    content[..offset].bytes().filter(|&b| b == b'\n').count() + 1
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn run(content: &str) -> Vec<ExtractedTest> {
        extract(
            content,
            Path::new("/project/src/math.test.ts"),
            &PathBuf::from("src").join("math.test.ts"),
        )
    }

    #[test]
    fn extracts_identifier_and_body() {
        let tests = run("test('adds two numbers', () => { expect(1+1).toBe(2); })");
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].identifier, "adds two numbers");
        assert_eq!(tests[0].body, "() => { expect(1+1).toBe(2); }");
        assert_eq!(tests[0].file, "src/math.test.ts");
        assert_eq!(tests[0].line, 1);
        assert!(!tests[0].degraded);
    }

    #[test]
    fn editing_the_body_changes_the_hash() {
        let before = run("test('adds two numbers', () => { expect(1+1).toBe(2); })");
        let after = run("test('adds two numbers', () => { expect(1+1).toBe(3); })");
        assert_ne!(before[0].hash, after[0].hash);
    }

    #[test]
    fn whitespace_around_the_body_does_not_change_the_hash() {
        let tight = run("test('x', () => {})");
        let loose = run("test('x',\n    () => {}\n)");
        assert_eq!(tight[0].hash, loose[0].hash);
    }

    #[test]
    fn modifier_and_plain_definitions_count_once() {
        let tests = run("it.only('x', () => { a(); });\nit('x', () => { b(); });");
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].strategy, StrategyKind::Standard);
        assert_eq!(tests[0].body, "() => { b(); }");
        assert_eq!(tests[0].line, 2);
    }

    #[test]
    fn duplicate_definitions_keep_the_first() {
        let tests = run("test('x', () => { first(); });\ntest('x', () => { second(); });");
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].body, "() => { first(); }");
    }

    #[test]
    fn all_strategies_contribute() {
        let content = r"
describe('suite', () => {
  test('plain', () => {});
  it.skip('skipped', () => {});
  test.each([[1], [2]])('param %i', (n) => {});
  test(`template ${name}`, () => {});
});
";
        let tests = run(content);
        let found: Vec<_> = tests
            .iter()
            .map(|t| (t.identifier.as_str(), t.strategy, t.line))
            .collect();
        assert_eq!(
            found,
            [
                ("plain", StrategyKind::Standard, 3),
                ("skipped", StrategyKind::Modifier, 4),
                ("param %i", StrategyKind::Parametrized, 5),
                ("template ${name}", StrategyKind::Template, 6),
            ]
        );
    }

    #[test]
    fn unterminated_test_is_degraded_not_fatal() {
        let content = "test('ok', () => {});\ntest('broken', () => {\n  expect(1).toBe(1);\n";
        let tests = run(content);
        assert_eq!(tests.len(), 2);
        assert!(!tests[0].degraded);
        assert!(tests[1].degraded);
        assert_eq!(tests[1].body, "() => {\n  expect(1).toBe(1);");
    }

    #[test]
    fn file_without_tests_yields_nothing() {
        assert!(run("export const add = (a, b) => a + b;").is_empty());
    }

    #[test]
    fn extraction_is_deterministic() {
        let content = "test('a', () => { x(); });\nit('b', () => { y(); });";
        let first: Vec<_> = run(content)
            .into_iter()
            .map(|t| (t.identifier, t.hash))
            .collect();
        let second: Vec<_> = run(content)
            .into_iter()
            .map(|t| (t.identifier, t.hash))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn multibyte_text_is_handled() {
        let tests = run("test('größe ✓', () => { expect('ü').toBe('ü'); })");
        assert_eq!(tests[0].identifier, "größe ✓");
        assert_eq!(tests[0].body, "() => { expect('ü').toBe('ü'); }");
    }
}
