//! Pattern strategies that locate test registrations.
//!
//! Each strategy is a stateless value. Regexes are compiled once and shared
//! read-only, so strategies can run on any number of files concurrently.

use std::{fmt, sync::LazyLock};

use regex::{Captures, Regex};
use serde::Serialize;

use super::body::{self, Stop};

/// Which strategy found a test.
///
/// Declaration order is priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// `test('name', ...)`
    Standard,
    /// `test.only('name', ...)`, `it.skip('name', ...)`
    Modifier,
    /// `test.each(table)('name', ...)`
    Parametrized,
    /// ``test(`name ${x}`, ...)``
    Template,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Standard => "standard",
            Self::Modifier => "modifier",
            Self::Parametrized => "parametrized",
            Self::Template => "template",
        })
    }
}

/// A test name found in the source, before its body is scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// The name exactly as written between its delimiters.
    pub identifier: String,
    /// Offset of the callee (`test` / `it`).
    pub call_start: usize,
    /// Offset just after the comma following the name.
    pub body_start: usize,
}

/// A way of recognising test registrations in source text.
pub trait Strategy: Sync {
    /// Which strategy this is.
    fn kind(&self) -> StrategyKind;

    /// Every registration this strategy recognises, in file order.
    fn candidates(&self, content: &str) -> Vec<Candidate>;
}

/// The strategies, in priority order.
pub const STRATEGIES: &[&dyn Strategy] = &[&Standard, &Modifier, &Parametrized, &Template];

// A callee must not continue an identifier or member expression:
// `mytest(` and `foo.it(` are not registrations.
const CALLEE: &str = r"(?:^|[^\w.$])(?P<callee>test|it)";
const QUOTED: &str = r#"(?:'(?P<single>(?:[^'\\\n]|\\.)*)'|"(?P<double>(?:[^"\\\n]|\\.)*)")"#;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {pattern}: {e}"))
}

static STANDARD: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"{CALLEE}\s*\(\s*{QUOTED}\s*,")));

static MODIFIER: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"{CALLEE}\.(?:only|skip)\s*\(\s*{QUOTED}\s*,")));

static EACH: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"{CALLEE}\.each\s*(?P<open>[(`])")));

static EACH_CALL: LazyLock<Regex> = LazyLock::new(|| compile(&format!(r"^\s*\(\s*{QUOTED}\s*,")));

static TEMPLATE: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"{CALLEE}(?:\.(?:only|skip))?\s*\(\s*`")));

fn quoted_name(caps: &Captures<'_>) -> Option<String> {
    caps.name("single")
        .or_else(|| caps.name("double"))
        .map(|m| m.as_str().to_string())
}

fn callee_start(caps: &Captures<'_>) -> usize {
    caps.name("callee").map_or(0, |m| m.start())
}

fn quoted_candidates(regex: &Regex, content: &str) -> Vec<Candidate> {
    regex
        .captures_iter(content)
        .filter_map(|caps| {
            Some(Candidate {
                identifier: quoted_name(&caps)?,
                call_start: callee_start(&caps),
                body_start: caps.get(0)?.end(),
            })
        })
        .collect()
}

/// Plain `test('name', ...)` / `it("name", ...)`.
#[derive(Debug, Clone, Copy)]
pub struct Standard;

impl Strategy for Standard {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Standard
    }

    fn candidates(&self, content: &str) -> Vec<Candidate> {
        quoted_candidates(&STANDARD, content)
    }
}

/// `.only` / `.skip` variants.
#[derive(Debug, Clone, Copy)]
pub struct Modifier;

impl Strategy for Modifier {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Modifier
    }

    fn candidates(&self, content: &str) -> Vec<Candidate> {
        quoted_candidates(&MODIFIER, content)
    }
}

/// `test.each(table)('name', ...)`.
///
/// The table is skipped by balancing delimiters; its contents are never
/// interpreted.
#[derive(Debug, Clone, Copy)]
pub struct Parametrized;

impl Strategy for Parametrized {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Parametrized
    }

    fn candidates(&self, content: &str) -> Vec<Candidate> {
        let bytes = content.as_bytes();

        EACH.captures_iter(content)
            .filter_map(|caps| {
                let open = caps.name("open")?;
                let table_end = if open.as_str() == "`" {
                    body::skip_template(bytes, open.start())
                } else {
                    match body::balance(bytes, open.end()) {
                        Stop::Closer(end, b')') => end + 1,
                        _ => return None,
                    }
                };

                let rest = content.get(table_end..)?;
                let call = EACH_CALL.captures(rest)?;
                Some(Candidate {
                    identifier: quoted_name(&call)?,
                    call_start: callee_start(&caps),
                    body_start: table_end + call.get(0)?.end(),
                })
            })
            .collect()
    }
}

/// Names written as template literals. The identifier is the raw source
/// between the backticks; `${...}` expressions are kept as written.
#[derive(Debug, Clone, Copy)]
pub struct Template;

impl Strategy for Template {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Template
    }

    fn candidates(&self, content: &str) -> Vec<Candidate> {
        let bytes = content.as_bytes();

        TEMPLATE
            .captures_iter(content)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let open = whole.end() - 1;
                let close = body::skip_template(bytes, open);
                // `close` is one past the closing backtick.
                let identifier = content.get(open + 1..close.checked_sub(1)?)?;

                let after = content.get(close..)?;
                let comma = after.find(|c: char| !c.is_whitespace())?;
                if !after[comma..].starts_with(',') {
                    return None;
                }

                Some(Candidate {
                    identifier: identifier.to_string(),
                    call_start: callee_start(&caps),
                    body_start: close + comma + 1,
                })
            })
            .collect()
    }
}
