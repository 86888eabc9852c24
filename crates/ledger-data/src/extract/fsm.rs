//! Table-driven anchor scanning shared by the provider extractors.
//!
//! An extractor declares its template as a list of [`Transition`]s. The
//! [`AnchorMachine`] walks a token sequence once, firing the first
//! transition whose source state and predicate match the current token.

use std::collections::BTreeMap;

use ledger_core::models::Field;
use tracing::debug;

/// Test applied to a single token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPredicate {
    /// The whole token equals the text.
    Equals(&'static str),
    /// The whole token equals the text, optionally followed by a colon.
    Marker(&'static str),
    StartsWith(&'static str),
    StartsWithAny(&'static [&'static str]),
    /// Matches every token.
    Any,
}

impl TokenPredicate {
    pub fn matches(&self, token: &str) -> bool {
        match *self {
            TokenPredicate::Equals(text) => token == text,
            TokenPredicate::Marker(text) => {
                let stripped = token.strip_suffix(':').unwrap_or(token).trim_end();
                stripped == text
            }
            TokenPredicate::StartsWith(prefix) => token.starts_with(prefix),
            TokenPredicate::StartsWithAny(prefixes) => {
                prefixes.iter().any(|prefix| token.starts_with(prefix))
            }
            TokenPredicate::Any => true,
        }
    }
}

/// `(from, when) → (to, capture)`.
#[derive(Debug, Clone, Copy)]
pub struct Transition<S> {
    pub from: S,
    pub when: TokenPredicate,
    pub to: S,
    /// Field that receives the token that fired this transition.
    pub capture: Option<Field>,
}

impl<S> Transition<S> {
    pub const fn new(from: S, when: TokenPredicate, to: S) -> Self {
        Self {
            from,
            when,
            to,
            capture: None,
        }
    }

    pub const fn capturing(from: S, when: TokenPredicate, to: S, field: Field) -> Self {
        Self {
            from,
            when,
            to,
            capture: Some(field),
        }
    }
}

/// Where a machine stopped and what it captured on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult<S> {
    pub state: S,
    pub captures: BTreeMap<Field, String>,
    /// Tokens examined before the machine stopped.
    pub consumed: usize,
}

impl<S> ScanResult<S> {
    pub fn get(&self, field: Field) -> Option<&str> {
        self.captures.get(&field).map(String::as_str)
    }
}

/// Interpreter for a transition table.
#[derive(Debug, Clone, Copy)]
pub struct AnchorMachine<'t, S> {
    table: &'t [Transition<S>],
    start: S,
    terminal: S,
}

impl<'t, S> AnchorMachine<'t, S>
where
    S: Copy + PartialEq + std::fmt::Debug,
{
    pub fn new(table: &'t [Transition<S>], start: S, terminal: S) -> Self {
        Self {
            table,
            start,
            terminal,
        }
    }

    /// Run over `tokens` until they are exhausted or the terminal state is
    /// reached. The first capture of a field wins.
    pub fn scan<'a, I>(&self, tokens: I) -> ScanResult<S>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut state = self.start;
        let mut captures: BTreeMap<Field, String> = BTreeMap::new();
        let mut consumed = 0;

        for token in tokens {
            if state == self.terminal {
                break;
            }
            consumed += 1;

            let Some(transition) = self
                .table
                .iter()
                .find(|t| t.from == state && t.when.matches(token))
            else {
                continue;
            };

            if let Some(field) = transition.capture {
                if captures.contains_key(&field) {
                    debug!(?field, token = %token, "ignoring repeated capture");
                } else {
                    captures.insert(field, token.clone());
                }
            }
            state = transition.to;
        }

        ScanResult {
            state,
            captures,
            consumed,
        }
    }
}
