//! Note identifier generation and the display-path scheme.
//!
//! Ids have the fixed lexical form `cm.` plus a six-character suffix from
//! a lowercase alphanumeric alphabet. Display paths are derived locators
//! of the form `{file}/{id}` or `{file}/{parentId}/{id}`, always using
//! the immediate parent only.

use std::collections::HashSet;
use std::sync::LazyLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;

/// Lexical prefix shared by every note id.
pub const ID_PREFIX: &str = "cm.";

/// Default id suffix alphabet.
pub const DEFAULT_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz0123456789";

/// Default id suffix length.
pub const DEFAULT_LENGTH: usize = 6;

static ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^cm\.[a-z0-9]{6}$").unwrap());

/// Check whether `s` is syntactically a well-formed id at the default
/// alphabet and length.
pub fn is_valid_id(s: &str) -> bool {
    ID_RE.is_match(s)
}

/// Extract an id from a free-form reference token.
///
/// Accepts both the conventional written form `[cm.abc123]` and the bare
/// id, with surrounding whitespace tolerated.
pub fn extract_id_from_ref(token: &str) -> Option<String> {
    let t = token.trim();
    let t = t.strip_prefix('[').and_then(|s| s.strip_suffix(']')).unwrap_or(t);
    is_valid_id(t).then(|| t.to_string())
}

/// Build a display path from file, id and optional immediate parent.
pub fn display_path(file: &str, id: &str, parent: Option<&str>) -> String {
    match parent {
        Some(p) => format!("{file}/{p}/{id}"),
        None => format!("{file}/{id}"),
    }
}

/// Components of a parsed display path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayPath {
    pub file: String,
    pub id: String,
    pub parent: Option<String>,
}

/// Parse a display path back into its components.
///
/// Returns `None` when the string does not match the grammar (the last
/// segment must be a well-formed id; file names may contain slashes).
pub fn parse_display_path(path: &str) -> Option<DisplayPath> {
    let (rest, id) = path.rsplit_once('/')?;
    if !is_valid_id(id) {
        return None;
    }
    if let Some((file, parent)) = rest.rsplit_once('/')
        && is_valid_id(parent)
    {
        if file.is_empty() {
            return None;
        }
        return Some(DisplayPath {
            file: file.to_string(),
            id: id.to_string(),
            parent: Some(parent.to_string()),
        });
    }
    if rest.is_empty() {
        return None;
    }
    Some(DisplayPath { file: rest.to_string(), id: id.to_string(), parent: None })
}

/// Generator for fresh, collision-free note ids.
///
/// The random source is injectable so tests can be deterministic.
#[derive(Debug)]
pub struct IdGenerator {
    alphabet: Vec<char>,
    length: usize,
    rng: StdRng,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHABET, DEFAULT_LENGTH)
    }
}

impl IdGenerator {
    pub fn new(alphabet: &str, length: usize) -> Self {
        Self {
            alphabet: alphabet.chars().collect(),
            length,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            alphabet: DEFAULT_ALPHABET.chars().collect(),
            length: DEFAULT_LENGTH,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate a fresh id from the configured alphabet and length.
    pub fn generate(&mut self) -> String {
        let mut id = String::with_capacity(ID_PREFIX.len() + self.length);
        id.push_str(ID_PREFIX);
        for _ in 0..self.length {
            let i = self.rng.gen_range(0..self.alphabet.len());
            id.push(self.alphabet[i]);
        }
        id
    }

    /// Generate an id guaranteed absent from `existing`.
    ///
    /// Collisions are astronomically unlikely at the default length, but
    /// the retry loop is required for correctness, not an optimization.
    pub fn generate_unique(&mut self, existing: &HashSet<String>) -> String {
        loop {
            let id = self.generate();
            if !existing.contains(&id) {
                return id;
            }
        }
    }
}
