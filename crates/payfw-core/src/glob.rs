//! Shell-style glob matching (`*` = zero or more, `?` = exactly one) used by the
//! policy engine's recipient/category allow- and block-lists.

use regex::Regex;

/// A glob pattern precompiled into a regex matcher, with the source string kept
/// alongside it for diagnostics.
#[derive(Debug, Clone)]
pub struct CompiledGlob {
    source: String,
    matcher: GlobMatcher,
}

#[derive(Debug, Clone)]
enum GlobMatcher {
    /// `*` alone matches everything; skip compiling a regex for the common case.
    Universal,
    Exact(String),
    Regex(Regex),
    /// The pattern failed to compile; fall back to exact-string equality.
    Fallback,
}

impl CompiledGlob {
    pub fn compile(pattern: &str) -> Self {
        let matcher = if pattern == "*" {
            GlobMatcher::Universal
        } else if !pattern.contains('*') && !pattern.contains('?') {
            GlobMatcher::Exact(pattern.to_string())
        } else {
            match Regex::new(&format!("^{}$", glob_to_regex(pattern))) {
                Ok(re) => GlobMatcher::Regex(re),
                Err(_) => GlobMatcher::Fallback,
            }
        };

        Self {
            source: pattern.to_string(),
            matcher,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        match &self.matcher {
            GlobMatcher::Universal => true,
            GlobMatcher::Exact(exact) => exact == candidate,
            GlobMatcher::Regex(re) => re.is_match(candidate),
            GlobMatcher::Fallback => self.source == candidate,
        }
    }
}

/// Escape regex metacharacters, then translate `*`/`?` into their regex equivalents.
fn glob_to_regex(pattern: &str) -> String {
    const METACHARS: &str = ".+^${}()|[]\\";
    let mut out = String::with_capacity(pattern.len() * 2);
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c if METACHARS.contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Returns true if `candidate` matches any of `patterns`.
pub fn any_match(patterns: &[CompiledGlob], candidate: &str) -> Option<usize> {
    patterns.iter().position(|p| p.is_match(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universal_matches_anything() {
        let glob = CompiledGlob::compile("*");
        assert!(glob.is_match("anything"));
        assert!(glob.is_match(""));
    }

    #[test]
    fn question_mark_matches_exactly_one_char() {
        let glob = CompiledGlob::compile("a?");
        assert!(glob.is_match("ab"));
        assert!(!glob.is_match("abc"));
        assert!(!glob.is_match("a"));
    }

    #[test]
    fn star_matches_prefix_suffix() {
        let glob = CompiledGlob::compile("agent://*.verified");
        assert!(glob.is_match("agent://api-provider.verified"));
        assert!(!glob.is_match("agent://api-provider.unverified"));
    }

    #[test]
    fn exact_fast_path() {
        let glob = CompiledGlob::compile("0xabc");
        assert!(glob.is_match("0xabc"));
        assert!(!glob.is_match("0xabcd"));
    }

    #[test]
    fn metacharacters_are_escaped() {
        let glob = CompiledGlob::compile("merchant.shop");
        assert!(glob.is_match("merchant.shop"));
        assert!(!glob.is_match("merchantXshop"));
    }
}
