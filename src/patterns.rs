//! Named regex fragments and the compiled-pattern cache.
//!
//! Grammar rules are written as templates where `[:name:]` stands for one of
//! the fragments below. Templates are expanded recursively and compiled once;
//! later calls with the same expanded source and flags share the compiled
//! regex.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::Error;

const FRAGMENTS: &[(&str, &str)] = &[
    // ASCII punctuation
    ("punct", r"[!-/:-@\[-`{-~]"),
    ("html_id", r"[a-zA-Z][a-zA-Z\d:]*"),
    ("html_attr", r#"(?:"[^"]+"|'[^']+'|[^>\s]+)"#),
    ("html_attrs", r"(?:\s[^=\s/]+(?:\s*=\s*[:html_attr:])?)+"),
    // attribute shorthand as it may appear before a block or list marker dot
    (
        "txattr",
        r"(?:\{[^}\n]*\}|\([^()\n]*\)|\[[^\[\]\n]*\]|<>|[<>=]|\(+|\)+)*",
    ),
    // the same plus the table cell extras (valign, colspan, rowspan)
    (
        "txcellattr",
        r"(?:\{[^}\n]*\}|\([^()\n]*\)|\[[^\[\]\n]*\]|<>|[<>=~^-]|\\\d+|/\d+|\(+|\)+)*",
    ),
    ("txblocks", r"(?:b[qc]|div|notextile|pre|h[1-6]|fn\d+|p|###)"),
    ("txlisthd", r"[\t ]*(?:\*|#(?:_|\d+)?)[:txattr:](?: +\S|\.\s*[\S\n])"),
    ("txlisthd2", r"[\t ]*[#*]*(?:\*|#(?:_|\d+)?)[:txattr:](?: +\S|\.\s*[\S\n])"),
];

static FRAGMENT_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[:\s*(\w+)\s*:\]").expect("fragment reference pattern"));

static CACHE: Lazy<RwLock<HashMap<String, Regex>>> = Lazy::new(|| RwLock::new(HashMap::new()));

fn fragment(name: &str) -> Option<&'static str> {
    FRAGMENTS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| *value)
}

/// Replace every `[:name:]` reference in `src` with its (expanded) fragment.
pub fn try_expand(src: &str) -> Result<String, Error> {
    let mut out = String::with_capacity(src.len());
    let mut last = 0;
    for caps in FRAGMENT_REF.captures_iter(src) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let name = caps.get(1).map_or("", |m| m.as_str());
        let Some(body) = fragment(name) else {
            return Err(Error::UnknownPattern {
                name: name.to_string(),
                pattern: src.to_string(),
            });
        };
        out.push_str(&src[last..whole.start]);
        out.push_str(&try_expand(body)?);
        last = whole.end;
    }
    out.push_str(&src[last..]);
    Ok(out)
}

/// Expand and compile a grammar template.
///
/// # Panics
///
/// Panics when the template references an unknown fragment or does not
/// compile. Templates are fixed strings inside this crate, so either case is
/// a broken build rather than bad input.
pub fn compile(src: &str) -> Regex {
    compile_with_flags(src, "")
}

/// Like [`compile`], with inline flags such as `"s"` or `"i"`.
pub fn compile_with_flags(src: &str, flags: &str) -> Regex {
    let expanded = try_expand(src).unwrap_or_else(|err| panic!("{err}"));
    let key = format!("{flags}/{expanded}");

    if let Some(re) = CACHE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return re.clone();
    }

    let full = if flags.is_empty() {
        expanded
    } else {
        format!("(?{flags}){expanded}")
    };
    let re = Regex::new(&full).unwrap_or_else(|err| panic!("invalid pattern {full}: {err}"));
    log::trace!("compiled pattern {full}");

    CACHE
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(key)
        .or_insert(re)
        .clone()
}

/// Escape `text` for literal use inside a template.
pub fn escape(text: &str) -> String {
    regex::escape(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_nested_fragments() {
        let expanded = try_expand("^<([:html_id:])").unwrap();
        assert_eq!(expanded, r"^<([a-zA-Z][a-zA-Z\d:]*)");
        let attrs = try_expand("[:html_attrs:]").unwrap();
        assert!(!attrs.contains("[:"));
    }

    #[test]
    fn unknown_fragment_is_an_error() {
        let err = try_expand("^[:nope:]").unwrap_err();
        assert!(matches!(err, Error::UnknownPattern { ref name, .. } if name == "nope"));
    }

    #[test]
    #[should_panic(expected = "not found")]
    fn compile_fails_fast_on_unknown_fragment() {
        compile("^[:missing:]x");
    }

    #[test]
    fn compile_is_memoized() {
        let a = compile(r"^\d+[:punct:]");
        let b = compile(r"^\d+[:punct:]");
        assert_eq!(a.as_str(), b.as_str());
        assert!(a.is_match("12!"));
        let dotall = compile_with_flags("^a.b", "s");
        assert!(dotall.is_match("a\nb"));
        assert!(!compile("^a.b").is_match("a\nb"));
    }

    #[test]
    fn list_head_fragment() {
        let re = compile("^[:txlisthd:]");
        assert!(re.is_match("# one"));
        assert!(re.is_match("*(cls) two"));
        assert!(re.is_match("#_ three"));
        assert!(re.is_match("#12 twelve"));
        assert!(re.is_match("#(x).\n"));
        assert!(!re.is_match("*bold* text"));
        assert!(!re.is_match("** nested first"));
        assert!(!re.is_match("*** a"));
        assert!(!re.is_match("# "));
    }

    #[test]
    fn list_item_fragment_allows_nesting() {
        let re = compile("^[:txlisthd2:]");
        assert!(re.is_match("** nested"));
        assert!(re.is_match("*#_ mixed"));
        assert!(re.is_match("##(cls) deep"));
        assert!(!re.is_match("**bold** text"));
    }
}
