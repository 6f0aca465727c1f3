//! Typographic glyph substitution for phrase text.
//!
//! Rules run in a fixed order; later rules rely on earlier ones having
//! already consumed their triggers (prime marks before quotes, closing quotes
//! before opening quotes).

use regex::{Captures, Regex};

use crate::patterns::{compile, compile_with_flags};

fn is_punct(c: char) -> bool {
    c.is_ascii_punctuation()
}

/// `(?=\s|[:punct:]|$)`
fn space_punct_or_end(next: Option<char>) -> bool {
    next.is_none_or(|c| c.is_whitespace() || is_punct(c))
}

/// Replace matches of `re` whose following char passes `lookahead`.
///
/// Rejected matches are retried one char further on, so the scan behaves like
/// a lookahead assertion at the end of the pattern.
fn replace_followed_by(
    text: &str,
    re: &Regex,
    lookahead: impl Fn(Option<char>) -> bool,
    replacement: impl Fn(&Captures) -> String,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut pos = 0;
    while pos <= text.len() {
        let Some(caps) = re.captures_at(text, pos) else {
            break;
        };
        let Some(whole) = caps.get(0) else {
            break;
        };
        let next = text[whole.end()..].chars().next();
        if lookahead(next) {
            out.push_str(&text[last..whole.start()]);
            out.push_str(&replacement(&caps));
            last = whole.end();
            pos = if whole.is_empty() {
                whole.end() + next.map_or(1, char::len_utf8)
            } else {
                whole.end()
            };
        } else {
            pos = whole.start() + text[whole.start()..].chars().next().map_or(1, char::len_utf8);
        }
    }
    out.push_str(&text[last..]);
    out
}

fn group<'t>(caps: &Captures<'t>, index: usize) -> &'t str {
    caps.get(index).map_or("", |m| m.as_str())
}

/// Apply every glyph rule to `text`.
pub fn glyphs(text: &str) -> String {
    // arrows and dimensions
    let text = compile(r"([^-]|^)->").replace_all(text, "${1}→");
    let text = replace_followed_by(
        &text,
        &compile(r#"([\d.,]+['"]? ?)x( ?)"#),
        |next| next.is_some_and(|c| c.is_ascii_digit() || c == '.' || c == ','),
        |caps| format!("{}×{}", group(caps, 1), group(caps, 2)),
    );

    // ellipsis and dashes
    let text = compile(r"([^.]?)\.{3}").replace_all(&text, "${1}…");
    let text = compile(r"(^|[\s\w])--([\s\w]|$)").replace_all(&text, "${1}—${2}");
    let text = text.replace(" - ", " – ");

    // trademark, registered, copyright
    let text = compile(r"(\b ?|\s|^)(?:\((?:TM|tm)\)|\[(?:TM|tm)\])").replace_all(&text, "${1}™");
    let text = compile_with_flags(r"(\b ?|\s|^)(?:\(R\)|\[R\])", "i").replace_all(&text, "${1}®");
    let text = compile_with_flags(r"(\b ?|\s|^)(?:\(C\)|\[C\])", "i").replace_all(&text, "${1}©");

    // double quotes
    let text = replace_followed_by(
        &text,
        &compile(r#"(\d*[.,]?\d+)""#),
        space_punct_or_end,
        |caps| format!("{}″", group(caps, 1)),
    );
    let text = replace_followed_by(
        &text,
        &compile(r#"([^\s\[(])""#),
        space_punct_or_end,
        |caps| format!("{}”", group(caps, 1)),
    );
    let text = text.replace('"', "“");

    // single quotes
    let text = replace_followed_by(
        &text,
        &compile(r"(\d*[.,]?\d+)'"),
        space_punct_or_end,
        |caps| format!("{}′", group(caps, 1)),
    );
    let text = compile(r"(\w)'(\w)").replace_all(&text, "${1}’${2}");
    let text = replace_followed_by(
        &text,
        &compile(r"([^\s\[(])'"),
        space_punct_or_end,
        |caps| format!("{}’", group(caps, 1)),
    );
    let text = text.replace('\'', "‘");

    // fractions and degrees
    let text = compile(r"[(\[]1/4[\])]").replace_all(&text, "¼");
    let text = compile(r"[(\[]1/2[\])]").replace_all(&text, "½");
    let text = compile(r"[(\[]3/4[\])]").replace_all(&text, "¾");
    let text = compile(r"[(\[]o[\])]").replace_all(&text, "°");
    let text = compile(r"[(\[]\+/-[\])]").replace_all(&text, "±");

    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("a -> b", "a → b")]
    #[case("2 x 4", "2 × 4")]
    #[case("10x20", "10×20")]
    #[case("Windows 10x", "Windows 10x")]
    #[case("2x", "2x")]
    #[case("2 x", "2 x")]
    #[case("2x.5", "2×.5")]
    #[case("wait...", "wait…")]
    #[case("a -- b", "a — b")]
    #[case("1 - 2", "1 – 2")]
    #[case("Brand(TM)", "Brand™")]
    #[case("Brand(r) is", "Brand® is")]
    #[case("(c) 2024", "© 2024")]
    #[case("x(R)y", "x®y")]
    #[case("[C]2024", "©2024")]
    #[case("\"Hello\"", "“Hello”")]
    #[case("it's", "it’s")]
    #[case("'quoted'", "‘quoted’")]
    #[case("6' 2\" tall", "6′ 2″ tall")]
    #[case("(1/2) cup at 90(o)", "½ cup at 90°")]
    #[case("(+/-) 5", "± 5")]
    fn substitutes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(glyphs(input), expected);
    }

    #[test]
    fn plain_text_untouched() {
        assert_eq!(glyphs("plain words, nothing else"), "plain words, nothing else");
    }

    #[test]
    fn hyphenated_words_keep_hyphens() {
        assert_eq!(glyphs("well-known"), "well-known");
    }

    #[test]
    fn quote_after_bracket_opens() {
        assert_eq!(glyphs("(\"x\")"), "(“x”)");
    }
}
