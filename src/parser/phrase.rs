//! Inline (phrase) markup: emphasis family, images, links, footnote
//! references, acronyms, inline HTML and glyphs.
//!
//! Every rule either matches at the current position and reports how much it
//! consumed, or leaves the cursor alone. Anything no rule claims falls through
//! to plain text, so parsing never fails.

use crate::ast::{Attributes, Element, Node, NodeList};
use crate::cursor::Cursor;
use crate::options::Options;
use crate::patterns::{compile, compile_with_flags, escape};

use super::attr::{AttrContext, parse_attr};
use super::glyph::glyphs;
use super::html::{TagMatch, build_tree, match_comment, match_open_tag, tokenize};

/// Output for one phrase run. Plain text is buffered and passes through glyph
/// substitution when the next element (or the end) arrives.
struct PhraseBuilder {
    nodes: NodeList,
    text: String,
}

impl PhraseBuilder {
    fn new() -> Self {
        PhraseBuilder {
            nodes: NodeList::new(),
            text: String::new(),
        }
    }

    fn text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn flush(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.nodes.add_text(&glyphs(&text));
        }
    }

    /// Text that must reach the output exactly as written.
    fn verbatim(&mut self, text: &str) {
        self.flush();
        self.nodes.add_text(text);
    }

    fn element(&mut self, element: Element) {
        self.flush();
        self.nodes.add(element);
    }

    fn merge(&mut self, nodes: Vec<Node>) {
        self.flush();
        self.nodes.merge(nodes);
    }

    fn finish(mut self) -> Vec<Node> {
        self.flush();
        self.nodes.into_nodes()
    }
}

fn span_tag(token: &str) -> Option<&'static str> {
    Some(match token {
        "*" => "strong",
        "**" => "b",
        "??" => "cite",
        "_" => "em",
        "__" => "i",
        "-" => "del",
        "%" => "span",
        "+" => "ins",
        "~" => "sub",
        "^" => "sup",
        "@" => "code",
        _ => return None,
    })
}

fn is_left_boundary(c: char) -> bool {
    c.is_whitespace() || "<>.,\"'?!;:()[]%{}".contains(c)
}

fn is_right_boundary(next: Option<char>) -> bool {
    next.is_none_or(|c| c.is_whitespace() || ".,\"'!?;:()«»„“”‚‘’<>".contains(c))
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// ASCII punctuation that may trail a URL without being part of it.
fn is_url_punct(c: char) -> bool {
    c.is_ascii_punctuation() && c != '/'
}

/// Length of `text` up to the first blank line.
fn blank_line_limit(text: &str) -> usize {
    compile(r"\n[ \t\r]*\n")
        .find(text)
        .map_or(text.len(), |m| m.start())
}

/// Find the closing `token` of a span whose content starts at `rest`.
/// Returns the content length and the total length including the closer.
fn span_close(rest: &str, token: &str, fence: &str, code: bool) -> Option<(usize, usize)> {
    if !fence.is_empty() {
        let closer = format!("{token}{}", if fence == "[" { ']' } else { '}' });
        let line = rest.split('\n').next().unwrap_or_default();
        let end = line.find(&closer)?;
        return (end > 0).then_some((end, end + closer.len()));
    }

    let scope = &rest[..blank_line_limit(rest)];
    let first = scope.chars().next()?;
    let lead = token.chars().next()?;
    if first.is_whitespace() || (!code && first == lead) {
        return None;
    }

    let closes_at = |index: usize| {
        let content = &scope[..index];
        index > 0
            && content.chars().last().is_some_and(|c| !c.is_whitespace())
            && is_right_boundary(rest[index + token.len()..].chars().next())
    };

    if code {
        // prefer the last closer inside the first word
        let word = scope.find(char::is_whitespace).unwrap_or(scope.len());
        if let Some(index) = scope[..word]
            .rmatch_indices(token)
            .map(|(index, _)| index)
            .find(|&index| closes_at(index))
        {
            return Some((index, index + token.len()));
        }
    }

    scope
        .match_indices(token)
        .map(|(index, _)| index)
        .find(|&index| closes_at(index))
        .map(|index| (index, index + token.len()))
}

/// `*strong*`, `_em_`, `@code@` and friends, optionally fenced with `[]`/`{}`.
fn span(rest: &str, boundary: bool, options: &Options) -> Option<(usize, Element)> {
    let caps = compile(r"^([\[{]?)(__?|\*\*?|\?\?|[-+^~@%])").captures(rest)?;
    let fence = caps.get(1).map_or("", |m| m.as_str());
    let token = caps.get(2)?.as_str();
    if !boundary && fence.is_empty() {
        return None;
    }
    let tag = span_tag(token)?;
    let code = tag == "code";

    let mut pos = caps.get(0)?.end();
    let mut attributes = Attributes::new();
    if !code && let Some((len, attrs)) = parse_attr(&rest[pos..], AttrContext::Phrase, Some(token))
    {
        pos += len;
        attributes = attrs;
    }

    let (content_len, len) = span_close(&rest[pos..], token, fence, code)?;
    let content = &rest[pos..pos + content_len];
    let element = Element::new(tag).with_attributes(attributes);
    let element = if code {
        element.with_text(content)
    } else {
        element.with_children(parse_phrase(content, options))
    };
    Some((pos + len, element))
}

/// `!src(title)!:url`, or fenced `[!src!]`.
fn image(rest: &str) -> Option<(usize, Element)> {
    let (fenced, start) = if rest.starts_with("[!") {
        (true, 2)
    } else if rest.starts_with('!') {
        (false, 1)
    } else {
        return None;
    };
    let body = &rest[start..];
    if body.chars().next().is_none_or(char::is_whitespace) {
        return None;
    }

    let attr_len = compile(r"^[:txattr:]").find(body).map_or(0, |m| m.end());
    let with_attributes = if attr_len > 0 {
        image_body(body, attr_len, fenced)
    } else {
        None
    };
    let (len, element) = with_attributes.or_else(|| image_body(body, 0, fenced))?;
    Some((start + len, element))
}

fn image_body(body: &str, attr_len: usize, fenced: bool) -> Option<(usize, Element)> {
    let mut attributes = Attributes::new();
    let mut pos = 0;
    if attr_len > 0 {
        let (len, attrs) = parse_attr(&body[..attr_len], AttrContext::Image, None)?;
        if len != attr_len {
            return None;
        }
        attributes = attrs;
        pos = attr_len;
        if let Some(m) = compile(r"^\.[ \t]").find(&body[pos..]) {
            pos += m.end();
        }
    }

    let caps = compile(r"^([^!\s]+?) ?(?:\(((?:[^()]|\([^()]+\))+)\))?!").captures(&body[pos..])?;
    pos += caps.get(0)?.end();
    attributes.insert("src", caps.get(1)?.as_str());
    let title = caps.get(2).map(|m| m.as_str());
    if let Some(title) = title {
        attributes.insert("title", title);
    }
    attributes.insert("alt", title.unwrap_or_default());

    let mut element = Element::new("img").with_attributes(attributes);
    if body[pos..].starts_with(':')
        && let Some(url) = image_url(&body[pos + 1..], fenced)
    {
        pos += 1 + url.len();
        element = Element::new("a")
            .with_attr("href", url)
            .with_children([Node::from(element)]);
    }
    if fenced {
        if !body[pos..].starts_with(']') {
            return None;
        }
        pos += 1;
    }
    Some((pos, element))
}

fn image_url(rest: &str, fenced: bool) -> Option<&str> {
    let end = rest
        .find(|c: char| c.is_whitespace() || (fenced && c == ']'))
        .unwrap_or(rest.len());
    let url = &rest[..end];
    if fenced {
        return (!url.is_empty()).then_some(url);
    }
    let mut chars = url.chars();
    match chars.next_back() {
        Some(last) if is_url_punct(last) && !chars.as_str().is_empty() => Some(chars.as_str()),
        Some(_) => Some(url),
        None => None,
    }
}

fn footnote_ref(rest: &str) -> Option<(usize, Element)> {
    let caps = compile(r"^\[(\d+)(!?)\]").captures(rest)?;
    let number = caps.get(1)?.as_str();
    let sup = Element::new("sup")
        .with_attr("class", "footnote")
        .with_attr("id", format!("fnr{number}"));
    let sup = if caps.get(2).is_some_and(|m| !m.is_empty()) {
        sup.with_text(number)
    } else {
        sup.with_children([Node::from(
            Element::new("a")
                .with_attr("href", format!("#fn{number}"))
                .with_text(number),
        )])
    };
    Some((caps.get(0)?.end(), sup))
}

/// Runs of capitals, with an optional `(expansion)` making an acronym.
fn caps(rest: &str) -> Option<(usize, Element)> {
    if rest.starts_with("TM)") || rest.starts_with("tm)") {
        return None;
    }
    let first = rest.chars().next()?;
    if !first.is_uppercase() {
        return None;
    }
    let end = rest
        .char_indices()
        .skip(1)
        .find(|&(_, c)| !(c.is_uppercase() || c.is_ascii_digit()))
        .map_or(rest.len(), |(index, _)| index);
    let word = &rest[..end];
    let tail = word.chars().count() - 1;
    let after = &rest[end..];
    let next = after.chars().next();
    let span = || {
        Element::new("span")
            .with_attr("class", "caps")
            .with_text(word)
    };

    if tail >= 1
        && next == Some('(')
        && let Some((len, title)) = acronym_title(after)
    {
        if title.is_empty() {
            return Some((end + len, span()));
        }
        let acronym = Element::new("acronym")
            .with_attr("title", title)
            .with_children([Node::from(span())]);
        return Some((end + len, acronym));
    }

    let long_enough = tail >= 2 || (tail >= 1 && next == Some('('));
    (long_enough && next.is_none_or(|c| !is_word_char(c))).then(|| (end, span()))
}

fn acronym_title(after: &str) -> Option<(usize, &str)> {
    let line = after.split('\n').next().unwrap_or_default();
    let (index, _) = line.match_indices(')').find(|&(index, _)| {
        after[index + 1..]
            .chars()
            .next()
            .is_none_or(|c| !is_word_char(c))
    })?;
    Some((index + 1, &after[1..index]))
}

/// URL of a quoted link: the non-blank run minus trailing punctuation. A
/// closing parenthesis that balances one inside the URL is kept.
fn link_url(rest: &str) -> Option<&str> {
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let run = &rest[..end];
    let first = run.chars().next()?;
    let mut url = run.trim_end_matches(is_url_punct);
    if url.is_empty() {
        return Some(&run[..first.len_utf8()]);
    }
    while run[url.len()..].starts_with(')') && url.matches('(').count() > url.matches(')').count() {
        url = &run[..url.len() + 1];
    }
    Some(url)
}

/// `"text":url`; returns the consumed length, link text and URL.
fn quoted_link(rest: &str) -> Option<(usize, &str, &str)> {
    let body = rest.strip_prefix('"')?;
    if body.chars().next().is_none_or(char::is_whitespace) {
        return None;
    }
    let scope = &body[..blank_line_limit(body)];

    let mut index = 0;
    while index < scope.len() {
        let at = &scope[index..];
        if at.starts_with("\":") {
            if index == 0 {
                return None;
            }
            let url = link_url(&body[index + 2..])?;
            return Some((1 + index + 2 + url.len(), &body[..index], url));
        }
        if at.starts_with('"') {
            // a nested quotation inside the link text
            let inner = &at[1..];
            if inner.chars().next().is_none_or(|c| c.is_whitespace() || c == ':') {
                return None;
            }
            let close = inner.find(['"', '\n'])?;
            if close == 0 || !inner[close..].starts_with('"') || inner[close + 1..].starts_with(':')
            {
                return None;
            }
            index += 1 + close + 1;
            continue;
        }
        index += at.chars().next().map_or(1, char::len_utf8);
    }
    None
}

/// `["text":url]`
fn fenced_link(rest: &str) -> Option<(usize, &str, &str)> {
    let caps = compile(r#"^\["([^\n]+?)":((?:\[[a-z0-9]*\]|[^\]])+)\]"#).captures(rest)?;
    Some((caps.get(0)?.end(), caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

fn link(rest: &str, boundary: bool, options: &Options) -> Option<(usize, Element)> {
    let (len, text, url) = if boundary && let Some(found) = quoted_link(rest) {
        found
    } else {
        fenced_link(rest)?
    };

    let mut inner = text;
    let mut title = None;
    if let Some(found) = compile(r"\s*\(((?:\([^()]*\)|[^()])+)\)$").captures(text)
        && let (Some(whole), Some(value)) = (found.get(0), found.get(1))
    {
        inner = &text[..whole.start()];
        title = Some((whole.as_str(), value.as_str()));
    }

    let mut attributes = Attributes::new();
    if let Some((consumed, attrs)) = parse_attr(inner, AttrContext::Anchor, None) {
        inner = &inner[consumed..];
        attributes = attrs;
    }
    if inner.is_empty()
        && let Some((whole, _)) = title.take()
    {
        inner = whole;
    }

    attributes.insert("href", url);
    if let Some((_, value)) = title {
        attributes.insert("title", value);
    }

    let self_text;
    if inner == "$" {
        self_text = compile(r"^(?:https?://|ftps?://|mailto:)").replace(url, "");
        inner = &self_text;
    }
    let inner = compile(r"^\.?\s*").replace(inner, "");
    let element = Element::new("a")
        .with_attributes(attributes)
        .with_children(parse_phrase(&inner, options));
    Some((len, element))
}

/// Content of a paired inline tag up to its end tag. Returns the consumed
/// length, or `None` when the tag is never closed.
fn paired_tag(
    out: &mut PhraseBuilder,
    rest: &str,
    tag: &TagMatch<'_>,
    options: &Options,
) -> Option<usize> {
    let re_end = compile_with_flags(&format!(r"^(.*?)(</{}\s*>)", escape(tag.name)), "s");
    let caps = re_end.captures(&rest[tag.len..])?;
    let inner = caps.get(1).map_or("", |m| m.as_str());
    match tag.name {
        "code" => out.element(tag.to_element().with_text(inner)),
        // raw HTML is still honoured inside notextile, Textile is not
        "notextile" => out.merge(build_tree(&tokenize(inner, None, None), false).0),
        _ => out.element(tag.to_element().with_children(parse_phrase(inner, options))),
    }
    Some(tag.len + caps.get(0)?.end())
}

/// Catch-all: a word-ish run, a blank run, or a single char.
fn plain_run(rest: &str) -> usize {
    let word = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || ",.':".contains(c)))
        .unwrap_or(rest.len());
    if word > 0 {
        return word;
    }
    let blank = rest
        .find(|c: char| {
            !matches!(
                c,
                ' ' | '\x0c' | '\r' | '\t' | '\x0b' | '\u{a0}' | '\u{2028}' | '\u{2029}'
            )
        })
        .unwrap_or(rest.len());
    if blank > 0 {
        return blank;
    }
    rest.chars().next().map_or(0, char::len_utf8)
}

/// Parse inline markup in `src`.
pub fn parse_phrase(src: &str, options: &Options) -> Vec<Node> {
    let mut cursor = Cursor::new(src);
    let mut out = PhraseBuilder::new();

    while !cursor.at_end() {
        if cursor.starts_with("\r\n") {
            cursor.advance(1);
        }
        if cursor.starts_with("\n") {
            cursor.advance(1);
            if cursor.starts_with(" ") {
                cursor.advance(1);
            } else if options.breaks {
                out.element(Element::new("br"));
            }
            out.text("\n");
            continue;
        }

        let rest = cursor.remaining();

        if let Some(caps) = compile(r"^==(.*?)==").captures(rest)
            && let Some(whole) = caps.get(0)
        {
            out.verbatim(caps.get(1).map_or("", |m| m.as_str()));
            cursor.advance(whole.end());
            continue;
        }

        let behind = cursor.lookbehind(1);
        let boundary = behind.chars().all(is_left_boundary);

        if let Some((len, element)) = span(rest, boundary, options).or_else(|| image(rest)) {
            out.element(element);
            cursor.advance(len);
            continue;
        }

        if let Some((len, body)) = match_comment(rest) {
            out.element(Element::new("!").with_text(body));
            cursor.advance(len);
            continue;
        }

        if let Some(tag) = match_open_tag(rest) {
            if tag.is_void() {
                out.element(tag.to_element());
                cursor.advance(tag.len);
                let blank = cursor.skip_whitespace();
                out.text(blank);
                continue;
            }
            if let Some(len) = paired_tag(&mut out, rest, &tag, options) {
                cursor.advance(len);
                continue;
            }
        }

        let after_text = behind.chars().any(|c| !c.is_whitespace());
        if let Some((len, element)) = after_text
            .then(|| footnote_ref(rest))
            .flatten()
            .or_else(|| caps(rest))
            .or_else(|| link(rest, boundary, options))
        {
            out.element(element);
            cursor.advance(len);
            continue;
        }

        let len = plain_run(rest);
        out.text(&rest[..len]);
        cursor.advance(len);
    }

    out.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::{Value, json};

    fn ml(src: &str) -> Value {
        ml_with(src, &Options::default())
    }

    fn ml_with(src: &str, options: &Options) -> Value {
        Value::Array(parse_phrase(src, options).iter().map(Node::to_jsonml).collect())
    }

    #[test]
    fn emphasis_needs_a_boundary() {
        assert_eq!(ml("a *b* c"), json!(["a ", ["strong", "b"], " c"]));
        assert_eq!(ml("a*b*c"), json!(["a*b*c"]));
    }

    #[test]
    fn span_markers() {
        assert_eq!(
            ml("**b** __i__ _e_ ??c?? -d- +n+ ~s~ ^p^ %s%"),
            json!([
                ["b", "b"], " ",
                ["i", "i"], " ",
                ["em", "e"], " ",
                ["cite", "c"], " ",
                ["del", "d"], " ",
                ["ins", "n"], " ",
                ["sub", "s"], " ",
                ["sup", "p"], " ",
                ["span", "s"]
            ])
        );
    }

    #[test]
    fn code_is_literal() {
        assert_eq!(ml("@<b> x@"), json!([["code", "<b> x"]]));
        assert_eq!(ml("@a@b@ c"), json!([["code", "a@b"], " c"]));
    }

    #[test]
    fn span_attributes() {
        assert_eq!(ml("*(cls)bold*"), json!([["strong", {"class": "cls"}, "bold"]]));
        assert_eq!(
            ml("%{color:red}x%"),
            json!([["span", {"style": "color:red"}, "x"]])
        );
    }

    #[test]
    fn fenced_span_ignores_boundary() {
        assert_eq!(ml("x[*y*]z"), json!(["x", ["strong", "y"], "z"]));
    }

    #[test]
    fn span_may_wrap_lines() {
        assert_eq!(ml("*a\nb*"), json!([["strong", "a", ["br"], "\nb"]]));
        assert_eq!(ml("*a\n\nb*"), json!(["*a", ["br"], "\n", ["br"], "\nb*"]));
    }

    #[rstest]
    #[case("a\nb", true, json!(["a", ["br"], "\nb"]))]
    #[case("a\nb", false, json!(["a\nb"]))]
    #[case("a\n b", true, json!(["a\nb"]))]
    #[case("a\r\nb", false, json!(["a\nb"]))]
    fn line_breaks(#[case] src: &str, #[case] breaks: bool, #[case] expected: Value) {
        assert_eq!(ml_with(src, &Options { breaks }), expected);
    }

    #[test]
    fn verbatim_skips_markup_and_glyphs() {
        assert_eq!(ml("==*x* \"q\"=="), json!(["*x* \"q\""]));
    }

    #[test]
    fn images() {
        assert_eq!(
            ml("!img.png(Alt text)!"),
            json!([["img", {"src": "img.png", "title": "Alt text", "alt": "Alt text"}]])
        );
        assert_eq!(
            ml("!<img.png!:http://x.com"),
            json!([["a", {"href": "http://x.com"},
                ["img", {"align": "left", "src": "img.png", "alt": ""}]]])
        );
        assert_eq!(
            ml("!img.png!:http://x.com."),
            json!([["a", {"href": "http://x.com"}, ["img", {"src": "img.png", "alt": ""}]], "."])
        );
        assert_eq!(
            ml("x[!a.gif!]y"),
            json!(["x", ["img", {"src": "a.gif", "alt": ""}], "y"])
        );
    }

    #[test]
    fn footnote_references() {
        assert_eq!(
            ml("text[1]"),
            json!(["text", ["sup", {"class": "footnote", "id": "fnr1"}, ["a", {"href": "#fn1"}, "1"]]])
        );
        assert_eq!(
            ml("text[2!]"),
            json!(["text", ["sup", {"class": "footnote", "id": "fnr2"}, "2"]])
        );
        assert_eq!(ml("text [1]"), json!(["text [1]"]));
    }

    #[test]
    fn capitals() {
        assert_eq!(ml("NASA rocks"), json!([["span", {"class": "caps"}, "NASA"], " rocks"]));
        assert_eq!(
            ml("ABC(Always Be Closing)"),
            json!([["acronym", {"title": "Always Be Closing"}, ["span", {"class": "caps"}, "ABC"]]])
        );
        assert_eq!(ml("ABCdef"), json!(["ABCdef"]));
        assert_eq!(ml("AB()"), json!([["span", {"class": "caps"}, "AB"]]));
    }

    #[test]
    fn trademark_is_not_capitals() {
        assert_eq!(ml("Brand(TM) wins"), json!(["Brand™ wins"]));
        assert_eq!(ml("TM) x"), json!(["TM) x"]));
    }

    #[test]
    fn links() {
        assert_eq!(
            ml("\"Example\":http://example.com."),
            json!([["a", {"href": "http://example.com"}, "Example"], "."])
        );
        assert_eq!(
            ml("\"text(Title)\":/x"),
            json!([["a", {"href": "/x", "title": "Title"}, "text"]])
        );
        assert_eq!(
            ml("\"$\":http://example.com"),
            json!([["a", {"href": "http://example.com"}, "example.com"]])
        );
        assert_eq!(
            ml("[\"fenced\":http://x.com/a]b"),
            json!([["a", {"href": "http://x.com/a"}, "fenced"], "b"])
        );
        assert_eq!(
            ml("\"(cls)styled\":/s"),
            json!([["a", {"class": "cls", "href": "/s"}, "styled"]])
        );
    }

    #[test]
    fn link_url_keeps_balanced_parenthesis() {
        assert_eq!(
            ml("\"Rust\":https://en.wikipedia.org/wiki/Rust_(programming_language) is"),
            json!([["a", {"href": "https://en.wikipedia.org/wiki/Rust_(programming_language)"}, "Rust"], " is"])
        );
        assert_eq!(
            ml("(see \"this\":http://x.com/a_(b)))."),
            json!(["(see ", ["a", {"href": "http://x.com/a_(b)"}, "this"], "))."])
        );
        assert_eq!(
            ml("(\"x\":/y)"),
            json!(["(", ["a", {"href": "/y"}, "x"], ")"])
        );
    }

    #[test]
    fn quote_without_link_is_text() {
        assert_eq!(ml("\"Hi,\" she said. \"link\":/x"), json!(["“Hi,” she said. ", ["a", {"href": "/x"}, "link"]]));
    }

    #[test]
    fn inline_html() {
        assert_eq!(ml("<b>bold *x*</b>"), json!([["b", "bold ", ["strong", "x"]]]));
        assert_eq!(ml("<code>*x*</code>"), json!([["code", "*x*"]]));
        assert_eq!(ml("a<br>\nb"), json!(["a", ["br"], "\nb"]));
        assert_eq!(ml("<notextile><i>*x*</i></notextile>"), json!([["i", "*x*"]]));
        assert_eq!(ml("<span>open"), json!(["<span>open"]));
        assert_eq!(ml("<!-- note -->"), json!([["!", " note "]]));
    }

    #[test]
    fn glyphs_apply_to_text() {
        assert_eq!(ml("it's \"quoted\""), json!(["it’s “quoted”"]));
    }

    #[test]
    fn unterminated_markup_is_text() {
        assert_eq!(ml("*open"), json!(["*open"]));
        assert_eq!(ml("!"), json!(["!"]));
        assert_eq!(ml("\"dangling"), json!(["“dangling"]));
    }
}
