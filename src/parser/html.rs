//! Lenient scanner for raw HTML embedded in Textile.
//!
//! This is not a validating HTML parser: it produces a flat token stream and a
//! tree that closes elements on the nearest matching end tag, ignoring stray
//! end tags. `<script>`, `<code>` and `<style>` switch the scanner into text
//! mode, where only their own end tag is recognised.

use std::collections::HashMap;

use crate::ast::{Attributes, Element, Node};
use crate::patterns::{compile, compile_with_flags};

/// Elements that never take content.
pub const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "option", "param",
    "wbr",
];

const TEXT_MODE_TAGS: &[&str] = &["script", "code", "style"];

pub fn is_void(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Open,
    Close,
    Void,
    Text,
    Comment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub tag: Option<&'a str>,
    pub attributes: Option<Attributes>,
    /// Text content for text tokens, the body for comments.
    pub data: &'a str,
    /// Exact source text of the token.
    pub source: &'a str,
    /// Byte offset of the token within the tokenized input.
    pub offset: usize,
}

impl Token<'_> {
    pub fn end(&self) -> usize {
        self.offset + self.source.len()
    }
}

/// An open or self-closing tag recognised at the start of some input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatch<'a> {
    pub name: &'a str,
    pub attributes: Option<&'a str>,
    pub self_closing: bool,
    /// Bytes consumed, including any leading whitespace.
    pub len: usize,
}

impl TagMatch<'_> {
    pub fn is_void(&self) -> bool {
        self.self_closing || is_void(self.name)
    }

    pub fn to_element(&self) -> Element {
        let element = Element::new(self.name);
        match self.attributes {
            Some(src) => element.with_attributes(parse_html_attributes(src)),
            None => element,
        }
    }
}

fn tag_from_captures<'a>(caps: &regex::Captures<'a>) -> Option<TagMatch<'a>> {
    Some(TagMatch {
        name: caps.get(1)?.as_str(),
        attributes: caps.get(2).map(|m| m.as_str()),
        self_closing: caps.get(3).is_some_and(|m| !m.as_str().is_empty()),
        len: caps.get(0)?.len(),
    })
}

/// `<!-- ... -->`; returns the consumed length and the comment body.
pub fn match_comment(src: &str) -> Option<(usize, &str)> {
    let caps = compile_with_flags(r"^<!--(.+?)-->", "s").captures(src)?;
    Some((caps.get(0)?.len(), caps.get(1)?.as_str()))
}

/// `</name ...>`; returns the consumed length and the tag name.
pub fn match_close_tag(src: &str) -> Option<(usize, &str)> {
    let caps = compile(r"^</([:html_id:])([^>]*)>").captures(src)?;
    Some((caps.get(0)?.len(), caps.get(1)?.as_str()))
}

pub fn match_open_tag(src: &str) -> Option<TagMatch<'_>> {
    let caps = compile(r"^<([:html_id:])([:html_attrs:])?\s*(/?)>").captures(src)?;
    tag_from_captures(&caps)
}

/// Open tag at the start of a block: leading whitespace and namespaced names
/// are allowed.
pub fn match_block_open_tag(src: &str) -> Option<TagMatch<'_>> {
    let caps = compile(r"^\s*<([:html_id:](?::[a-zA-Z\d]+)*)([:html_attrs:])?\s*(/?)>")
        .captures(src)?;
    tag_from_captures(&caps)
}

/// Parse the attribute part of a tag. Surrounding quotes are removed from
/// values; attributes without a value map to `None`.
pub fn parse_html_attributes(src: &str) -> Attributes {
    let re_attr = compile(r#"^\s*([^=\s]+)(?:\s*=\s*("[^"]+"|'[^']+'|[^>\s]+))?"#);
    let mut attributes = Attributes::new();
    let mut rest = src;
    while let Some(caps) = re_attr.captures(rest) {
        let Some(whole) = caps.get(0) else { break };
        let name = caps.get(1).map_or("", |m| m.as_str());
        let value = caps.get(2).map(|m| unquote(m.as_str()).to_string());
        attributes.set(name, value);
        rest = &rest[whole.end()..];
    }
    attributes
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Tokenize `src`.
///
/// `whitelist` limits which tag names are recognised (`"!"` stands for
/// comments); everything else is text. With `lazy` set to the name of the
/// element being extracted, tokenizing stops at the end tag that brings the
/// nesting back to zero.
pub fn tokenize<'a>(src: &'a str, whitelist: Option<&[&str]>, lazy: Option<&str>) -> Vec<Token<'a>> {
    let mut tokens = Vec::new();
    let mut text_mode: Option<&'a str> = None;
    let mut nesting: HashMap<&'a str, i32> = HashMap::new();
    let mut depth: i32 = 0;
    let mut pos = 0;

    let allowed = |tag: &str, text_mode: Option<&str>| match (text_mode, whitelist) {
        (Some(mode), _) => tag == mode,
        (None, Some(list)) => list.contains(&tag),
        (None, None) => true,
    };

    while pos < src.len() {
        let rest = &src[pos..];

        if let Some((len, body)) = match_comment(rest)
            && allowed("!", text_mode)
        {
            tokens.push(Token {
                kind: TokenKind::Comment,
                tag: None,
                attributes: None,
                data: body,
                source: &rest[..len],
                offset: pos,
            });
            pos += len;
            continue;
        }

        if let Some((len, tag)) = match_close_tag(rest)
            && allowed(tag, text_mode)
        {
            tokens.push(Token {
                kind: TokenKind::Close,
                tag: Some(tag),
                attributes: None,
                data: "",
                source: &rest[..len],
                offset: pos,
            });
            pos += len;
            depth -= 1;
            let opened = nesting.get_mut(tag).map(|count| {
                *count -= 1;
                *count
            });
            if let Some(target) = lazy
                && (depth == 0 || opened.is_none())
            {
                log::trace!("lazy tokenize of <{target}> stopped at </{tag}>");
                return tokens;
            }
            text_mode = None;
            continue;
        }

        if let Some(tag) = match_open_tag(rest)
            && allowed(tag.name, text_mode)
        {
            let kind = if tag.is_void() {
                TokenKind::Void
            } else {
                TokenKind::Open
            };
            if TEXT_MODE_TAGS.contains(&tag.name) {
                text_mode = Some(tag.name);
            }
            if kind == TokenKind::Open {
                depth += 1;
                *nesting.entry(tag.name).or_insert(0) += 1;
            }
            tokens.push(Token {
                kind,
                tag: Some(tag.name),
                attributes: tag.attributes.map(parse_html_attributes),
                data: "",
                source: &rest[..tag.len],
                offset: pos,
            });
            pos += tag.len;
            continue;
        }

        // text up to the next `<`, or a lone `<`
        let len = match rest.find('<') {
            Some(0) => 1,
            Some(next) => next,
            None => rest.len(),
        };
        tokens.push(Token {
            kind: TokenKind::Text,
            tag: None,
            attributes: None,
            data: &rest[..len],
            source: &rest[..len],
            offset: pos,
        });
        pos += len;
    }

    tokens
}

/// Build nodes from a token stream.
///
/// Returns the nodes and how many bytes of the tokenized input they cover. In
/// lazy mode building stops as soon as an end tag closes the last open
/// element.
pub fn build_tree(tokens: &[Token<'_>], lazy: bool) -> (Vec<Node>, usize) {
    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<Element> = Vec::new();

    fn attach(root: &mut Vec<Node>, stack: &mut [Element], node: Node) {
        match stack.last_mut() {
            Some(parent) => parent.push(node),
            None => match (root.last_mut(), node) {
                (Some(Node::Text(last)), Node::Text(text)) => last.push_str(&text),
                (_, Node::Text(text)) if text.is_empty() => {}
                (_, node) => root.push(node),
            },
        }
    }

    fn close_to(root: &mut Vec<Node>, stack: &mut Vec<Element>, depth: usize) {
        while stack.len() > depth {
            if let Some(element) = stack.pop() {
                attach(root, stack, Node::Element(element));
            }
        }
    }

    for token in tokens {
        match token.kind {
            TokenKind::Comment => {
                let comment = Element::new("!").with_text(token.data);
                attach(&mut root, &mut stack, comment.into());
            }
            TokenKind::Text => attach(&mut root, &mut stack, Node::text(token.data)),
            TokenKind::Void => {
                let element = Element::new(token.tag.unwrap_or_default())
                    .with_attributes(token.attributes.clone().unwrap_or_default());
                attach(&mut root, &mut stack, element.into());
            }
            TokenKind::Open => {
                stack.push(
                    Element::new(token.tag.unwrap_or_default())
                        .with_attributes(token.attributes.clone().unwrap_or_default()),
                );
            }
            TokenKind::Close => {
                if let Some(index) = stack
                    .iter()
                    .rposition(|open| Some(open.tag.as_str()) == token.tag)
                {
                    close_to(&mut root, &mut stack, index);
                }
                if stack.is_empty() && lazy {
                    return (root, token.end());
                }
            }
        }
    }

    close_to(&mut root, &mut stack, 0);
    let len = tokens.last().map_or(0, Token::end);
    (root, len)
}

/// Tokenize and build in one step.
pub fn parse_html(src: &str) -> Vec<Node> {
    build_tree(&tokenize(src, None, None), false).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(tokens: &[Token<'_>]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_mixed_markup() {
        let tokens = tokenize("a <b class=x>bold</b><br/><!-- c -->", None, None);
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Text,
                TokenKind::Open,
                TokenKind::Text,
                TokenKind::Close,
                TokenKind::Void,
                TokenKind::Comment,
            ]
        );
        assert_eq!(tokens[1].attributes.as_ref().and_then(|a| a.get("class")), Some("x"));
        assert_eq!(tokens[5].data, " c ");
        assert_eq!(tokens[3].offset, 17);
    }

    #[test]
    fn void_tags_do_not_nest() {
        let tokens = tokenize("<img src=\"a.png\"><hr>", None, None);
        assert_eq!(kinds(&tokens), vec![TokenKind::Void, TokenKind::Void]);
        assert_eq!(
            tokens[0].attributes.as_ref().and_then(|a| a.get("src")),
            Some("a.png")
        );
    }

    #[test]
    fn text_mode_hides_inner_tags() {
        let tokens = tokenize("<code><b>x</b></code>", None, None);
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Open,
                TokenKind::Text,
                TokenKind::Text,
                TokenKind::Text,
                TokenKind::Text,
                TokenKind::Close,
            ]
        );
        assert_eq!(tokens[5].tag, Some("code"));
    }

    #[test]
    fn whitelist_limits_tags() {
        let tokens = tokenize("<pre><b>x</b></pre>", Some(&["pre", "code"]), None);
        assert_eq!(tokens.first().map(|t| t.kind), Some(TokenKind::Open));
        assert!(tokens.iter().all(|t| t.tag != Some("b")));
    }

    #[test]
    fn lazy_stops_at_balanced_close() {
        let src = "<div><div>a</div></div>tail";
        let tokens = tokenize(src, None, Some("div"));
        let last = tokens.last().unwrap();
        assert_eq!(last.kind, TokenKind::Close);
        assert_eq!(&src[last.end()..], "tail");
    }

    #[test]
    fn builds_nested_tree() {
        let nodes = parse_html("<p>a <em>b</em></p><hr />");
        assert_eq!(
            nodes,
            vec![
                Node::from(
                    Element::new("p")
                        .with_text("a ")
                        .with_children([Node::from(Element::new("em").with_text("b"))])
                ),
                Node::from(Element::new("hr")),
            ]
        );
    }

    #[test]
    fn stray_close_tags_are_ignored() {
        let nodes = parse_html("a</i>b");
        assert_eq!(nodes, vec![Node::text("ab")]);
    }

    #[test]
    fn unclosed_elements_keep_content() {
        let nodes = parse_html("<div>open");
        assert_eq!(nodes, vec![Node::from(Element::new("div").with_text("open"))]);
    }

    #[test]
    fn lazy_build_reports_length() {
        let src = "<pre>x</pre>\nrest";
        let (nodes, len) = build_tree(&tokenize(src, None, Some("pre")), true);
        assert_eq!(nodes.len(), 1);
        assert_eq!(&src[len..], "\nrest");
    }

    #[test]
    fn attribute_values() {
        let attrs = parse_html_attributes(r#" a="1" b='2' c=3 d"#);
        assert_eq!(attrs.get("a"), Some("1"));
        assert_eq!(attrs.get("b"), Some("2"));
        assert_eq!(attrs.get("c"), Some("3"));
        assert!(attrs.contains_key("d"));
        assert_eq!(attrs.get("d"), None);
    }
}
