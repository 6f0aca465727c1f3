//! Block-level parsing: splits the source into blocks and hands each one to
//! the matching sub-parser.

pub mod attr;
pub mod deflist;
pub mod glyph;
pub mod html;
pub mod list;
pub mod phrase;
pub mod table;

use std::collections::HashMap;

use log::debug;

use crate::ast::{Attributes, Document, Element, Node, NodeList};
use crate::cursor::Cursor;
use crate::options::Options;
use crate::patterns::compile;
use crate::renderer::HtmlRenderer;

use attr::{AttrContext, parse_attr};
use deflist::parse_deflist;
use html::{TokenKind, build_tree, match_block_open_tag, match_comment, tokenize};
pub use list::ListState;
use list::parse_list;
use phrase::parse_phrase;
use table::{match_table, parse_table};

/// Parses a run of blocks. Sub-parsers that contain blocks of their own
/// (definition lists, block HTML) call back into this.
pub trait FlowParser {
    fn parse_flow(&mut self, src: &str) -> Vec<Node>;
}

/// HTML tags that may open a block of their own.
const BLOCK_TAGS: &[&str] = &[
    "p",
    "hr",
    "ul",
    "ol",
    "li",
    "div",
    "pre",
    "object",
    "script",
    "noscript",
    "blockquote",
    "notextile",
];

/// Textile parser.
///
/// ```
/// use textile::{Options, Parser};
///
/// let parser = Parser::new(Options::default());
/// assert_eq!(parser.html("h2. Hi"), "<h2>Hi</h2>");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Parser {
    options: Options,
}

impl Parser {
    pub fn new(options: Options) -> Self {
        Parser { options }
    }

    pub fn parse(&self, text: &str) -> Document {
        self.parse_with_state(text, &mut ListState::new())
    }

    /// Parse with list counters carried over from earlier calls. An ordered
    /// list at the very start of `text` continues the carried numbering.
    pub fn parse_with_state(&self, text: &str, lists: &mut ListState) -> Document {
        let mut flow = Flow {
            options: self.options,
            lists,
            links: HashMap::new(),
            at_start: true,
        };
        let mut nodes = flow.parse_flow(text);
        if !flow.links.is_empty() {
            debug!("resolving {} link references", flow.links.len());
            resolve_links(&mut nodes, &flow.links);
        }
        nodes
    }

    pub fn html(&self, text: &str) -> String {
        HtmlRenderer::new().render_document(&self.parse(text))
    }
}

/// Per-document block parsing state.
struct Flow<'s> {
    options: Options,
    lists: &'s mut ListState,
    links: HashMap<String, String>,
    /// No block has been emitted yet.
    at_start: bool,
}

impl FlowParser for Flow<'_> {
    fn parse_flow(&mut self, src: &str) -> Vec<Node> {
        let re_blank_lines = compile(r"^(?:[ \t]*\r?\n)+");
        let re_link_ref = compile(r"^\[([^\]]+)\]((?:https?://|/)\S+)(?:\s*\n|$)");

        let mut out = NodeList::new();
        let mut cursor = Cursor::new(src);
        loop {
            if let Some(blank) = re_blank_lines.find(cursor.remaining()) {
                cursor.advance(blank.end());
            }
            let rest = cursor.remaining();
            if rest.trim().is_empty() {
                break;
            }

            if let Some(caps) = re_link_ref.captures(rest) {
                self.links.insert(caps[1].to_string(), caps[2].to_string());
                cursor.advance(caps[0].len());
                continue;
            }

            out.linebreak();
            let (len, nodes) = self.block(rest);
            out.merge(nodes);
            cursor.advance(len.max(1));
        }
        out.into_nodes()
    }
}

impl Flow<'_> {
    /// Parse the block at the start of `rest`; returns the consumed length.
    fn block(&mut self, rest: &str) -> (usize, Vec<Node>) {
        let at_start = std::mem::take(&mut self.at_start);
        if let Some(found) = self.named_block(rest) {
            return found;
        }

        if let Some((len, body)) = match_comment(rest) {
            debug!("comment block");
            let trailing = compile(r"^(?:[ \t]*\r?\n)*")
                .find(&rest[len..])
                .map_or(0, |m| m.end());
            return (len + trailing, vec![Element::new("!").with_text(body).into()]);
        }

        if let Some(found) = self.block_html(rest) {
            return found;
        }

        if let Some(rule) = compile(r"^(?:---+|\*\*\*+|___+)(?:\r?\n\s+|$)").find(rest) {
            debug!("horizontal rule");
            return (rule.end(), vec![Element::new("hr").into()]);
        }

        if compile("^[:txlisthd:]").is_match(rest) {
            let (end, len) = block_extent(rest, false, false);
            if let Some(list) = parse_list(&rest[..end], self.lists, at_start, &self.options) {
                debug!("list of {len} bytes");
                return (len, vec![list.into()]);
            }
        }

        let options = self.options;
        if let Some((len, dl)) = parse_deflist(rest, self, &options) {
            return (len, vec![dl.into()]);
        }

        if let Some((len, body)) = match_table(rest) {
            debug!("table of {len} bytes");
            return (len, vec![parse_table(&rest[..body], &self.options).into()]);
        }

        let (end, len) = block_extent(rest, true, false);
        (len, self.paragraph(&rest[..end], "p", &Attributes::new()))
    }

    /// `tag(attributes). content` and the extended `tag.. content` form.
    fn named_block(&mut self, rest: &str) -> Option<(usize, Vec<Node>)> {
        let kind = compile("^[:txblocks:]").find(rest)?;
        let block_type = kind.as_str();
        let mut pos = kind.end();

        let mut attributes = Attributes::new();
        if block_type != "notextile"
            && let Some((len, attrs)) = parse_attr(&rest[pos..], AttrContext::Block, None)
        {
            pos += len;
            attributes = attrs;
        }

        let marker = compile(r"^\.(\.?)").captures(&rest[pos..])?;
        let extended = marker.get(1).is_some_and(|m| !m.as_str().is_empty());
        pos += marker.get(0)?.end();
        match rest[pos..].chars().next() {
            // the `bq.:cite` form keeps its colon for the cite match below
            Some(':') => {}
            Some(c) if c.is_whitespace() => pos += c.len_utf8(),
            _ => return None,
        }

        let verbatim = matches!(block_type, "bc" | "pre");
        let (end, consumed) = block_extent(&rest[pos..], !verbatim && !extended, extended);
        let content = &rest[pos..pos + end];
        let total = pos + consumed;
        debug!(
            "{block_type} block{} of {total} bytes",
            if extended { " (extended)" } else { "" }
        );

        let nodes = match block_type {
            "bq" => {
                let mut inner = content;
                if let Some(caps) = compile(r"^:(\S+)\s+").captures(inner) {
                    attributes.insert("cite", &caps[1]);
                    inner = &inner[caps[0].len()..];
                }
                let paragraphs = self.paragraph(inner, "p", &attributes.without(&["cite", "id"]));
                vec![
                    Element::new("blockquote")
                        .with_attributes(attributes)
                        .with_text("\n")
                        .with_children(paragraphs)
                        .with_text("\n")
                        .into(),
                ]
            }
            "bc" => {
                let code = Element::new("code")
                    .with_attributes(attributes.without(&["id"]))
                    .with_text(content);
                vec![
                    Element::new("pre")
                        .with_attributes(attributes)
                        .with_children([Node::from(code)])
                        .into(),
                ]
            }
            "notextile" => build_tree(&tokenize(content, None, None), false).0,
            "###" => Vec::new(),
            "pre" => vec![Element::new("pre").with_attributes(attributes).with_text(content).into()],
            footnote if footnote.starts_with("fn") => {
                let number = &footnote[2..];
                let class = match attributes.get("class") {
                    Some(class) => format!("{class} footnote"),
                    None => "footnote".to_string(),
                };
                attributes.insert("class", class);
                attributes.insert("id", format!("fn{number}"));
                let backref = Element::new("a")
                    .with_attr("href", format!("#fnr{number}"))
                    .with_children([Node::from(Element::new("sup").with_text(number))]);
                vec![
                    Element::new("p")
                        .with_attributes(attributes)
                        .with_children([Node::from(backref)])
                        .with_text(" ")
                        .with_children(parse_phrase(content, &self.options))
                        .into(),
                ]
            }
            tag => self.paragraph(content, tag, &attributes),
        };
        Some((total, nodes))
    }

    /// A block opened by a raw HTML tag that ends its line.
    fn block_html(&mut self, rest: &str) -> Option<(usize, Vec<Node>)> {
        let tag = match_block_open_tag(rest)?;
        if !BLOCK_TAGS.contains(&tag.name) {
            return None;
        }

        if tag.is_void() {
            let after = &rest[tag.len..];
            if !ends_line(after) {
                return None;
            }
            debug!("void html block <{}>", tag.name);
            return Some((tag.len + leading_whitespace(after), vec![tag.to_element().into()]));
        }

        if tag.name == "pre" {
            let tokens = tokenize(rest, Some(&["pre", "code"]), Some("pre"));
            let (nodes, len) = build_tree(&tokens, true);
            let after = &rest[len..];
            if !ends_line(after) {
                return None;
            }
            debug!("html pre block");
            return Some((len + leading_whitespace(after), nodes));
        }

        if tag.name == "notextile" {
            let tokens = tokenize(rest, None, Some("notextile"));
            let close = tokens
                .last()
                .filter(|t| t.kind == TokenKind::Close && t.tag == Some("notextile"))?;
            let open = tokens.iter().position(|t| t.kind == TokenKind::Open)?;
            if open + 1 >= tokens.len() {
                return None;
            }
            let inner = &tokens[open + 1..tokens.len() - 1];
            let skip = inner
                .iter()
                .take_while(|t| t.kind == TokenKind::Text && t.source.trim().is_empty())
                .count();
            let after = &rest[close.end()..];
            if !ends_line(after) {
                return None;
            }
            let (nodes, _) = build_tree(&inner[skip..], false);
            debug!("notextile html block");
            return Some((close.end() + leading_whitespace(after), nodes));
        }

        let lead = leading_whitespace(rest);
        let body = &rest[lead..];
        let tokens = tokenize(body, None, Some(tag.name));
        let close = tokens
            .last()
            .filter(|t| t.kind == TokenKind::Close && t.tag == Some(tag.name))?;
        let mut first = 1;
        while first < tokens.len() - 1
            && tokens[first].kind == TokenKind::Text
            && tokens[first].source.chars().all(|c| c == '\n' || c == '\r')
        {
            first += 1;
        }
        let inner = body.get(tokens.get(first)?.offset..close.offset)?;
        let after = &body[close.end()..];
        if !ends_line(after) {
            return None;
        }

        let mut element = tag.to_element();
        if matches!(tag.name, "script" | "style") {
            element.push(Node::text(inner));
        } else {
            let inner_html = inner.trim_start_matches('\n').trim_end();
            let is_block = inner_html.contains("\n\n")
                || inner_html.contains("\n\r\n")
                || matches!(tag.name, "ol" | "ul");
            let content = if is_block {
                self.parse_flow(inner_html)
            } else {
                parse_phrase(inner_html, &self.options.without_breaks())
            };
            if is_block || inner.starts_with('\n') {
                element.push(Node::text("\n"));
            }
            element.extend(content);
            if is_block || inner.ends_with(char::is_whitespace) {
                element.push(Node::text("\n"));
            }
        }
        debug!("html block <{}>", tag.name);
        Some((
            lead + close.end() + leading_whitespace(after),
            vec![element.into()],
        ))
    }

    /// Split `src` into paragraphs at blank lines. In a plain `p` block, a
    /// paragraph that starts with whitespace is kept as bare text.
    fn paragraph(&self, src: &str, tag: &str, attributes: &Attributes) -> Vec<Node> {
        let mut out = NodeList::new();
        for (index, piece) in compile(r"(?:\r?\n){2,}").split(src).enumerate() {
            if tag == "p" && piece.starts_with(char::is_whitespace) {
                let text = compile(r"\r?\n[\t ]").replace_all(piece, " ");
                out.merge(parse_phrase(text.trim(), &self.options));
                continue;
            }
            if index > 0 {
                out.add_text("\n");
            }
            out.add(
                Element::new(tag)
                    .with_attributes(attributes.clone())
                    .with_children(parse_phrase(piece, &self.options)),
            );
        }
        out.into_nodes()
    }
}

/// End of the content of a block at the start of `src`, and how much input
/// the block consumes.
///
/// A normal block ends at a blank line or, with `stop_at_list`, before a line
/// that starts a list. An extended block runs until a blank line followed by
/// the signature of another block.
fn block_extent(src: &str, stop_at_list: bool, extended: bool) -> (usize, usize) {
    let re_list = compile("^[:txlisthd:]");
    let re_blank = compile(r"^\r?\n(?:\s*\n|$)+");
    let re_next_block = compile(r"^(?:\r?\n){2,}[:txblocks:][:txattr:]\.");

    for (index, _) in src.match_indices('\n') {
        let start = if index > 0 && src.as_bytes()[index - 1] == b'\r' {
            index - 1
        } else {
            index
        };
        if extended {
            if re_next_block.is_match(&src[start..]) {
                let blank = compile(r"^(?:\r?\n)+").find(&src[start..]).map_or(0, |m| m.end());
                return (start, start + blank);
            }
            continue;
        }
        if stop_at_list && re_list.is_match(&src[index + 1..]) {
            return (start, index + 1);
        }
        if let Some(blank) = re_blank.find(&src[start..]) {
            return (start, start + blank.end());
        }
    }
    (src.len(), src.len())
}

/// The rest of the line after an HTML block must be blank.
fn ends_line(after: &str) -> bool {
    compile(r"^[ \t\r]*(?:\n|$)").is_match(after)
}

fn leading_whitespace(src: &str) -> usize {
    src.len() - src.trim_start().len()
}

/// Replace `href`s that name a link reference with the reference's URL.
fn resolve_links(nodes: &mut [Node], links: &HashMap<String, String>) {
    for node in nodes {
        if let Node::Element(element) = node {
            if element.tag == "a"
                && let Some(url) = element.attributes.get("href").and_then(|href| links.get(href)).cloned()
            {
                element.attributes.insert("href", url);
            }
            resolve_links(&mut element.children, links);
        }
    }
}
