//! Tables: an optional `table.` line, caption, column groups, row groups and
//! `|cell|cell|` rows.

use crate::ast::{Attributes, Element, Node, NodeList};
use crate::cursor::Cursor;
use crate::options::Options;
use crate::patterns::{compile, compile_with_flags};

use super::attr::{AttrContext, parse_attr};
use super::phrase::parse_phrase;

fn group_tag(mark: &str) -> &'static str {
    match mark {
        "^" => "thead",
        "~" => "tfoot",
        _ => "tbody",
    }
}

/// Length of the table block at the start of `src`, including trailing blank
/// lines, and the length of the table source proper.
pub fn match_table(src: &str) -> Option<(usize, usize)> {
    let re_table = compile_with_flags(
        r"^((?:table[:txattr:]\.(?:[ \t][^\n]*)?\n)?(?:(?:[:txcellattr:]\.[^\n\S]*)?\|.*?\|[^\n\S]*(?:\n|$))+)([^\n\S]*\n+)?",
        "s",
    );
    let caps = re_table.captures(src)?;
    Some((caps.get(0)?.end(), caps.get(1)?.end()))
}

fn parse_colgroup(src: &str) -> Element {
    let re_span = compile(r"^\\(\d+)");
    let re_width = compile(r"\b\d+\b");
    let mut colgroup = Element::new("colgroup");

    for (index, part) in src.split('|').enumerate() {
        let mut attributes = Attributes::new();
        let mut rest = part.trim();
        if !rest.is_empty() {
            if let Some(caps) = re_span.captures(rest) {
                attributes.insert("span", &caps[1]);
                rest = &rest[caps[0].len()..];
            }
            if let Some((len, attrs)) = parse_attr(rest, AttrContext::Column, None) {
                attributes.merge(&attrs);
                rest = &rest[len..];
            }
            if let Some(width) = re_width.find(rest) {
                attributes.insert("width", width.as_str());
            }
        }
        if index == 0 {
            colgroup.attributes = attributes;
        } else {
            colgroup.push(Node::text("\n\t\t"));
            colgroup.push(Node::from(Element::new("col").with_attributes(attributes)));
        }
    }
    colgroup.push(Node::text("\n\t"));
    colgroup
}

fn parse_row(prefix: Option<&str>, cells: &str, options: &Options) -> Element {
    let mut row = Element::new("tr");
    if let Some((_, attrs)) = prefix.and_then(|p| parse_attr(p, AttrContext::Row, None)) {
        row.attributes = attrs;
    }

    let re_dot = compile(r"^\.\s*");
    let re_content = compile(r"^(?:==.*?==|[^|])*");
    let mut cursor = Cursor::new(cells);
    loop {
        cursor.save();
        let header = cursor.starts_with("_");
        if header {
            cursor.advance(1);
        }
        let mut cell = Element::new(if header { "th" } else { "td" });
        let attrs = parse_attr(cursor.remaining(), AttrContext::Cell, None);
        if let Some((len, attrs)) = &attrs {
            cursor.advance(*len);
            cell.attributes = attrs.clone();
        }
        if attrs.is_some() || header {
            match re_dot.find(cursor.remaining()) {
                Some(dot) => {
                    cursor.advance(dot.end());
                }
                None => {
                    cell = Element::new("td");
                    cursor.restore();
                }
            }
        }

        let content = re_content
            .find(cursor.remaining())
            .map_or("", |m| m.as_str());
        cell.extend(parse_phrase(content, options));
        row.push(Node::text("\n\t\t\t"));
        row.push(Node::from(cell));

        let more = cursor.remaining()[content.len()..].starts_with('|');
        cursor.advance(content.len() + 1);
        if !more {
            break;
        }
    }
    row.push(Node::text("\n\t\t"));
    row
}

/// Remove one tab from every pretty-print indent in `nodes`.
fn dedent(nodes: Vec<Node>) -> Vec<Node> {
    nodes
        .into_iter()
        .map(|node| match node {
            Node::Text(text) if text.starts_with("\n\t") => Node::Text(text.replacen("\n\t", "\n", 1)),
            Node::Element(mut element) => {
                element.children = dedent(element.children);
                Node::Element(element)
            }
            other => other,
        })
        .collect()
}

/// Parse a table block as delimited by [`match_table`].
pub fn parse_table(src: &str, options: &Options) -> Element {
    let re_head = compile(r"^table(_?)([^\n]*?)\.(?:[ \t](.+?))?\s*\n");
    let re_caption = compile(r"^\|=([^\n+]*)\n");
    let re_colgroup = compile(r"^\|:([^\n+]*)\|[\r\t ]*\n");
    let re_rowgroup = compile(r"^\|([\^\-~])([^\n+]*)\.[ \t\r]*\n");
    let re_row = compile_with_flags(
        r"^([:txcellattr:]\.[^\n\S]*)?\|(.*?)\|[^\n\S]*(\n|$)",
        "s",
    );

    let mut cursor = Cursor::new(src);
    let mut table = Element::new("table");
    let mut caption = None;
    let mut colgroup = None;
    let mut groups: Vec<Element> = Vec::new();
    let mut extended = false;

    if let Some(caps) = re_head.captures(cursor.remaining()) {
        if let Some(attrs) = caps.get(2).and_then(|m| parse_attr(m.as_str(), AttrContext::Block, None)) {
            table.attributes = attrs.1;
        }
        if let Some(summary) = caps.get(3) {
            table.attributes.insert("summary", summary.as_str());
        }
        cursor.advance(caps[0].len());
    }

    if let Some(caps) = re_caption.captures(cursor.remaining()) {
        let mut line = &caps[1];
        let mut attributes = Attributes::new();
        if let Some((len, attrs)) = parse_attr(line, AttrContext::Phrase, None) {
            attributes = attrs;
            line = &line[len..];
        }
        // the dot is mandatory, otherwise this is an ordinary row
        if let Some(text) = line.strip_prefix('.') {
            let text = compile(r"\|\s*$").replace(text, "");
            caption = Some(
                Element::new("caption")
                    .with_attributes(attributes)
                    .with_children(parse_phrase(text.trim(), options)),
            );
            extended = true;
            cursor.advance(caps[0].len());
        }
    }

    loop {
        let rest = cursor.remaining();
        if let Some(caps) = re_colgroup.captures(rest) {
            colgroup = Some(parse_colgroup(&caps[1]));
            extended = true;
            cursor.advance(caps[0].len());
        } else if let Some(caps) = re_rowgroup.captures(rest) {
            let tag = group_tag(&caps[1]);
            let attributes = parse_attr(&caps[2], AttrContext::Block, None)
                .map(|(_, attrs)| attrs)
                .unwrap_or_default();
            groups.push(Element::new(tag).with_attributes(attributes));
            extended = true;
            cursor.advance(caps[0].len());
        } else if let Some(caps) = re_row.captures(rest) {
            if groups.is_empty() {
                groups.push(Element::new("tbody"));
            }
            let row = parse_row(
                caps.get(1).map(|m| m.as_str()),
                caps.get(2).map_or("", |m| m.as_str()),
                options,
            );
            if let Some(group) = groups.last_mut() {
                group.push(Node::text("\n\t\t"));
                group.push(Node::from(row));
            }
            cursor.advance(caps[0].len());
        } else {
            break;
        }
    }

    let mut children = NodeList::new();
    if extended {
        if let Some(caption) = caption {
            children.add_text("\n\t").add(caption);
        }
        if let Some(colgroup) = colgroup {
            children.add_text("\n\t").add(colgroup);
        }
        for mut group in groups {
            group.push(Node::text("\n\t"));
            children.add_text("\n\t").add(group);
        }
    } else if let Some(body) = groups.into_iter().next() {
        children.merge(dedent(body.children));
    }
    children.add_text("\n");
    table.with_children(children.into_nodes())
}
