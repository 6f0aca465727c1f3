//! `*` and `#` lists, nested by marker count.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ast::{Attributes, Element, Node};
use crate::options::Options;
use crate::patterns::compile;

use super::attr::{AttrContext, parse_attr};
use super::phrase::parse_phrase;

/// Ordered-list counters by nesting depth, carried from one parse call to the
/// next so that `#_` can continue a list that was interrupted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListState {
    counters: BTreeMap<usize, u64>,
}

impl ListState {
    pub fn new() -> Self {
        ListState::default()
    }

    /// Number the next item at `depth` would get.
    pub fn counter(&self, depth: usize) -> Option<u64> {
        self.counters.get(&depth).copied()
    }
}

/// One open list while building: the container, the item that is still
/// receiving content, and how many attribute groups were seen on its items.
struct Level {
    list: Element,
    item: Element,
    attr_count: usize,
}

fn pad(depth: usize) -> String {
    format!("\n{}", "\t".repeat(depth))
}

/// Split the block into item sources, one per line that starts with a list
/// marker; other lines continue the previous item.
fn split_items(src: &str) -> Vec<&str> {
    let re_head = compile("^[:txlisthd2:]");
    let mut items = Vec::new();
    let mut start = 0;
    let mut offset = 0;
    for line in src.split_inclusive('\n') {
        if offset > 0 && re_head.is_match(line) {
            items.push(&src[start..offset - 1]);
            start = offset;
        }
        offset += line.len();
    }
    items.push(&src[start..]);
    items
}

/// With a single attribute group on the first item only, the attributes
/// belong to the list rather than to that item.
fn hoist_item_attributes(level: &mut Level) {
    if level.attr_count != 1 {
        return;
    }
    let first = level
        .list
        .children
        .iter_mut()
        .filter_map(Node::as_element_mut)
        .find(|element| element.tag == "li");
    if let Some(first) = first
        && !first.attributes.is_empty()
    {
        let attributes = std::mem::take(&mut first.attributes);
        level.list.attributes.merge(&attributes);
    }
}

fn close_level(stack: &mut Vec<Level>) -> Option<Element> {
    let mut level = stack.pop()?;
    let indent = pad(stack.len());
    level.list.push(Node::from(level.item));
    level.list.push(Node::text(indent.clone()));
    level.item = Element::new("li");
    hoist_item_attributes(&mut level);
    match stack.last_mut() {
        Some(parent) => {
            parent.item.push(Node::text(indent));
            parent.item.push(Node::from(level.list));
            None
        }
        None => Some(level.list),
    }
}

/// The `start` attribute text for `#N` and the counter value it sets. A number
/// too large to count from is kept as written and pins the counter at the
/// maximum.
fn start_number(digits: &str) -> (String, u64) {
    match digits.parse::<u64>() {
        Ok(number) => (number.to_string(), number),
        Err(_) => (digits.trim_start_matches('0').to_string(), u64::MAX),
    }
}

/// Parse a list block. `state` supplies the counters for `#_` and receives the
/// counters this block ends with. With `continued`, an ordered list opened by
/// the first item also picks up numbering from `state`.
pub fn parse_list(
    src: &str,
    state: &mut ListState,
    continued: bool,
    options: &Options,
) -> Option<Element> {
    let re_start = compile(r"^(_|\d+)");
    let re_control = compile(r"^\.\s*$");

    let mut stack: Vec<Level> = Vec::new();
    let mut current: BTreeMap<usize, u64> = BTreeMap::new();
    let mut pending_start: Option<(String, u64)> = None;
    let mut list_attributes: Option<Attributes> = None;
    let mut done = None;

    for (index, item) in split_items(src).into_iter().enumerate() {
        let item = item.trim_start_matches([' ', '\t']);
        let depth = item
            .find(|c| c != '#' && c != '*')
            .unwrap_or(item.len());
        if depth == 0 {
            continue;
        }
        let kind = if item[..depth].ends_with('#') { "ol" } else { "ul" };
        let mut body = &item[depth..];

        if let Some(m) = re_start.find(body) {
            pending_start = Some(match m.as_str() {
                "_" => {
                    let number = state
                        .counter(depth)
                        .or_else(|| current.get(&depth).copied())
                        .unwrap_or(1);
                    (number.to_string(), number)
                }
                digits => start_number(digits),
            });
            body = &body[m.end()..];
        }

        let mut item_attributes = None;
        if let Some((len, attrs)) = parse_attr(body, AttrContext::ListItem, None) {
            body = &body[len..];
            item_attributes = Some(attrs);
        }

        if re_control.is_match(body) {
            list_attributes = Some(item_attributes.unwrap_or_default());
            continue;
        }

        if continued && index == 0 && kind == "ol" && pending_start.is_none() {
            pending_start = state.counter(depth).map(|number| (number.to_string(), number));
        }

        let mut fresh_item = false;
        while stack.len() < depth {
            let level_depth = stack.len() + 1;
            stack.push(Level {
                list: Element::new(kind).with_text(pad(level_depth)),
                item: Element::new("li"),
                attr_count: 0,
            });
            current.insert(level_depth, 1);
            fresh_item = true;
        }
        while stack.len() > depth {
            if let Some(list) = close_level(&mut stack) {
                done = Some(list);
            }
        }

        let Some(level) = stack.last_mut() else {
            continue;
        };
        if let Some((text, number)) = pending_start.take() {
            level.list.attributes.insert("start", text);
            current.insert(depth, number);
        }
        if let Some(attrs) = list_attributes.take() {
            // an explicit list attribute line disables hoisting
            level.attr_count = 9;
            level.list.attributes.merge(&attrs);
        }
        if !fresh_item {
            let finished = std::mem::replace(&mut level.item, Element::new("li"));
            level.list.push(Node::from(finished));
            level.list.push(Node::text(pad(depth)));
        }
        if let Some(attrs) = item_attributes {
            level.item.attributes.merge(&attrs);
            level.attr_count += 1;
        }
        level.item.extend(parse_phrase(body.trim(), options));
        let counter = current.entry(depth).or_insert(0);
        *counter = counter.saturating_add(1);
    }

    for (depth, counter) in current {
        state.counters.insert(depth, counter);
    }

    while !stack.is_empty() {
        if let Some(list) = close_level(&mut stack) {
            done = Some(list);
        }
    }
    done
}
