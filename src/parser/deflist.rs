//! Definition lists: `- term := definition`.

use crate::ast::{Element, NodeList};
use crate::options::Options;
use crate::patterns::compile;

use super::FlowParser;
use super::phrase::parse_phrase;

/// One `terms := definition` group.
struct Item<'a> {
    terms: &'a str,
    definition: Definition<'a>,
    len: usize,
}

enum Definition<'a> {
    /// `:=` on the same line, up to the next term or blank line.
    Inline(&'a str),
    /// `:=` ending the line, closed by `=:`; parsed as blocks.
    Block(&'a str),
}

fn match_item(src: &str) -> Option<Item<'_>> {
    if !src.starts_with("- ") {
        return None;
    }
    let separator = src.find(":=")?;
    let terms = &src[..separator];
    if separator < 3 || terms.contains("\n\n") {
        return None;
    }

    let rest = &src[separator + 2..];
    // without a closing `=:` the body is read as an inline definition
    if let Some(open) = compile(r"^ *\r?\n").find(rest)
        && let Some(close) = compile(r"=:[ \t]*(?:\r?\n|$)").find(&rest[open.end()..])
    {
        let body = &rest[open.end()..];
        return Some(Item {
            terms,
            definition: Definition::Block(&body[..close.start()]),
            len: separator + 2 + open.end() + close.end(),
        });
    }

    // inline: stop at a newline that starts a blank line or a new term
    let mut end = rest.len();
    let mut len = rest.len();
    for (index, _) in rest.match_indices('\n') {
        let after = &rest[index + 1..];
        if after.starts_with('\n') || after.starts_with("- ") {
            end = index;
            len = index + 1;
            break;
        }
    }
    if rest[..end].trim().is_empty() {
        return None;
    }
    Some(Item {
        terms,
        definition: Definition::Inline(&rest[..end]),
        len: separator + 2 + len,
    })
}

/// Parse a run of definition list items at the start of `src`. Returns the
/// consumed length and the `dl` element, or `None` if no item matches.
pub fn parse_deflist(
    src: &str,
    flow: &mut dyn FlowParser,
    options: &Options,
) -> Option<(usize, Element)> {
    let mut children = NodeList::new();
    children.add_text("\n");
    let mut pos = 0;

    while let Some(item) = match_item(&src[pos..]) {
        let terms = format!("\n{}", item.terms);
        for term in terms.split("\n- ").skip(1) {
            children
                .add_text("\t")
                .add(Element::new("dt").with_children(parse_phrase(term.trim(), options)))
                .add_text("\n");
        }

        let definition = match item.definition {
            Definition::Inline(text) => parse_phrase(text.trim(), options),
            Definition::Block(text) => flow.parse_flow(text.trim()),
        };
        children
            .add_text("\t")
            .add(Element::new("dd").with_children(definition))
            .add_text("\n");
        pos += item.len;
    }

    if pos == 0 {
        return None;
    }
    log::debug!("definition list of {pos} bytes");
    Some((
        pos,
        Element::new("dl").with_children(children.into_nodes()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Wraps block content in a marker element so tests can see it was
    /// routed through the flow parser.
    struct MarkFlow;

    impl FlowParser for MarkFlow {
        fn parse_flow(&mut self, src: &str) -> Vec<Node> {
            vec![Node::from(Element::new("flow").with_text(src))]
        }
    }

    fn ml(src: &str) -> Option<(usize, serde_json::Value)> {
        parse_deflist(src, &mut MarkFlow, &Options::default())
            .map(|(len, dl)| (len, Node::from(dl).to_jsonml()))
    }

    #[test]
    fn inline_definitions() {
        let src = "- coffee := Hot\n- tea := Cold";
        assert_eq!(
            ml(src),
            Some((
                src.len(),
                json!(["dl",
                    "\n\t", ["dt", "coffee"], "\n\t", ["dd", "Hot"],
                    "\n\t", ["dt", "tea"], "\n\t", ["dd", "Cold"],
                    "\n"])
            ))
        );
    }

    #[test]
    fn several_terms_share_a_definition() {
        let (_, dl) = ml("- cat\n- feline := animal").unwrap();
        assert_eq!(
            dl,
            json!(["dl", "\n\t", ["dt", "cat"], "\n\t", ["dt", "feline"], "\n\t", ["dd", "animal"], "\n"])
        );
    }

    #[test]
    fn block_definition_goes_through_flow() {
        let src = "- term :=\np. one\n\np. two\n=:\nafter";
        let (len, dl) = ml(src).unwrap();
        assert_eq!(&src[len..], "after");
        assert_eq!(
            dl,
            json!(["dl", "\n\t", ["dt", "term"], "\n\t", ["dd", ["flow", "p. one\n\np. two"]], "\n"])
        );
    }

    #[test]
    fn unclosed_block_definition_is_inline() {
        let src = "- term :=\ndefinition here";
        assert_eq!(
            ml(src),
            Some((
                src.len(),
                json!(["dl", "\n\t", ["dt", "term"], "\n\t", ["dd", "definition here"], "\n"])
            ))
        );
    }

    #[test]
    fn empty_definition_is_not_an_item() {
        assert_eq!(ml("- term :=\n\nnext"), None);
    }

    #[test]
    fn stops_at_blank_line() {
        let src = "- a := b\n\nnext";
        let (len, _) = ml(src).unwrap();
        assert_eq!(&src[len..], "\nnext");
    }

    #[test]
    fn needs_separator() {
        assert_eq!(ml("- just a dash"), None);
        assert_eq!(ml("no dash := here"), None);
    }
}
