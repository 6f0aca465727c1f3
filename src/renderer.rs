/// HTML renderer for the Textile node tree
use crate::ast::{Element, Node};

pub struct HtmlRenderer;

impl HtmlRenderer {
    pub fn new() -> Self {
        HtmlRenderer
    }

    pub fn render(&self, node: &Node) -> String {
        let mut out = String::new();
        render_node(&mut out, node);
        out
    }

    pub fn render_document(&self, nodes: &[Node]) -> String {
        let mut out = String::new();
        for node in nodes {
            render_node(&mut out, node);
        }
        out
    }
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a node sequence to an HTML string.
pub fn render(nodes: &[Node]) -> String {
    HtmlRenderer::new().render_document(nodes)
}

fn render_node(out: &mut String, node: &Node) {
    match node {
        Node::Text(text) => out.push_str(&escape_html(text, false)),
        Node::Element(element) => render_element(out, element),
    }
}

fn render_element(out: &mut String, element: &Element) {
    if element.tag == "!" {
        out.push_str("<!--");
        for child in &element.children {
            if let Node::Text(text) = child {
                out.push_str(&escape_html(text, false));
            }
        }
        out.push_str("-->");
        return;
    }

    out.push('<');
    out.push_str(&element.tag);
    for (name, value) in element.attributes.iter() {
        out.push(' ');
        out.push_str(name);
        if let Some(value) = value {
            out.push_str("=\"");
            out.push_str(&escape_html(value, true));
            out.push('"');
        }
    }

    // namespaced tags without content are written self-closing too
    if element.is_void() || (element.tag.contains(':') && element.children.is_empty()) {
        out.push_str(" />");
        return;
    }
    out.push('>');
    for child in &element.children {
        render_node(out, child);
    }
    out.push_str("</");
    out.push_str(&element.tag);
    out.push('>');
}

/// Length of the entity reference at the start of `text`, if there is one:
/// `&#NN;`, `&#xHH;` or `&name;`.
fn entity_len(text: &str) -> Option<usize> {
    let body = text.strip_prefix('&')?;
    let end = body.find(';')?;
    let name = &body[..end];
    let valid = if let Some(hex) = name.strip_prefix("#x") {
        hex.len() >= 2 && hex.chars().all(|c| c.is_ascii_hexdigit())
    } else if let Some(digits) = name.strip_prefix('#') {
        digits.len() >= 2 && digits.chars().all(|c| c.is_ascii_digit())
    } else {
        let mut chars = name.chars();
        chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && (2..=7).contains(&name.len())
            && chars.all(|c| c.is_ascii_alphabetic() || ('1'..='4').contains(&c))
    };
    valid.then_some(end + 2)
}

/// Escape text for HTML output. Existing entity references are left alone;
/// `quotes` also escapes both quote characters, for attribute values.
fn escape_html(text: &str, quotes: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (index, c) in text.char_indices() {
        match c {
            '&' if entity_len(&text[index..]).is_none() => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if quotes => out.push_str("&quot;"),
            '\'' if quotes => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Attributes;
    use rstest::rstest;

    #[rstest]
    #[case("a & b", "a &amp; b")]
    #[case("&amp; &#39; &#x2F; &copy;", "&amp; &#39; &#x2F; &copy;")]
    #[case("&#1; &x;", "&amp;#1; &amp;x;")]
    #[case("<b>", "&lt;b&gt;")]
    #[case("\"quoted\" 'text'", "\"quoted\" 'text'")]
    fn escapes_text(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(render(&[Node::text(text)]), expected);
    }

    #[test]
    fn quotes_only_escaped_in_attributes() {
        assert_eq!(render(&[Node::text("<script>&\"'")]), "&lt;script&gt;&amp;\"'");
        let element = Element::new("span").with_attr("title", "&\"'");
        assert_eq!(render(&[element.into()]), "<span title=\"&amp;&quot;&#39;\"></span>");
    }

    #[test]
    fn escapes_attribute_quotes() {
        let element = Element::new("a").with_attr("title", "say \"hi\" & 'bye'");
        assert_eq!(
            HtmlRenderer::new().render(&element.into()),
            "<a title=\"say &quot;hi&quot; &amp; &#39;bye&#39;\"></a>"
        );
    }

    #[test]
    fn void_and_namespaced_elements() {
        assert_eq!(render(&[Element::new("br").into()]), "<br />");
        assert_eq!(render(&[Element::new("o:p").into()]), "<o:p />");
        assert_eq!(
            render(&[Element::new("o:p").with_text("x").into()]),
            "<o:p>x</o:p>"
        );
    }

    #[test]
    fn valueless_attributes_and_comments() {
        let mut attributes = Attributes::new();
        attributes.set("checked", None);
        attributes.insert("type", "checkbox");
        let input = Element::new("input").with_attributes(attributes);
        assert_eq!(render(&[input.into()]), "<input checked type=\"checkbox\" />");
        assert_eq!(render(&[Element::new("!").with_text(" a < b ").into()]), "<!-- a &lt; b -->");
    }

    #[test]
    fn nested_elements() {
        let p = Element::new("p")
            .with_text("a ")
            .with_children([Node::from(Element::new("strong").with_text("b"))]);
        assert_eq!(render(&[p.into()]), "<p>a <strong>b</strong></p>");
    }
}
