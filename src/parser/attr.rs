//! The attribute shorthand shared by blocks, phrases, images, links, list
//! items and table parts: `{style}`, `[lang]`, `(class#id)`, padding parens,
//! alignment marks, and the table-cell extras.

use crate::ast::Attributes;
use crate::patterns::compile;

/// What the attribute shorthand is attached to. Decides which parts of the
/// grammar are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrContext {
    /// Named blocks, tables and row groups.
    Block,
    /// `td` / `th`: block rules plus vertical alignment and spans.
    Cell,
    /// `tr`: vertical alignment only.
    Row,
    Image,
    ListItem,
    Anchor,
    /// `col` / `colgroup`.
    Column,
    /// Captions and inline phrases.
    Phrase,
}

impl AttrContext {
    fn is_block(self) -> bool {
        matches!(self, AttrContext::Block | AttrContext::Cell)
    }

    /// Contexts whose content must not be swallowed by a class or lang match.
    fn guards_content(self) -> bool {
        matches!(
            self,
            AttrContext::Row | AttrContext::ListItem | AttrContext::Phrase
        )
    }

    fn allows_padding(self) -> bool {
        self.is_block() || self == AttrContext::ListItem
    }

    fn allows_align(self) -> bool {
        self.allows_padding() || self == AttrContext::Image
    }

    fn allows_valign(self) -> bool {
        matches!(self, AttrContext::Cell | AttrContext::Row)
    }
}

fn horizontal_align(mark: &str) -> &'static str {
    match mark {
        "<" => "left",
        "=" => "center",
        ">" => "right",
        _ => "justify",
    }
}

fn set_style(styles: &mut Vec<(String, String)>, key: &str, value: String) {
    if let Some(entry) = styles.iter_mut().find(|(k, _)| k == key) {
        entry.1 = value;
    } else {
        styles.push((key.to_string(), value));
    }
}

fn vertical_align(mark: &str) -> &'static str {
    match mark {
        "^" => "top",
        "-" => "middle",
        _ => "bottom",
    }
}

/// Parse the attribute shorthand at the start of `input`.
///
/// Returns how many bytes were consumed together with the attributes, or
/// `None` when nothing was consumed. `end_token` is the closing marker of the
/// phrase being parsed, if any: a class or language group directly followed
/// by it is content, not attributes.
pub fn parse_attr(
    input: &str,
    context: AttrContext,
    end_token: Option<&str>,
) -> Option<(usize, Attributes)> {
    if input.is_empty() {
        return None;
    }

    let re_styles = compile(r"^\{([^}]*)\}");
    let re_lang = compile(r"^\[([^\[\]\n]+)\]");
    let re_classid = compile(r"^\(([^()\n]+)\)");
    let re_padding_left = compile(r"^\(+");
    let re_padding_right = compile(r"^\)+");
    let re_align = if context == AttrContext::Image {
        compile(r"^(?:<|>|=)")
    } else {
        compile(r"^(?:<>|<|>|=)")
    };
    let re_valign = compile(r"^[~^-]");
    let re_colspan = compile(r"^\\(\d+)");
    let re_rowspan = compile(r"^/(\d+)");
    let re_css = compile(r"^\s*([^:\s]+)\s*:\s*(.+?)\s*$");

    let mut attrs = Attributes::new();
    let mut styles: Vec<(String, String)> = Vec::new();
    let mut rest = input;

    loop {
        if let Some(caps) = re_styles.captures(rest) {
            for declaration in caps[1].split(';') {
                if let Some(css) = re_css.captures(declaration) {
                    set_style(&mut styles, &css[1], css[2].to_string());
                }
            }
            rest = &rest[caps[0].len()..];
            continue;
        }

        if let Some(caps) = re_lang.captures(rest) {
            let after = &rest[caps[0].len()..];
            if (after.is_empty() && context.guards_content())
                || end_token.is_some_and(|token| after.starts_with(token))
            {
                break;
            }
            attrs.insert("lang", &caps[1]);
            rest = after;
            continue;
        }

        if let Some(caps) = re_classid.captures(rest) {
            let after = &rest[caps[0].len()..];
            if (after.is_empty() && context.guards_content())
                || end_token.is_some_and(|token| after.starts_with(' ') || after.starts_with(token))
            {
                break;
            }
            let mut bits = caps[1].split('#');
            if let Some(class) = bits.next().filter(|c| !c.is_empty()) {
                attrs.insert("class", class);
            }
            if let Some(id) = bits.next().filter(|i| !i.is_empty()) {
                attrs.insert("id", id);
            }
            rest = after;
            continue;
        }

        if context.allows_padding() {
            if let Some(m) = re_padding_left.find(rest) {
                set_style(&mut styles, "padding-left", format!("{}em", m.len()));
                rest = &rest[m.end()..];
                continue;
            }
            if let Some(m) = re_padding_right.find(rest) {
                set_style(&mut styles, "padding-right", format!("{}em", m.len()));
                rest = &rest[m.end()..];
                continue;
            }
        }

        if context.allows_align()
            && let Some(m) = re_align.find(rest)
        {
            let align = horizontal_align(m.as_str());
            if context == AttrContext::Image {
                attrs.insert("align", align);
            } else {
                set_style(&mut styles, "text-align", align.to_string());
            }
            rest = &rest[m.end()..];
            continue;
        }

        if context.allows_valign()
            && let Some(m) = re_valign.find(rest)
        {
            set_style(
                &mut styles,
                "vertical-align",
                vertical_align(m.as_str()).to_string(),
            );
            rest = &rest[m.end()..];
            continue;
        }

        if context == AttrContext::Cell {
            if let Some(caps) = re_colspan.captures(rest) {
                attrs.insert("colspan", &caps[1]);
                rest = &rest[caps[0].len()..];
                continue;
            }
            if let Some(caps) = re_rowspan.captures(rest) {
                attrs.insert("rowspan", &caps[1]);
                rest = &rest[caps[0].len()..];
                continue;
            }
        }

        break;
    }

    if rest.len() == input.len() {
        return None;
    }

    if !styles.is_empty() {
        let style = styles
            .iter()
            .map(|(key, value)| format!("{key}:{value}"))
            .collect::<Vec<_>>()
            .join(";");
        let mut merged = Attributes::new();
        merged.insert("style", style);
        merged.merge(&attrs);
        attrs = merged;
    }

    Some((input.len() - rest.len(), attrs))
}
