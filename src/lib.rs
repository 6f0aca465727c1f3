/// A Textile markup parser producing a JsonML-style node tree and HTML
pub mod ast;
pub mod cursor;
pub mod error;
pub mod options;
pub mod parser;
pub mod patterns;
pub mod renderer;

pub use ast::{Attributes, Document, Element, Node};
pub use error::{Error, Result};
pub use options::Options;
pub use parser::{ListState, Parser};
pub use renderer::HtmlRenderer;

/// Parse Textile text into a node tree with default options
pub fn parse(text: &str) -> Document {
    Parser::default().parse(text)
}

/// Parse Textile text and render to HTML
pub fn textile_to_html(text: &str) -> String {
    Parser::default().html(text)
}

/// Render a node tree to HTML
pub fn render(nodes: &[Node]) -> String {
    renderer::render(nodes)
}
