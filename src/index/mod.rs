pub mod package;
pub mod parser;

pub use package::{from_binary_paragraph, from_source_paragraph, Package};
pub use parser::{parse_paragraphs, Paragraph};
