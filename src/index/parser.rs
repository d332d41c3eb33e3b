use std::collections::HashMap;

/// Fields retained from a single paragraph of a `Packages` or `Sources`
/// index file. Everything else (Description, Depends, Maintainer, ...) is
/// dropped immediately -- this tool only needs enough to know which
/// archive files the paragraph references.
const RETAINED_KEYS: [&str; 7] =
	["Filename", "MD5sum", "SHA1", "SHA256", "Size", "Files", "Directory"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
	fields: HashMap<String, String>,
}

impl Paragraph {
	pub fn get(&self, key: &str) -> Option<&str> { self.fields.get(key).map(String::as_str) }

	pub fn is_empty(&self) -> bool { self.fields.is_empty() }
}

/// Parse the paragraph-per-record format shared by `Packages` and `Sources`
/// index files: paragraphs are separated by a blank line, each field starts
/// a new `Key: value` line, and a line beginning with whitespace is a
/// continuation of the previous field's value (used by multi-line fields
/// like `Files` and `Description`).
pub fn parse_paragraphs(contents: &str) -> Vec<Paragraph> {
	let mut paragraphs = Vec::new();
	let mut current = Paragraph::default();
	let mut last_key: Option<String> = None;

	for line in contents.lines() {
		if line.trim().is_empty() {
			if !current.is_empty() {
				paragraphs.push(std::mem::take(&mut current));
			}
			last_key = None;
			continue;
		}

		if line.starts_with([' ', '\t']) {
			if let Some(ref key) = last_key {
				if let Some(value) = current.fields.get_mut(key) {
					value.push('\n');
					value.push_str(line.trim_start());
				}
			}
			continue;
		}

		let Some((key, value)) = line.split_once(':') else {
			continue;
		};
		let key = key.trim();
		if RETAINED_KEYS.contains(&key) {
			current.fields.insert(key.to_string(), value.trim().to_string());
			last_key = Some(key.to_string());
		} else {
			// Still track the key so continuation lines of unretained
			// fields (e.g. Description) don't get misattributed.
			last_key = Some(key.to_string());
		}
	}

	if !current.is_empty() {
		paragraphs.push(current);
	}

	paragraphs
}

#[cfg(test)]
mod tests {
	use super::parse_paragraphs;

	#[test]
	fn splits_on_blank_lines() {
		let text = "Package: a\nFilename: pool/a.deb\nSize: 10\n\nPackage: b\nFilename: pool/b.deb\nSize: 20\n";
		let paragraphs = parse_paragraphs(text);
		assert_eq!(paragraphs.len(), 2);
		assert_eq!(paragraphs[0].get("Filename"), Some("pool/a.deb"));
		assert_eq!(paragraphs[1].get("Size"), Some("20"));
	}

	#[test]
	fn drops_unretained_fields() {
		let text = "Package: a\nDescription: something\n forgettable\nFilename: pool/a.deb\n";
		let paragraphs = parse_paragraphs(text);
		assert_eq!(paragraphs.len(), 1);
		assert_eq!(paragraphs[0].get("Package"), None);
		assert_eq!(paragraphs[0].get("Description"), None);
		assert_eq!(paragraphs[0].get("Filename"), Some("pool/a.deb"));
	}

	#[test]
	fn continuation_lines_append_to_retained_field() {
		let text = "Package: a\nFiles:\n abc123 10 main/a.dsc\n def456 20 main/a.tar.xz\n";
		let paragraphs = parse_paragraphs(text);
		assert_eq!(paragraphs.len(), 1);
		assert_eq!(
			paragraphs[0].get("Files"),
			Some("\nabc123 10 main/a.dsc\ndef456 20 main/a.tar.xz")
		);
	}

	#[test]
	fn trailing_paragraph_without_final_blank_line_is_kept() {
		let text = "Filename: pool/a.deb\nSize: 1\n";
		assert_eq!(parse_paragraphs(text).len(), 1);
	}
}
