use super::parser::Paragraph;

/// A single archive file referenced by an index paragraph: a `.deb` from a
/// `Packages` file, or one of the `.dsc`/`.tar.*` files making up a source
/// package from a `Sources` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
	pub filename: String,
	pub size: u64,
	/// Set once all paragraphs referencing this path have been seen and
	/// this is the highest-versioned one; unused until multi-version
	/// pruning is implemented, mirrors the upstream field so callers have
	/// somewhere to record it.
	pub latest: bool,
}

impl Package {
	fn new(filename: String, size: u64) -> Self { Package { filename, size, latest: false } }
}

/// Binary paragraphs carry `Filename` and `Size` directly.
pub fn from_binary_paragraph(paragraph: &Paragraph) -> Option<Package> {
	let filename = paragraph.get("Filename")?.to_string();
	let size = paragraph.get("Size")?.parse().ok()?;
	Some(Package::new(filename, size))
}

/// Source paragraphs list their files in `Directory` + a multi-line `Files`
/// field of `checksum size name` triples, one real archive file per line.
pub fn from_source_paragraph(paragraph: &Paragraph) -> Vec<Package> {
	let Some(directory) = paragraph.get("Directory") else {
		return Vec::new();
	};
	let Some(files) = paragraph.get("Files") else {
		return Vec::new();
	};

	files
		.lines()
		.filter_map(|line| {
			let mut parts = line.split_whitespace();
			let _checksum = parts.next()?;
			let size: u64 = parts.next()?.parse().ok()?;
			let name = parts.next()?;
			Some(Package::new(format!("{directory}/{name}"), size))
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::index::parser::parse_paragraphs;

	#[test]
	fn extracts_binary_package() {
		let paragraphs = parse_paragraphs("Filename: pool/main/a.deb\nSize: 123\n");
		let pkg = from_binary_paragraph(&paragraphs[0]).unwrap();
		assert_eq!(pkg.filename, "pool/main/a.deb");
		assert_eq!(pkg.size, 123);
	}

	#[test]
	fn expands_source_files_into_one_package_per_file() {
		let paragraphs = parse_paragraphs(
			"Directory: pool/main/a\nFiles:\n abc 10 a_1.dsc\n def 20 a_1.tar.xz\n",
		);
		let packages = from_source_paragraph(&paragraphs[0]);
		assert_eq!(packages.len(), 2);
		assert_eq!(packages[0].filename, "pool/main/a/a_1.dsc");
		assert_eq!(packages[1].size, 20);
	}

	#[test]
	fn missing_required_fields_yield_nothing() {
		let paragraphs = parse_paragraphs("Size: 1\n");
		assert!(from_binary_paragraph(&paragraphs[0]).is_none());
		assert!(from_source_paragraph(&paragraphs[0]).is_empty());
	}
}
