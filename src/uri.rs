use std::sync::OnceLock;

use regex::Regex;

fn scheme_and_port() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://|:[0-9]+(/|$)").unwrap())
}

/// Strip the URI down to the host-and-path form used as a mirror directory
/// layout: the scheme prefix and any explicit port are removed, everything
/// else is kept verbatim.
///
/// `sanitize("http://example.com:8080/debian")` -> `"example.com/debian"`.
pub fn sanitize(uri: &str) -> String { scheme_and_port().replace_all(uri, "$1").into_owned() }

#[cfg(test)]
mod tests {
	use super::sanitize;

	#[test]
	fn strips_scheme_and_port() {
		assert_eq!(sanitize("http://example.com:8080/debian"), "example.com/debian");
		assert_eq!(sanitize("https://deb.example.org/ubuntu"), "deb.example.org/ubuntu");
	}

	#[test]
	fn is_idempotent() {
		let once = sanitize("http://example.com:8080/debian");
		assert_eq!(sanitize(&once), once);
	}

	#[test]
	fn leaves_bare_host_paths_untouched() {
		assert_eq!(sanitize("example.com/debian"), "example.com/debian");
	}
}
