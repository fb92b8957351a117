use std::collections::HashSet;

use thiserror::Error;

use crate::encoding::{self, UnencodableChar};

/// Why a line of the subscription file was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedLine {
	#[error("section header is missing its closing bracket")]
	UnterminatedHeader,
	#[error("section header has an empty name")]
	EmptySectionName,
	#[error("section '{0}' appears more than once")]
	DuplicateSection(String),
	#[error("property has an empty key")]
	EmptyKey,
	#[error("key '{key}' appears more than once in section '{section}'")]
	DuplicateKey { section: String, key: String },
	#[error("line is neither a section header, a property nor a comment")]
	Unrecognized,
}

/// A malformed line together with its 1-based line number.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct ParseError {
	pub line: usize,
	#[source]
	pub reason: MalformedLine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
	/// Blank lines and comments, kept byte for byte.
	Verbatim(String),
	Property { key: String, raw: String },
}

impl Line {
	fn raw(&self) -> &str {
		match self {
			Self::Verbatim(raw) | Self::Property { raw, .. } => raw,
		}
	}

	fn raw_mut(&mut self) -> &mut String {
		match self {
			Self::Verbatim(raw) | Self::Property { raw, .. } => raw,
		}
	}
}

/// A named group of properties. Every line of the section, including blank
/// lines and comments, is kept exactly as it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
	name: String,
	/// `None` only for the unnamed section holding lines before the first header.
	header: Option<String>,
	lines: Vec<Line>,
}

impl Section {
	fn new(name: String, header: Option<String>) -> Self {
		Self {
			name,
			header,
			lines: Vec::new(),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Keys in file order.
	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.lines.iter().filter_map(|line| match line {
			Line::Property { key, .. } => Some(key.as_str()),
			Line::Verbatim(_) => None,
		})
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.position(key).is_some()
	}

	/// Removes the line holding `key`. Returns whether the key existed.
	pub fn remove_key(&mut self, key: &str) -> bool {
		let Some(index) = self.position(key) else {
			return false;
		};

		let removed = self.lines.remove(index);

		// The removed line was the last one in the file and had no terminator,
		// keep the file ending the way it did.
		if !removed.raw().ends_with('\n') {
			if let Some(previous) = self.lines.last_mut() {
				let trimmed = strip_terminator(previous.raw()).len();
				previous.raw_mut().truncate(trimmed);
			} else if let Some(header) = self.header.as_mut() {
				let trimmed = strip_terminator(header).len();
				header.truncate(trimmed);
			}
		}

		true
	}

	fn position(&self, key: &str) -> Option<usize> {
		self.lines
			.iter()
			.position(|line| matches!(line, Line::Property { key: k, .. } if k == key))
	}

	fn write_into(&self, out: &mut String) {
		if let Some(header) = &self.header {
			out.push_str(header);
		}
		for line in &self.lines {
			out.push_str(line.raw());
		}
	}
}

/// The parsed subscription state file.
///
/// Sections and keys keep their file order. Serializing an unmodified document
/// yields the exact text it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionDocument {
	global: Section,
	sections: Vec<Section>,
}

impl Default for SubscriptionDocument {
	fn default() -> Self {
		Self {
			global: Section::new(String::new(), None),
			sections: Vec::new(),
		}
	}
}

impl SubscriptionDocument {
	/// Parses raw file bytes using the single-byte encoding.
	pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
		Self::parse_str(&encoding::decode(bytes))
	}

	pub fn parse_str(text: &str) -> Result<Self, ParseError> {
		let mut doc = Self::default();
		let mut seen_sections = HashSet::new();
		let mut seen_keys = HashSet::new();

		for (index, raw) in text.split_inclusive('\n').enumerate() {
			let fail = |reason| ParseError {
				line: index + 1,
				reason,
			};

			let content = strip_terminator(raw).trim();

			if content.is_empty() || content.starts_with(';') || content.starts_with('#') {
				doc.current_mut().lines.push(Line::Verbatim(raw.to_string()));
				continue;
			}

			// Folder names may start with a bracket (`[Gmail]/Spam=1`), only a
			// line bracketed at both ends is a header.
			if let Some(header) = content
				.strip_prefix('[')
				.and_then(|header| header.strip_suffix(']'))
			{
				let name = header.trim();
				if name.is_empty() {
					return Err(fail(MalformedLine::EmptySectionName));
				}
				if !seen_sections.insert(name.to_string()) {
					return Err(fail(MalformedLine::DuplicateSection(name.to_string())));
				}

				seen_keys.clear();
				doc.sections
					.push(Section::new(name.to_string(), Some(raw.to_string())));
				continue;
			}

			let Some((key, _)) = content.split_once('=') else {
				return Err(fail(if content.starts_with('[') {
					MalformedLine::UnterminatedHeader
				} else {
					MalformedLine::Unrecognized
				}));
			};
			let key = key.trim();
			if key.is_empty() {
				return Err(fail(MalformedLine::EmptyKey));
			}
			if !seen_keys.insert(key.to_string()) {
				return Err(fail(MalformedLine::DuplicateKey {
					section: doc.current_mut().name.clone(),
					key: key.to_string(),
				}));
			}

			doc.current_mut().lines.push(Line::Property {
				key: key.to_string(),
				raw: raw.to_string(),
			});
		}

		Ok(doc)
	}

	fn current_mut(&mut self) -> &mut Section {
		self.sections.last_mut().unwrap_or(&mut self.global)
	}

	/// Named sections in file order.
	pub fn sections(&self) -> impl Iterator<Item = &Section> {
		self.sections.iter()
	}

	pub fn section(&self, name: &str) -> Option<&Section> {
		self.sections.iter().find(|section| section.name == name)
	}

	pub fn section_mut(&mut self, name: &str) -> Option<&mut Section> {
		self.sections.iter_mut().find(|section| section.name == name)
	}

	pub fn to_text(&self) -> String {
		let mut out = String::new();
		self.global.write_into(&mut out);
		for section in &self.sections {
			section.write_into(&mut out);
		}
		out
	}

	pub fn to_bytes(&self) -> Result<Vec<u8>, UnencodableChar> {
		encoding::encode(&self.to_text())
	}
}

fn strip_terminator(raw: &str) -> &str {
	let raw = raw.strip_suffix('\n').unwrap_or(raw);
	raw.strip_suffix('\r').unwrap_or(raw)
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE: &str = "; written by the mail client\r\n\
		[General]\r\n\
		Version=3\r\n\
		Spacing = loose\r\n\
		\r\n\
		[IMAPSubscribed]\r\n\
		Inbox=1\r\n\
		Spam=1\r\n\
		Archive/2019=1\r\n\
		\r\n\
		[Other]\r\n\
		key=value=with=equals\r\n";

	#[test]
	fn unmodified_document_is_identical() {
		let doc = SubscriptionDocument::parse_str(SAMPLE).unwrap();
		assert_eq!(doc.to_text(), SAMPLE);
	}

	#[test]
	fn sections_and_keys_keep_file_order() {
		let doc = SubscriptionDocument::parse_str(SAMPLE).unwrap();

		let names = doc.sections().map(Section::name).collect::<Vec<_>>();
		assert_eq!(names, ["General", "IMAPSubscribed", "Other"]);

		let keys = doc
			.section("IMAPSubscribed")
			.unwrap()
			.keys()
			.collect::<Vec<_>>();
		assert_eq!(keys, ["Inbox", "Spam", "Archive/2019"]);
	}

	#[test]
	fn removing_a_key_touches_only_its_line() {
		let mut doc = SubscriptionDocument::parse_str(SAMPLE).unwrap();

		assert!(doc.section_mut("IMAPSubscribed").unwrap().remove_key("Spam"));
		assert!(!doc.section_mut("IMAPSubscribed").unwrap().remove_key("Spam"));

		assert_eq!(doc.to_text(), SAMPLE.replace("Spam=1\r\n", ""));
	}

	#[test]
	fn key_lookup_is_exact() {
		let mut doc = SubscriptionDocument::parse_str(SAMPLE).unwrap();
		let section = doc.section_mut("IMAPSubscribed").unwrap();
		assert!(!section.contains_key("spam"));
		assert!(!section.remove_key("spam"));
		assert!(section.contains_key("Spam"));
	}

	#[test]
	fn removing_the_unterminated_last_line_keeps_no_trailing_newline() {
		let mut doc = SubscriptionDocument::parse_str("[IMAPSubscribed]\nInbox=1\nSpam=1").unwrap();
		doc.section_mut("IMAPSubscribed").unwrap().remove_key("Spam");
		assert_eq!(doc.to_text(), "[IMAPSubscribed]\nInbox=1");
	}

	#[test]
	fn properties_before_first_header_go_to_global_section() {
		let doc = SubscriptionDocument::parse_str("Loose=1\n[IMAPSubscribed]\nInbox=1\n").unwrap();
		assert_eq!(doc.global.keys().collect::<Vec<_>>(), ["Loose"]);
		assert!(!doc.section("IMAPSubscribed").unwrap().contains_key("Loose"));
	}

	#[test]
	fn malformed_lines_are_reported_with_line_number() {
		let cases = [
			("[IMAPSubscribed\n", 1, MalformedLine::UnterminatedHeader),
			("[ ]\n", 1, MalformedLine::EmptySectionName),
			("[A]\nx=1\n[A]\n", 3, MalformedLine::DuplicateSection("A".into())),
			("[A]\n=1\n", 2, MalformedLine::EmptyKey),
			(
				"[A]\nx=1\nx=2\n",
				3,
				MalformedLine::DuplicateKey {
					section: "A".into(),
					key: "x".into(),
				},
			),
			("[A]\njust words\n", 2, MalformedLine::Unrecognized),
			("[A]\n[Gmail]/Spam\n", 2, MalformedLine::UnterminatedHeader),
		];

		for (text, line, reason) in cases {
			let err = SubscriptionDocument::parse_str(text).unwrap_err();
			assert_eq!(err, ParseError { line, reason }, "input: {text:?}");
		}
	}

	#[test]
	fn bracketed_folder_names_are_properties() {
		let text = "[IMAPSubscribed]\r\n[Gmail]/All Mail=1\r\n[Gmail]/Spam = 1\r\nInbox=1\r\n";
		let mut doc = SubscriptionDocument::parse_str(text).unwrap();

		assert_eq!(doc.sections().count(), 1);
		let section = doc.section_mut("IMAPSubscribed").unwrap();
		assert_eq!(
			section.keys().collect::<Vec<_>>(),
			["[Gmail]/All Mail", "[Gmail]/Spam", "Inbox"]
		);

		assert!(section.remove_key("[Gmail]/Spam"));
		assert_eq!(
			doc.to_text(),
			"[IMAPSubscribed]\r\n[Gmail]/All Mail=1\r\nInbox=1\r\n"
		);
	}

	#[test]
	fn same_key_in_different_sections_is_fine() {
		let doc = SubscriptionDocument::parse_str("[A]\nx=1\n[B]\nx=1\n").unwrap();
		assert!(doc.section("A").unwrap().contains_key("x"));
		assert!(doc.section("B").unwrap().contains_key("x"));
	}

	#[test]
	fn empty_file_is_an_empty_document() {
		let doc = SubscriptionDocument::parse(b"").unwrap();
		assert_eq!(doc.sections().count(), 0);
		assert!(doc.to_bytes().unwrap().is_empty());
	}
}
