//! Request and session handle tokens.
//!
//! Tokens end up as the last element of portal object paths, so they are
//! restricted to `[A-Za-z0-9_]`. Uniqueness comes from a process-wide
//! counter; the random suffix only keeps tokens from being guessable
//! across processes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared by every generator so two clients in one process never collide.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(0);

/// Opaque handle token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(String);

impl Token {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Token {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for Token {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

/// Produces `{prefix}_{counter}_{random}` tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenGenerator;

impl TokenGenerator {
	pub fn new() -> Self {
		Self
	}

	pub fn generate(&self, prefix: &str) -> Token {
		let counter = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
		let suffix: u32 = rand::random();
		Token(format!("{}_{counter}_{suffix:08x}", sanitize_prefix(prefix)))
	}
}

fn sanitize_prefix(prefix: &str) -> String {
	if prefix.is_empty() {
		return "t".to_string();
	}
	prefix
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use portal_protocol::is_valid_path_element;
	use std::collections::HashSet;

	#[test]
	fn tokens_are_unique_across_thousands() {
		let generator = TokenGenerator::new();
		let tokens: HashSet<Token> = (0..5000).map(|_| generator.generate("pie_portal")).collect();
		assert_eq!(tokens.len(), 5000);
	}

	#[test]
	fn tokens_are_unique_across_generators() {
		let a = TokenGenerator::new();
		let b = TokenGenerator::new();
		let tokens: HashSet<Token> = (0..1000)
			.flat_map(|_| [a.generate("x"), b.generate("x")])
			.collect();
		assert_eq!(tokens.len(), 2000);
	}

	#[test]
	fn tokens_are_valid_path_elements() {
		let generator = TokenGenerator::new();
		for prefix in ["pie_portal", "with-dash", "dotted.name", "", "ünï"] {
			let token = generator.generate(prefix);
			assert!(is_valid_path_element(token.as_str()), "invalid token {token}");
		}
	}

	#[test]
	fn prefix_is_preserved_when_valid() {
		let token = TokenGenerator::new().generate("session");
		assert!(token.as_str().starts_with("session_"));
	}
}
