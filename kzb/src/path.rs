//! Escaped slash-separated paths.
//!
//! Names inside a container may contain `/`. In a full path, a literal `/`
//! is written as `//`; a single `/` separates components.
//!
//! ```
//! use kzb::path::{escape_name, PathTokens};
//!
//! let path = format!("Objects/{}", escape_name("a/b"));
//! assert_eq!(path, "Objects/a//b");
//! assert_eq!(PathTokens::new(&path).collect::<Vec<_>>(), vec!["Objects", "a/b"]);
//! ```

/// Path component separator.
pub const SEPARATOR: char = '/';

/// Escape a single name for use as a path component.
pub fn escape_name(name: &str) -> String {
    name.replace('/', "//")
}

/// Iterator over the decoded components of an escaped path.
///
/// A `/` is a separator unless it is immediately followed by another `/`, in
/// which case the pair decodes to one literal `/`. A trailing separator yields
/// a final empty component, and the empty path yields one empty component.
#[derive(Debug, Clone)]
pub struct PathTokens<'a> {
    rest: Option<&'a str>,
}

impl<'a> PathTokens<'a> {
    pub fn new(path: &'a str) -> Self {
        Self { rest: Some(path) }
    }
}

impl Iterator for PathTokens<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let rest = self.rest?;
        let bytes = rest.as_bytes();
        let mut token = String::new();
        let mut start = 0;
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] != b'/' {
                i += 1;
                continue;
            }
            if bytes.get(i + 1) == Some(&b'/') {
                token.push_str(&rest[start..=i]);
                i += 2;
                start = i;
            } else {
                token.push_str(&rest[start..i]);
                self.rest = Some(&rest[i + 1..]);
                return Some(token);
            }
        }

        token.push_str(&rest[start..]);
        self.rest = None;
        Some(token)
    }
}

/// Number of components in an escaped path.
pub fn path_element_count(path: &str) -> usize {
    PathTokens::new(path).count()
}

/// Split an escaped path into its folder components and its last component.
pub(crate) fn split_path(path: &str) -> (Vec<String>, String) {
    let mut tokens: Vec<String> = PathTokens::new(path).collect();
    let last = tokens.pop().unwrap_or_default();
    (tokens, last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(path: &str) -> Vec<String> {
        PathTokens::new(path).collect()
    }

    #[test]
    fn test_plain_path() {
        assert_eq!(tokens("Objects/Box/Mesh"), vec!["Objects", "Box", "Mesh"]);
        assert_eq!(path_element_count("Objects/Box/Mesh"), 3);
    }

    #[test]
    fn test_trailing_separator_yields_empty_component() {
        assert_eq!(tokens("Objects/"), vec!["Objects", ""]);
        assert_eq!(tokens(""), vec![""]);
        assert_eq!(path_element_count(""), 1);
    }

    #[test]
    fn test_escaped_slash_stays_in_component() {
        assert_eq!(tokens("a//b"), vec!["a/b"]);
        assert_eq!(tokens("x/a//b/y"), vec!["x", "a/b", "y"]);
        assert_eq!(path_element_count("a//b"), 1);
    }

    #[test]
    fn test_escaped_pair_is_consumed_greedily() {
        assert_eq!(tokens("a///b"), vec!["a/", "b"]);
    }

    #[test]
    fn test_escape_name() {
        assert_eq!(escape_name("a/b"), "a//b");
        assert_eq!(escape_name("plain"), "plain");
    }

    #[test]
    fn test_split_path() {
        let (folders, last) = split_path("Objects/Sub/File");
        assert_eq!(folders, vec!["Objects", "Sub"]);
        assert_eq!(last, "File");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        // Names starting with '/' are ambiguous after a separator; containers
        // never produce them.
        fn name() -> impl Strategy<Value = String> {
            "[a-zA-Z0-9 ._-][a-zA-Z0-9 ._/-]{0,10}"
        }

        proptest! {
            #[test]
            fn test_escape_roundtrip_property(names in prop::collection::vec(name(), 1..6)) {
                let path = names
                    .iter()
                    .map(|n| escape_name(n))
                    .collect::<Vec<_>>()
                    .join("/");
                let decoded: Vec<String> = PathTokens::new(&path).collect();
                prop_assert_eq!(decoded, names);
            }
        }
    }
}
