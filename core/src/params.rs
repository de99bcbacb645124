//! Form/query parameter assembly with the service's bracketed key convention.
//!
//! Request bodies are form-encoded key/value pairs where each field is scoped
//! to its resource: `tournament[name]`, `participant[seed]`, and
//! `participants[][name]` for bulk arrays. Optional fields are omitted when
//! absent; boolean fields are always sent as the literal strings `"true"` or
//! `"false"` (a wire contract, never a native boolean and never omitted).

/// Ordered list of wire key/value pairs for a query string or form body.
#[derive(Debug, Clone, Default)]
pub struct ParamList {
    pairs: Vec<(String, String)>,
}

impl ParamList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key/value pair unconditionally.
    pub fn push(&mut self, key: &str, value: impl ToString) {
        self.pairs.push((key.to_string(), value.to_string()));
    }

    /// Append the pair only when a value is present.
    pub fn opt(&mut self, key: &str, value: Option<impl ToString>) {
        if let Some(value) = value {
            self.push(key, value);
        }
    }

    /// Append a boolean as the literal `"true"` or `"false"`, always.
    pub fn flag(&mut self, key: &str, value: bool) {
        self.push(key, if value { "true" } else { "false" });
    }

    /// Append one pair per value under the same (repeated) key. Used for the
    /// `resource[][field]` bulk-array convention.
    pub fn many(&mut self, key: &str, values: &[impl ToString]) {
        for value in values {
            self.push(key, value.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opt_omits_absent_values() {
        let mut params = ParamList::new();
        params.opt("tournament[name]", Some("cup"));
        params.opt("tournament[description]", None::<&str>);
        assert_eq!(
            params.into_pairs(),
            vec![("tournament[name]".to_string(), "cup".to_string())]
        );
    }

    #[test]
    fn flag_is_always_a_string_literal() {
        let mut params = ParamList::new();
        params.flag("tournament[open_signup]", true);
        params.flag("tournament[private]", false);
        assert_eq!(
            params.into_pairs(),
            vec![
                ("tournament[open_signup]".to_string(), "true".to_string()),
                ("tournament[private]".to_string(), "false".to_string()),
            ]
        );
    }

    #[test]
    fn many_repeats_the_key() {
        let mut params = ParamList::new();
        params.many("participants[][name]", &["a", "b"]);
        let pairs = params.into_pairs();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, "participants[][name]");
        assert_eq!(pairs[1].0, "participants[][name]");
        assert_eq!(pairs[1].1, "b");
    }

    #[test]
    fn numeric_values_stringify() {
        let mut params = ParamList::new();
        params.opt("tournament[signup_cap]", Some(16u32));
        params.opt("tournament[pts_for_match_win]", Some(1.5f64));
        let pairs = params.into_pairs();
        assert_eq!(pairs[0].1, "16");
        assert_eq!(pairs[1].1, "1.5");
    }
}
