//! Escaping and validation for values that end up inside SOQL or URLs.
//!
//! All caller-provided values placed in a SOQL string literal go through
//! [`soql::escape_string`]; identifiers are checked with
//! [`soql::is_safe_field_name`] / [`soql::is_safe_field_path`] instead of
//! being escaped.
//!
//! ```rust
//! use sf_toolkit_client::security::soql;
//!
//! let name = soql::escape_string("O'Brien");
//! let query = format!("SELECT Id FROM Contact WHERE LastName = '{}'", name);
//! assert_eq!(query, "SELECT Id FROM Contact WHERE LastName = 'O\\'Brien'");
//! ```

/// SOQL escaping utilities for injection prevention.
pub mod soql {
    /// Escape a string for use inside a single-quoted SOQL literal.
    ///
    /// Backslash, both quote characters and the control characters
    /// `\n \r \t \b \f` are backslash-escaped.
    ///
    /// ```rust
    /// use sf_toolkit_client::security::soql;
    ///
    /// assert_eq!(soql::escape_string("O'Brien & Co."), "O\\'Brien & Co.");
    /// assert_eq!(soql::escape_string("say \"hi\""), "say \\\"hi\\\"");
    /// ```
    #[must_use]
    pub fn escape_string(value: &str) -> String {
        let mut escaped = String::with_capacity(value.len() + 16);
        for ch in value.chars() {
            match ch {
                '\\' => escaped.push_str("\\\\"),
                '\'' => escaped.push_str("\\'"),
                '"' => escaped.push_str("\\\""),
                '\n' => escaped.push_str("\\n"),
                '\r' => escaped.push_str("\\r"),
                '\t' => escaped.push_str("\\t"),
                '\u{0008}' => escaped.push_str("\\b"),
                '\u{000C}' => escaped.push_str("\\f"),
                _ => escaped.push(ch),
            }
        }
        escaped
    }

    /// Escape a value for a LIKE pattern, including the `%` and `_` wildcards.
    ///
    /// ```rust
    /// use sf_toolkit_client::security::soql;
    ///
    /// assert_eq!(soql::escape_like("50%_off"), "50\\%\\_off");
    /// ```
    #[must_use]
    pub fn escape_like(value: &str) -> String {
        let base = escape_string(value);
        let mut escaped = String::with_capacity(base.len() + 8);
        for ch in base.chars() {
            match ch {
                '%' => escaped.push_str("\\%"),
                '_' => escaped.push_str("\\_"),
                _ => escaped.push(ch),
            }
        }
        escaped
    }

    /// A bare API name: starts with a letter, then letters, digits or `_`.
    ///
    /// ```rust
    /// use sf_toolkit_client::security::soql;
    ///
    /// assert!(soql::is_safe_field_name("Custom_Field__c"));
    /// assert!(!soql::is_safe_field_name("Name'; DELETE"));
    /// ```
    #[must_use]
    pub fn is_safe_field_name(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() => {
                chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
            }
            _ => false,
        }
    }

    /// A dotted relationship path such as `Owner.Manager.Name`.
    #[must_use]
    pub fn is_safe_field_path(path: &str) -> bool {
        path.split('.').all(is_safe_field_name)
    }

    /// SObject names follow the same rules as field names.
    #[must_use]
    pub fn is_safe_sobject_name(name: &str) -> bool {
        is_safe_field_name(name)
    }
}

/// URL encoding utilities for parameter safety.
pub mod url {
    /// Percent-encode a value used as a URL path segment or parameter.
    #[must_use]
    pub fn encode_param(value: &str) -> String {
        urlencoding::encode(value).into_owned()
    }

    /// Salesforce IDs are 15 or 18 ASCII alphanumerics.
    ///
    /// ```rust
    /// use sf_toolkit_client::security::url;
    ///
    /// assert!(url::is_valid_salesforce_id("001000000000001AAA"));
    /// assert!(!url::is_valid_salesforce_id("001/../../etc"));
    /// ```
    #[must_use]
    pub fn is_valid_salesforce_id(id: &str) -> bool {
        let len = id.len();
        (len == 15 || len == 18) && id.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

#[cfg(test)]
mod tests {
    use super::soql::*;
    use super::url::*;

    #[test]
    fn test_escape_string_injection_attempts() {
        assert_eq!(escape_string("' OR '1'='1"), "\\' OR \\'1\\'=\\'1");
        assert_eq!(
            escape_string("'; DELETE FROM Account--"),
            "\\'; DELETE FROM Account--"
        );
    }

    #[test]
    fn test_escape_string_control_chars() {
        assert_eq!(escape_string("a\\b"), "a\\\\b");
        assert_eq!(escape_string("line1\nline2\r"), "line1\\nline2\\r");
        assert_eq!(escape_string("tab\there"), "tab\\there");
        assert_eq!(escape_string("\u{0008}\u{000C}"), "\\b\\f");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("O'Brien_"), "O\\'Brien\\_");
    }

    #[test]
    fn test_field_names_and_paths() {
        assert!(is_safe_field_name("Id"));
        assert!(is_safe_field_name("Account__r"));
        assert!(!is_safe_field_name(""));
        assert!(!is_safe_field_name("1Name"));
        assert!(!is_safe_field_name("Owner.Name"));

        assert!(is_safe_field_path("Owner.Name"));
        assert!(is_safe_field_path("Parent__r.Owner.Email"));
        assert!(!is_safe_field_path("Owner..Name"));
        assert!(!is_safe_field_path("Owner.Name)"));
    }

    #[test]
    fn test_ids_and_encoding() {
        assert!(is_valid_salesforce_id("001000000000001"));
        assert!(!is_valid_salesforce_id("short"));
        assert_eq!(encode_param("path/traversal"), "path%2Ftraversal");
    }
}
