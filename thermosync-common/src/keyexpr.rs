use crate::error::{Error, Result};

/// Default key expression prefix for all thermosync traffic.
pub const KEY_PREFIX: &str = "thermosync";

/// Builder for the key expressions of one bridge.
///
/// Key expressions follow the pattern:
/// `<prefix>/<field>` for telemetry and `<prefix>/@/status` for bridge status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyExprBuilder {
    prefix: String,
}

impl KeyExprBuilder {
    /// Create a builder rooted at `prefix`.
    ///
    /// Fails if the prefix is not a plain, wildcard-free key expression.
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        Ok(Self { prefix })
    }

    /// The prefix this builder was created with.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build the key expression for a single field.
    ///
    /// # Example
    /// ```
    /// use thermosync_common::keyexpr::KeyExprBuilder;
    ///
    /// let builder = KeyExprBuilder::new("thermosync/anna").unwrap();
    /// assert_eq!(builder.field("temperature"), "thermosync/anna/temperature");
    /// ```
    pub fn field(&self, field: &str) -> String {
        format!("{}/{}", self.prefix, field)
    }

    /// Wildcard matching every field below the prefix.
    ///
    /// # Example
    /// ```
    /// use thermosync_common::keyexpr::KeyExprBuilder;
    ///
    /// let builder = KeyExprBuilder::new("thermosync/anna").unwrap();
    /// assert_eq!(builder.wildcard(), "thermosync/anna/**");
    /// ```
    pub fn wildcard(&self) -> String {
        format!("{}/**", self.prefix)
    }

    /// Build the key expression for bridge status.
    ///
    /// # Example
    /// ```
    /// use thermosync_common::keyexpr::KeyExprBuilder;
    ///
    /// let builder = KeyExprBuilder::new("thermosync/anna").unwrap();
    /// assert_eq!(builder.status_key(), "thermosync/anna/@/status");
    /// ```
    pub fn status_key(&self) -> String {
        format!("{}/@/status", self.prefix)
    }

    /// Recover the field name from a key expression built by [`field`](Self::field).
    ///
    /// Returns `None` for keys outside this prefix or below the `@` admin space.
    pub fn parse_field<'a>(&self, key: &'a str) -> Option<&'a str> {
        let rest = key.strip_prefix(&self.prefix)?.strip_prefix('/')?;
        if rest.is_empty() || rest.starts_with('@') {
            return None;
        }
        Some(rest)
    }
}

/// Check that a prefix can be used as the root of concrete key expressions.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(Error::KeyExpr("prefix cannot be empty".to_string()));
    }
    if prefix.starts_with('/') || prefix.ends_with('/') {
        return Err(Error::KeyExpr(format!(
            "prefix '{}' must not start or end with '/'",
            prefix
        )));
    }
    if prefix.split('/').any(|chunk| chunk.is_empty()) {
        return Err(Error::KeyExpr(format!(
            "prefix '{}' contains an empty chunk",
            prefix
        )));
    }
    if prefix.contains(['*', '$', '?', '#']) {
        return Err(Error::KeyExpr(format!(
            "prefix '{}' must not contain wildcards or reserved characters",
            prefix
        )));
    }
    Ok(())
}

/// Build a wildcard key expression for all thermosync traffic.
///
/// # Example
/// ```
/// use thermosync_common::keyexpr::all_traffic_wildcard;
///
/// assert_eq!(all_traffic_wildcard(), "thermosync/**");
/// ```
pub fn all_traffic_wildcard() -> String {
    format!("{}/**", KEY_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_builder() {
        let builder = KeyExprBuilder::new("thermosync/anna").unwrap();

        assert_eq!(builder.field("setpoint"), "thermosync/anna/setpoint");
        assert_eq!(builder.wildcard(), "thermosync/anna/**");
        assert_eq!(builder.status_key(), "thermosync/anna/@/status");
    }

    #[test]
    fn test_parse_field() {
        let builder = KeyExprBuilder::new("thermosync/anna").unwrap();

        assert_eq!(
            builder.parse_field("thermosync/anna/setpoint"),
            Some("setpoint")
        );
        assert_eq!(builder.parse_field("thermosync/anna/@/status"), None);
        assert_eq!(builder.parse_field("thermosync/annabis/setpoint"), None);
        assert_eq!(builder.parse_field("thermosync/anna"), None);
    }

    #[test]
    fn test_invalid_prefixes() {
        assert!(KeyExprBuilder::new("").is_err());
        assert!(KeyExprBuilder::new("thermosync/").is_err());
        assert!(KeyExprBuilder::new("/thermosync").is_err());
        assert!(KeyExprBuilder::new("thermosync//anna").is_err());
        assert!(KeyExprBuilder::new("thermosync/*").is_err());
        assert!(KeyExprBuilder::new("thermosync/**").is_err());
    }

    #[test]
    fn test_all_traffic_wildcard() {
        assert_eq!(all_traffic_wildcard(), "thermosync/**");
    }
}
