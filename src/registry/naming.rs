//! Naming rules for clients and tools (spec §3, §6).
//!
//! Client names are ASCII, contain no hyphens, no spaces, and do not start
//! with a digit. Prefixed tool names are exactly `"<clientName>-<mcpToolName>"`.
//! Sanitized names substitute hyphens with underscores for identifier-safe
//! use inside the code-mode sandbox and must remain non-empty and contain
//! neither `/` nor `..`.

use crate::error::ValidationError;

/// Validate a client name per spec §3/§6.
pub fn validate_client_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::InvalidClientName(
            name.to_string(),
            "must not be empty",
        ));
    }
    if !name.is_ascii() {
        return Err(ValidationError::InvalidClientName(
            name.to_string(),
            "must be ASCII",
        ));
    }
    if name.contains('-') {
        return Err(ValidationError::InvalidClientName(
            name.to_string(),
            "must not contain hyphens",
        ));
    }
    if name.contains(' ') {
        return Err(ValidationError::InvalidClientName(
            name.to_string(),
            "must not contain spaces",
        ));
    }
    if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidClientName(
            name.to_string(),
            "must not start with a digit",
        ));
    }
    Ok(())
}

/// Build the canonical prefixed tool name `"<clientName>-<mcpToolName>"`.
pub fn prefixed_name(client_name: &str, mcp_tool_name: &str) -> String {
    format!("{client_name}-{mcp_tool_name}")
}

/// Strip the client-name prefix from a prefixed tool name, if present.
///
/// Used by the policy layer to match tool names "after stripping the
/// client-name prefix" (spec §4.4) and by the executor to recover the
/// original MCP tool name before remapping through `nameMapping`.
pub fn strip_client_prefix<'a>(client_name: &str, prefixed: &'a str) -> Option<&'a str> {
    let prefix = format!("{client_name}-");
    prefixed.strip_prefix(&prefix)
}

/// Sanitize a prefixed tool name for identifier-safe use (hyphens -> underscores).
///
/// Must remain non-empty and must not contain `/` or `..` (spec §3 invariant,
/// §6 naming rules, §8 sandbox safety property).
pub fn sanitize_tool_name(prefixed: &str) -> Result<String, ValidationError> {
    let sanitized = prefixed.replace('-', "_");
    validate_sanitized(&sanitized, prefixed)?;
    Ok(sanitized)
}

/// Sanitize an arbitrary path component (client or tool name) used inside
/// the code-mode virtual file system, rejecting traversal characters.
pub fn sanitize_path_component(raw: &str) -> Result<String, ValidationError> {
    let sanitized = raw.replace('-', "_");
    validate_sanitized(&sanitized, raw)?;
    Ok(sanitized)
}

fn validate_sanitized(sanitized: &str, original: &str) -> Result<(), ValidationError> {
    if sanitized.is_empty() {
        return Err(ValidationError::InvalidToolName(
            original.to_string(),
            "sanitized name must not be empty",
        ));
    }
    if sanitized.contains('/') {
        return Err(ValidationError::InvalidToolName(
            original.to_string(),
            "sanitized name must not contain '/'",
        ));
    }
    if sanitized.contains("..") {
        return Err(ValidationError::InvalidToolName(
            original.to_string(),
            "sanitized name must not contain '..'",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_hyphenated_client_names() {
        assert!(validate_client_name("my-client").is_err());
    }

    #[test]
    fn rejects_leading_digit() {
        assert!(validate_client_name("9lives").is_err());
    }

    #[test]
    fn rejects_spaces_and_non_ascii() {
        assert!(validate_client_name("my client").is_err());
        assert!(validate_client_name("caf\u{e9}").is_err());
    }

    #[test]
    fn accepts_plain_ascii_name() {
        assert!(validate_client_name("calculator").is_ok());
        assert!(validate_client_name("client2").is_ok());
    }

    #[test]
    fn prefixed_name_and_strip_roundtrip() {
        let p = prefixed_name("calculator", "add");
        assert_eq!(p, "calculator-add");
        assert_eq!(strip_client_prefix("calculator", &p), Some("add"));
        assert_eq!(strip_client_prefix("other", &p), None);
    }

    #[test]
    fn sanitize_replaces_hyphens() {
        let sanitized = sanitize_tool_name("calculator-add").unwrap();
        assert_eq!(sanitized, "calculator_add");
    }

    #[test]
    fn sanitize_rejects_traversal() {
        assert!(sanitize_path_component("../etc").is_err());
        assert!(sanitize_path_component("a/b").is_err());
    }
}
