//! Identifier validation for dynamic query construction.
//!
//! Table, collection, key-prefix, and channel names come from configuration
//! and are interpolated into query strings (DuckDB and Postgres have no
//! parameter binding for identifiers), so they must pass a strict allow-list
//! check before any query text is built.

/// Maximum accepted identifier length. Matches the Postgres NAMEDATALEN
/// limit, the tightest of the supported backends.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Validates a dynamic identifier (table, collection, channel segment).
///
/// Accepts `[A-Za-z_][A-Za-z0-9_]*` up to [`MAX_IDENTIFIER_LEN`] bytes.
/// Anything else — whitespace, quoting, `;`, unicode — is rejected before
/// a query is issued.
pub fn validate_identifier(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(crate::Error::InvalidIdentifier(
            name.to_string(),
            "identifier is empty",
        ));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(crate::Error::InvalidIdentifier(
            name.to_string(),
            "identifier too long",
        ));
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap();
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(crate::Error::InvalidIdentifier(
            name.to_string(),
            "identifier must start with a letter or underscore",
        ));
    }
    if chars.any(|c| !(c.is_ascii_alphanumeric() || c == '_')) {
        return Err(crate::Error::InvalidIdentifier(
            name.to_string(),
            "identifier contains a disallowed character",
        ));
    }
    Ok(())
}
