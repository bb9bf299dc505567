//! Header merge helpers shared by the normalizer and the CORS policy.

use http::{HeaderMap, HeaderName, HeaderValue};

/// Upper-case each token and join with `", "`.
pub fn join_upper<I, S>(tokens: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens
        .into_iter()
        .map(|t| t.as_ref().to_ascii_uppercase())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Insert `value` unless the header is already present (first writer wins).
pub fn set_if_absent(headers: &mut HeaderMap, name: HeaderName, value: HeaderValue) {
    headers.entry(name).or_insert(value);
}

/// Append comma-joined `tokens` after any value already present.
///
/// Multiple existing values are folded into one before appending. Existing
/// values are kept byte for byte, including non-UTF-8 ones.
pub fn append_list<S: AsRef<str>>(headers: &mut HeaderMap, name: HeaderName, tokens: &[S]) {
    if tokens.is_empty() {
        return;
    }
    let mut joined: Vec<u8> = Vec::new();
    let existing = headers.get_all(&name).iter().map(HeaderValue::as_bytes);
    for part in existing.chain(tokens.iter().map(|t| t.as_ref().as_bytes())) {
        if !joined.is_empty() {
            joined.extend_from_slice(b", ");
        }
        joined.extend_from_slice(part);
    }

    match HeaderValue::from_bytes(&joined) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(e) => tracing::warn!(header = %name, error = %e, "dropping unrepresentable header list"),
    }
}
