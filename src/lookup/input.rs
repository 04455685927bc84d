//! Turning raw message text into a GitHub identifier.

use reqwest::Url;

use crate::error::LookupError;

/// Host marker that makes a message count as a profile URL.
pub const PROFILE_HOST: &str = "github.com";

/// True when the text looks like a GitHub profile URL.
pub fn is_profile_url(text: &str) -> bool {
    text.contains(PROFILE_HOST)
}

/// Pull the account name out of a profile URL.
///
/// `https://github.com/alice/repo` → `alice`. A missing scheme is tolerated.
pub fn extract_username(url: &str) -> Result<String, LookupError> {
    let url = url.trim();
    let parsed = Url::parse(url)
        .or_else(|_| Url::parse(&format!("https://{url}")))
        .map_err(|e| LookupError::InvalidInput(format!("{url}: {e}")))?;

    // path always starts with '/', so the identifier is the second piece
    let username = parsed.path().split('/').nth(1).unwrap_or_default();
    if username.is_empty() {
        return Err(LookupError::InvalidInput(format!(
            "{url}: no account in URL path"
        )));
    }
    Ok(username.to_string())
}

/// Reduce message text to the identifier to look up.
pub fn normalize(text: &str) -> Result<String, LookupError> {
    let text = text.trim();
    let identifier = if is_profile_url(text) {
        extract_username(text)?
    } else {
        text.to_string()
    };
    validate_identifier(&identifier)?;
    Ok(identifier)
}

/// Identifiers end up in URL paths, so only account-name characters pass.
fn validate_identifier(identifier: &str) -> Result<(), LookupError> {
    if identifier.is_empty() {
        return Err(LookupError::InvalidInput("empty identifier".into()));
    }
    if let Some(bad) = identifier
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(LookupError::InvalidInput(format!(
            "{identifier:?} contains {bad:?}"
        )));
    }
    Ok(())
}
