use crate::types::Author;

/// Returns the address notices for `author` should go to.
///
/// A public profile email is used verbatim. Otherwise the lowercased login
/// is combined with `fallback_domain`. Returns `None` only when the login is
/// empty.
pub fn resolve_recipient(author: &Author, fallback_domain: &str) -> Option<String> {
    if let Some(email) = author.email.as_deref().filter(|email| !email.is_empty()) {
        return Some(email.to_string());
    }

    let login = author.login.trim();
    if login.is_empty() {
        return None;
    }

    Some(format!("{}@{}", login.to_lowercase(), fallback_domain))
}
