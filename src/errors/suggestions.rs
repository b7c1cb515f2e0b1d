//! "Did you mean?" suggestions using fuzzy string matching
//!
//! Uses Jaro-Winkler similarity to recover from typos in action
//! selectors and setting keys.

use strsim::jaro_winkler;

/// Default similarity threshold for suggestions (0.0 to 1.0)
const DEFAULT_THRESHOLD: f64 = 0.6;

/// Find the most similar string from a list of candidates
///
/// Returns the best match if it exceeds the threshold, or None otherwise.
pub fn find_similar<'a>(input: &str, candidates: &[&'a str], threshold: f64) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (jaro_winkler(input, c), *c))
        .filter(|(score, _)| *score > threshold)
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, name)| name)
}

/// Generate a suggestion for an unknown action selector
pub fn suggest_action(unknown: &str, actions: &[&str]) -> String {
    if let Some(suggestion) = find_similar(&unknown.to_lowercase(), actions, DEFAULT_THRESHOLD) {
        format!(
            "Did you mean 'meshroute {}'?\n\nAvailable actions: {}",
            suggestion,
            actions.join(", ")
        )
    } else {
        format!("Available actions: {}", actions.join(", "))
    }
}

/// Generate a suggestion for an unknown setting key
pub fn suggest_setting(unknown: &str, keys: &[&str]) -> String {
    if let Some(suggestion) = find_similar(unknown, keys, DEFAULT_THRESHOLD) {
        format!("Did you mean '{}'?", suggestion)
    } else {
        format!("Known settings: {}", keys.join(", "))
    }
}
