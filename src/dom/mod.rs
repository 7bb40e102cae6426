//! Listing extraction
//!
//! History pages are read by evaluating `extract_listing.js` in the session tab.
//! The script is a function expression; the selectors are passed to it as a
//! JSON literal and it returns the page as a JSON string.

pub mod listing;

pub use listing::{ListingItem, ListingPage, ListingSelectors};

use crate::browser::BrowserSession;
use crate::error::{Result, WrapupError};

/// Build the expression that runs the extraction script with `selectors`
pub fn listing_script(selectors: &ListingSelectors) -> Result<String> {
    let js_code = include_str!("extract_listing.js");
    let config = serde_json::to_string(selectors)?;
    Ok(format!("{}({})", js_code.trim_end(), config))
}

/// Extract the history listing currently rendered in the session tab
pub fn extract_listing(session: &BrowserSession, selectors: &ListingSelectors) -> Result<ListingPage> {
    let value = session.evaluate(&listing_script(selectors)?)?;

    // The script returns a JSON string, so parse it as a string first
    let json_str: String = serde_json::from_value(value)
        .map_err(|e| WrapupError::ScrapeFailed(format!("Listing script returned no JSON string: {}", e)))?;

    serde_json::from_str(&json_str)
        .map_err(|e| WrapupError::ScrapeFailed(format!("Failed to parse listing JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_script_embeds_selectors() {
        let script = listing_script(&ListingSelectors::default()).unwrap();

        assert!(script.starts_with("(function (cfg)"));
        assert!(script.ends_with(")"));
        assert!(script.contains(r#""item":".cp-batch-actions-list-item""#));
    }
}
