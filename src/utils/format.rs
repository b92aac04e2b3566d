//! Display formatting helpers

/// Shorten a wallet address for display (first 5 and last 5 characters).
/// Anything too short to shorten renders as empty.
pub fn shorten_address(address: &str) -> String {
    if address.len() > 5 {
        format!("{}...{}", &address[..5], &address[address.len() - 5..])
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortens_long_addresses() {
        assert_eq!(
            shorten_address("0x71C7656EC7ab88b098defB751B7401B5f6d8976F"),
            "0x71C...8976F"
        );
    }

    #[test]
    fn short_strings_render_empty() {
        assert_eq!(shorten_address("0xA"), "");
        assert_eq!(shorten_address(""), "");
    }
}
