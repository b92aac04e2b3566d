//! Application constants

/// Chain id the wallet is expected to be on, as a hex chain id string.
/// Overridable at build time via the `CHAIN_ID` environment variable;
/// defaults to Ethereum mainnet.
pub const EXPECTED_CHAIN_ID: &str = match option_env!("CHAIN_ID") {
    Some(chain_id) => chain_id,
    None => "0x1",
};

/// How long provider detection waits for a late `ethereum#initialized`
/// injection before concluding no wallet is installed.
pub const DETECT_TIMEOUT_MS: u32 = 3000;

/// Chrome Web Store listing opened by the install prompt.
pub const METAMASK_INSTALL_URL: &str =
    "https://chrome.google.com/webstore/detail/metamask/nkbihfbeogaeaoehlefnkodbefgpgknn?hl=en";
