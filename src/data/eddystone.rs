//! Eddystone URL frame encoding.
//!
//! The configuration service can make the device broadcast an Eddystone URL
//! frame. URLs are compressed with the Eddystone scheme prefix and expansion
//! tables. Writing a zero-length value turns the frame off.

use crate::error::{Error, Result};

/// URL scheme prefixes, indexed by their wire code.
const SCHEMES: [&str; 4] = ["http://www.", "https://www.", "http://", "https://"];

/// Expansion codes, indexed by their wire code. Entries with a trailing
/// slash come first so they win over the bare domain suffix.
const EXPANSIONS: [&str; 14] = [
    ".com/", ".org/", ".edu/", ".net/", ".info/", ".biz/", ".gov/", ".com", ".org", ".edu",
    ".net", ".info", ".biz", ".gov",
];

/// Maximum length of the encoded URL after the scheme byte.
pub const MAX_ENCODED_URL_LEN: usize = 17;

/// State of the Eddystone URL broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UrlFrame {
    /// The frame is switched off (zero-length value).
    Disabled,
    /// The device broadcasts this URL.
    Url(String),
}

impl UrlFrame {
    /// Check if the frame is switched off.
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }

    /// The broadcast URL, if enabled.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Disabled => None,
            Self::Url(url) => Some(url),
        }
    }

    /// Parse from bytes. Unknown scheme or reserved bytes yield `None`.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let Some((&scheme, encoded)) = data.split_first() else {
            return Some(Self::Disabled);
        };

        let mut url = SCHEMES.get(usize::from(scheme))?.to_string();
        for &byte in encoded {
            match byte {
                0x00..=0x0d => url.push_str(EXPANSIONS[usize::from(byte)]),
                0x21..=0x7e => url.push(char::from(byte)),
                _ => return None,
            }
        }

        Some(Self::Url(url))
    }

    /// Encode to bytes. A disabled frame encodes to an empty buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Disabled => Ok(Vec::new()),
            Self::Url(url) => encode_url(url),
        }
    }
}

/// Compress a URL into an Eddystone URL frame body.
pub fn encode_url(url: &str) -> Result<Vec<u8>> {
    // Longest prefix wins: "https://www." before "https://".
    let (scheme, rest) = SCHEMES
        .iter()
        .enumerate()
        .filter(|(_, prefix)| url.starts_with(**prefix))
        .max_by_key(|(_, prefix)| prefix.len())
        .map(|(code, prefix)| (code as u8, &url[prefix.len()..]))
        .ok_or_else(|| Error::InvalidUrl {
            reason: format!("unsupported scheme in {:?}", url),
        })?;

    if rest.is_empty() {
        return Err(Error::InvalidUrl {
            reason: "missing host".to_string(),
        });
    }

    let mut encoded = vec![scheme];
    let mut remaining = rest;
    while !remaining.is_empty() {
        if let Some((code, expansion)) = EXPANSIONS
            .iter()
            .enumerate()
            .find(|(_, expansion)| remaining.starts_with(**expansion))
        {
            encoded.push(code as u8);
            remaining = &remaining[expansion.len()..];
            continue;
        }

        let byte = remaining.as_bytes()[0];
        if !(0x21..=0x7e).contains(&byte) {
            return Err(Error::InvalidUrl {
                reason: format!("unsupported character {:?}", remaining.chars().next()),
            });
        }
        encoded.push(byte);
        remaining = &remaining[1..];
    }

    if encoded.len() - 1 > MAX_ENCODED_URL_LEN {
        return Err(Error::InvalidUrl {
            reason: format!(
                "encodes to {} bytes (max {})",
                encoded.len() - 1,
                MAX_ENCODED_URL_LEN
            ),
        });
    }

    Ok(encoded)
}
