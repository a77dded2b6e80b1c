pub mod error;
pub mod fetcher;
pub mod tsml;

use serde::{Deserialize, Serialize};

use crate::models::meeting::Program;

pub use error::FetchError;
pub use fetcher::{FeedFetcher, ProxyConfig, SourceFetch};
pub use tsml::RawMeeting;

/// How a feed lays out its meeting list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedFormat {
    /// Bare JSON array of meetings (TSML `admin-ajax.php?action=meetings`).
    #[default]
    Tsml,
    /// Object with the array under `meetings`.
    TsmlEnvelope,
}

/// One configured upstream meeting directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    pub program: Program,
    #[serde(default)]
    pub format: FeedFormat,
    /// Route through the bypass proxy; the feed blocks direct automated access.
    #[serde(default)]
    pub use_proxy: bool,
}

/// Built-in feeds used when no sources file is configured.
pub fn default_sources() -> Vec<FeedSource> {
    vec![
        FeedSource {
            name: "oiaa".to_string(),
            url: "https://aa-intergroup.org/wp-admin/admin-ajax.php?action=meetings".to_string(),
            program: Program::Aa,
            format: FeedFormat::Tsml,
            use_proxy: true,
        },
        FeedSource {
            name: "virtual-na".to_string(),
            url: "https://virtual-na.org/wp-admin/admin-ajax.php?action=meetings".to_string(),
            program: Program::Na,
            format: FeedFormat::Tsml,
            use_proxy: false,
        },
    ]
}
