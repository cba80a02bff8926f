//! Provider error types.

use geotile_coords::TileCoordinate;

/// Errors a [`TileProvider`](crate::TileProvider) can report for a single request.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The tile lies outside the provider's zoom range.
    #[error("tile {coordinate} outside zoom range {min_zoom}..={max_zoom}")]
    OutOfRange {
        /// Requested tile.
        coordinate: TileCoordinate,
        /// Provider minimum zoom.
        min_zoom: u8,
        /// Provider maximum zoom.
        max_zoom: u8,
    },

    /// Connection, DNS, TLS or timeout failure.
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: Box<ureq::Transport>,
    },

    /// The server answered with a non-success status.
    #[error("request to {url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Reading the response body failed.
    #[error("failed to read response body: {0}")]
    Io(#[from] std::io::Error),

    /// The response body is not a decodable image.
    #[error("failed to decode tile image: {0}")]
    Decode(#[from] image::ImageError),

    /// The metadata document is not valid TileJSON.
    #[error("failed to parse tile metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl ProviderError {
    /// Build from a `ureq` error, keeping the URL for diagnostics.
    pub(crate) fn from_ureq(url: &str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, _) => ProviderError::Status {
                url: url.to_string(),
                status,
            },
            ureq::Error::Transport(transport) => ProviderError::Transport {
                url: url.to_string(),
                source: Box::new(transport),
            },
        }
    }

    /// Whether retrying the same request could succeed.
    ///
    /// Client errors (4xx other than 408/429), out-of-range tiles and
    /// undecodable images are permanent.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Transport { .. } | ProviderError::Io(_) => true,
            ProviderError::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            ProviderError::OutOfRange { .. }
            | ProviderError::Decode(_)
            | ProviderError::Metadata(_) => false,
        }
    }
}
