//! Image resolution: fetch bytes for a URL and probe their pixel dimensions.
//!
//! The network sits behind the `Fetcher` trait so the rewrite path can be
//! exercised with stub fetchers. Resolution is a single attempt — a failed
//! download is reported per image and recovered by the caller, never retried.

use anyhow::Result;
use image::ImageFormat;
use std::io::Cursor;
use std::time::Duration;

/// Per-request timeout for image downloads.
const FETCH_TIMEOUT_SECS: u64 = 20;

/// Some image hosts refuse requests without a browser-like agent.
const USER_AGENT: &str = "Mozilla/5.0";

/// Seam between the resolver and the network.
pub trait Fetcher {
    /// Fetch the raw bytes behind `url`. A non-success HTTP status is an
    /// error, not a payload.
    fn get(&self, url: &str) -> Result<Vec<u8>>;
}

/// Production fetcher: one blocking reqwest client shared across a batch.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

/// Why a URL could not be turned into an embeddable image.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("download failed: {0}")]
    Download(#[source] anyhow::Error),
    #[error("not a decodable image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("image has a zero pixel dimension")]
    ZeroDimension,
}

/// A fetched image with its sniffed format and pixel dimensions.
///
/// The bytes are embedded verbatim; only the header is decoded.
#[derive(Debug)]
pub struct ResolvedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

impl ResolvedImage {
    /// File extension for the media part name, e.g. "png".
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("bin")
    }

    /// MIME type for the content-type registration, e.g. "image/png".
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

/// Fetch `url` and probe the result's dimensions.
pub fn resolve(fetcher: &dyn Fetcher, url: &str) -> Result<ResolvedImage, ResolveError> {
    let bytes = fetcher.get(url).map_err(ResolveError::Download)?;
    let format = image::guess_format(&bytes).map_err(ResolveError::Decode)?;
    let (width, height) = image::ImageReader::with_format(Cursor::new(&bytes), format)
        .into_dimensions()
        .map_err(ResolveError::Decode)?;
    if width == 0 || height == 0 {
        return Err(ResolveError::ZeroDimension);
    }
    Ok(ResolvedImage {
        bytes,
        width,
        height,
        format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BytesFetcher(Vec<u8>);

    impl Fetcher for BytesFetcher {
        fn get(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    struct FailingFetcher;

    impl Fetcher for FailingFetcher {
        fn get(&self, url: &str) -> Result<Vec<u8>> {
            anyhow::bail!("connection refused: {}", url)
        }
    }

    /// Encode a tiny RGB PNG of the given dimensions.
    fn make_png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer
                .write_image_data(&vec![0u8; (width * height * 3) as usize])
                .unwrap();
        }
        out
    }

    #[test]
    fn test_resolve_png_dimensions() {
        let fetcher = BytesFetcher(make_png(400, 80));
        let img = resolve(&fetcher, "http://x/img.png").unwrap();
        assert_eq!((img.width, img.height), (400, 80));
        assert_eq!(img.format, ImageFormat::Png);
        assert_eq!(img.extension(), "png");
        assert_eq!(img.mime_type(), "image/png");
        // Bytes pass through untouched
        assert_eq!(img.bytes, fetcher.0);
    }

    #[test]
    fn test_resolve_download_failure() {
        let err = resolve(&FailingFetcher, "http://x/img.png").unwrap_err();
        assert!(matches!(err, ResolveError::Download(_)));
        assert!(err.to_string().contains("download failed"));
    }

    #[test]
    fn test_resolve_non_image_bytes() {
        let fetcher = BytesFetcher(b"<html>404 not found</html>".to_vec());
        let err = resolve(&fetcher, "http://x/img.png").unwrap_err();
        assert!(matches!(err, ResolveError::Decode(_)));
    }

    #[test]
    fn test_resolve_zero_dimension_image() {
        // Farbfeld headers are trivial to construct and can legally
        // declare a zero extent; the resolver must reject it before
        // the sizing math divides by it.
        let mut bytes = b"farbfeld".to_vec();
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&4u32.to_be_bytes());
        let fetcher = BytesFetcher(bytes);
        let err = resolve(&fetcher, "http://x/img.ff").unwrap_err();
        assert!(matches!(err, ResolveError::ZeroDimension));
    }

    #[test]
    fn test_resolve_truncated_image() {
        // Valid PNG magic but no IHDR — sniffs as PNG, fails on dimensions
        let mut bytes = make_png(10, 10);
        bytes.truncate(12);
        let fetcher = BytesFetcher(bytes);
        let err = resolve(&fetcher, "http://x/img.png").unwrap_err();
        assert!(matches!(err, ResolveError::Decode(_)));
    }
}
