//! Source type detection
//!
//! One header-only probe decides the backend. The response `Content-Type`
//! wins when it is recognized; otherwise the URL path extension is used.
//! Detection itself never fails: anything unclassifiable is
//! [`SourceType::Unknown`].

use crate::types::SourceType;
#[cfg(feature = "http-probe")]
use crate::types::PlayerConfig;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Fetches the content type of a URL without downloading its body
#[async_trait]
pub trait SourceProbe: Send + Sync {
    /// `Ok(None)` when the response carries no `Content-Type`
    async fn content_type(&self, url: &str) -> Result<Option<String>>;
}

/// `HEAD` probe over reqwest
#[cfg(feature = "http-probe")]
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

#[cfg(feature = "http-probe")]
impl HttpProbe {
    pub fn new(config: &PlayerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.probe_timeout())
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "http-probe")]
#[async_trait]
impl SourceProbe for HttpProbe {
    async fn content_type(&self, url: &str) -> Result<Option<String>> {
        let response = self.client.head(url).send().await?;
        // Error statuses still carry a usable header
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        debug!(url = url, status = %response.status(), content_type = ?content_type, "Probe response");
        Ok(content_type)
    }
}

/// Classify a MIME type, ignoring case and parameters
pub fn classify_content_type(content_type: &str) -> Option<SourceType> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence.starts_with("video/") || essence == "application/mp4" {
        Some(SourceType::Native)
    } else if essence.contains("application/dash+xml") {
        Some(SourceType::Dash)
    } else if essence.contains("application/x-mpegurl")
        || essence.contains("application/vnd.apple.mpegurl")
    {
        Some(SourceType::Hls)
    } else {
        None
    }
}

/// Classify a URL by the extension of its path
pub fn classify_extension(url: &str) -> Option<SourceType> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase(),
        // Relative references have no base to resolve against
        Err(_) => strip_query_and_fragment(url).to_ascii_lowercase(),
    };

    if path.ends_with(".mp4") {
        Some(SourceType::Native)
    } else if path.ends_with(".mpd") {
        Some(SourceType::Dash)
    } else if path.ends_with(".m3u8") {
        Some(SourceType::Hls)
    } else {
        None
    }
}

fn strip_query_and_fragment(url: &str) -> &str {
    match url.find(['?', '#']) {
        Some(end) => &url[..end],
        None => url,
    }
}

/// Decides which backend a URL needs
#[derive(Clone)]
pub struct SourceTypeDetector {
    probe: Arc<dyn SourceProbe>,
}

impl SourceTypeDetector {
    pub fn new(probe: Arc<dyn SourceProbe>) -> Self {
        Self { probe }
    }

    /// Probe `url` once and classify it
    pub async fn detect(&self, url: &str) -> SourceType {
        let by_content_type = match self.probe.content_type(url).await {
            Ok(Some(content_type)) => classify_content_type(&content_type),
            Ok(None) => None,
            Err(e) => {
                warn!(url = url, error = %e, "Content-type probe failed, falling back to extension");
                None
            }
        };

        let source_type = by_content_type
            .or_else(|| classify_extension(url))
            .unwrap_or(SourceType::Unknown);
        debug!(url = url, source_type = %source_type, "Source type detected");
        source_type
    }
}

impl std::fmt::Debug for SourceTypeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceTypeDetector").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::StaticProbe;

    #[test]
    fn test_classify_content_type() {
        assert_eq!(classify_content_type("video/mp4"), Some(SourceType::Native));
        assert_eq!(classify_content_type("video/webm"), Some(SourceType::Native));
        assert_eq!(classify_content_type("application/mp4"), Some(SourceType::Native));
        assert_eq!(
            classify_content_type("application/dash+xml"),
            Some(SourceType::Dash)
        );
        assert_eq!(
            classify_content_type("application/vnd.apple.mpegurl"),
            Some(SourceType::Hls)
        );
        assert_eq!(
            classify_content_type("application/x-mpegURL"),
            Some(SourceType::Hls)
        );
        assert_eq!(classify_content_type("text/html"), None);
        assert_eq!(classify_content_type(""), None);
    }

    #[test]
    fn test_classify_content_type_ignores_parameters_and_case() {
        assert_eq!(
            classify_content_type("Video/MP4; codecs=\"avc1.42E01E\""),
            Some(SourceType::Native)
        );
        assert_eq!(
            classify_content_type("application/dash+xml;charset=utf-8"),
            Some(SourceType::Dash)
        );
    }

    #[test]
    fn test_classify_extension() {
        assert_eq!(
            classify_extension("https://cdn.example.com/a/clip.mp4"),
            Some(SourceType::Native)
        );
        assert_eq!(
            classify_extension("https://cdn.example.com/manifest.mpd?token=abc"),
            Some(SourceType::Dash)
        );
        assert_eq!(
            classify_extension("https://cdn.example.com/master.M3U8#t=10"),
            Some(SourceType::Hls)
        );
        assert_eq!(classify_extension("videos/CLIP.MP4?x=1"), Some(SourceType::Native));
        assert_eq!(classify_extension("https://cdn.example.com/stream"), None);
        // Query strings are not part of the path
        assert_eq!(classify_extension("https://cdn.example.com/play?file=a.mp4"), None);
    }

    #[tokio::test]
    async fn test_content_type_takes_precedence() {
        let probe = Arc::new(StaticProbe::content_type("application/dash+xml"));
        let detector = SourceTypeDetector::new(probe.clone());

        assert_eq!(detector.detect("https://x/stream.m3u8").await, SourceType::Dash);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_unrecognized_content_type_falls_back_to_extension() {
        let detector = SourceTypeDetector::new(Arc::new(StaticProbe::content_type(
            "application/octet-stream",
        )));
        assert_eq!(detector.detect("https://x/master.m3u8").await, SourceType::Hls);

        let detector = SourceTypeDetector::new(Arc::new(StaticProbe::none()));
        assert_eq!(detector.detect("https://x/clip.mp4").await, SourceType::Native);
    }

    #[tokio::test]
    async fn test_probe_failure_uses_extension_once() {
        let probe = Arc::new(StaticProbe::failing("connection refused"));
        let detector = SourceTypeDetector::new(probe.clone());

        assert_eq!(detector.detect("https://x/manifest.mpd").await, SourceType::Dash);
        assert_eq!(detector.detect("https://x/stream").await, SourceType::Unknown);
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test]
    async fn test_nothing_matches_is_unknown() {
        let detector = SourceTypeDetector::new(Arc::new(StaticProbe::content_type("text/html")));
        assert_eq!(detector.detect("https://x/page").await, SourceType::Unknown);
    }

    #[cfg(feature = "http-probe")]
    mod http {
        use super::*;
        use crate::Error;
        use std::time::Duration;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        fn http_probe() -> HttpProbe {
            let client = reqwest::Client::builder()
                .no_proxy()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap();
            HttpProbe::with_client(client)
        }

        /// Answer each incoming request on a local port with `response`
        async fn serve(response: &'static str) -> String {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                while let Ok((mut socket, _)) = listener.accept().await {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
            });
            format!("http://{}", addr)
        }

        #[tokio::test]
        async fn test_head_reads_content_type() {
            let base = serve(
                "HTTP/1.1 200 OK\r\n\
                 Content-Type: application/dash+xml\r\n\
                 Content-Length: 0\r\n\
                 Connection: close\r\n\r\n",
            )
            .await;
            let probe = http_probe();

            let content_type = probe.content_type(&format!("{}/stream.m3u8", base)).await;
            assert_eq!(content_type.unwrap().as_deref(), Some("application/dash+xml"));

            let detector = SourceTypeDetector::new(Arc::new(probe));
            assert_eq!(
                detector.detect(&format!("{}/stream.m3u8", base)).await,
                SourceType::Dash
            );
        }

        #[tokio::test]
        async fn test_error_status_without_content_type_is_none() {
            let base = serve(
                "HTTP/1.1 405 Method Not Allowed\r\n\
                 Content-Length: 0\r\n\
                 Connection: close\r\n\r\n",
            )
            .await;
            let probe = http_probe();

            let content_type = probe.content_type(&format!("{}/clip.mp4", base)).await;
            assert!(matches!(content_type, Ok(None)), "{:?}", content_type);

            let detector = SourceTypeDetector::new(Arc::new(probe));
            assert_eq!(
                detector.detect(&format!("{}/clip.mp4", base)).await,
                SourceType::Native
            );
        }

        #[tokio::test]
        async fn test_refused_connection_is_network_error() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            drop(listener);
            let probe = http_probe();

            let result = probe.content_type(&format!("{}/manifest.mpd", base)).await;
            assert!(matches!(result, Err(Error::Network(_))), "{:?}", result);

            let detector = SourceTypeDetector::new(Arc::new(probe));
            assert_eq!(
                detector.detect(&format!("{}/manifest.mpd", base)).await,
                SourceType::Dash
            );
        }
    }
}
