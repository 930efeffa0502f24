use std::net::{IpAddr, Ipv4Addr};

use reqwest::Client;
use trawler_core::error::{CrawlError, TransportError};
use trawler_core::task::{Method, RawResponse, RequestSpec};
use trawler_core::traits::Transport;
use url::Url;

/// HTTP transport using reqwest.
///
/// Every HTTP status is returned as a response; only failures to complete
/// the exchange become [`TransportError`]s. By default, SSRF protection is
/// **enabled**: requests to private/reserved IP ranges are rejected. Use
/// [`allow_private_urls`](Self::allow_private_urls) to disable this (e.g.,
/// for CLI usage where the user controls the machine).
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    ssrf_protection: bool,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, CrawlError> {
        let client = Client::builder()
            .user_agent(concat!("trawler/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CrawlError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client))
    }

    /// Use a preconfigured client (proxies, TLS roots, cookie store, ...).
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            ssrf_protection: true,
        }
    }

    /// Disable SSRF protection, allowing requests to private/reserved IPs.
    ///
    /// Only use this for CLI usage where the user controls the machine.
    pub fn allow_private_urls(mut self) -> Self {
        self.ssrf_protection = false;
        self
    }
}

impl Transport for ReqwestTransport {
    async fn request(&self, url: &str, spec: &RequestSpec) -> Result<RawResponse, TransportError> {
        if self.ssrf_protection
            && let Err(error) = validate_url(url).await
        {
            tracing::debug!(%url, %error, "Request refused by SSRF guard");
            return Err(error);
        }

        let mut builder = self
            .client
            .request(to_reqwest_method(spec.method), url)
            .timeout(spec.timeout);
        for (name, value) in &spec.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &spec.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(spec.timeout)
            } else if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else if e.is_builder() {
                TransportError::Rejected(e.to_string())
            } else {
                TransportError::Http(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        tracing::debug!(%url, method = %spec.method, status, "Received response");

        let mut headers = std::collections::HashMap::new();
        for (name, value) in response.headers() {
            let Ok(value) = value.to_str() else {
                continue;
            };
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing: &mut String| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        let body_text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(spec.timeout)
            } else {
                TransportError::Http(format!("Failed to read response body: {e}"))
            }
        })?;

        Ok(RawResponse {
            status,
            headers,
            body_text,
        })
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Reject URLs that are not http(s) or whose host resolves to a
/// private/reserved address.
async fn validate_url(url: &str) -> Result<(), TransportError> {
    let parsed = Url::parse(url).map_err(|e| TransportError::Rejected(format!("Invalid URL: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(TransportError::Rejected(format!(
            "URL scheme '{}' is not allowed (only http/https)",
            parsed.scheme()
        )));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| TransportError::Rejected("URL has no host".to_string()))?;
    let literal = host.trim_start_matches('[').trim_end_matches(']');

    if let Ok(ip) = literal.parse::<IpAddr>() {
        return check_ip(host, ip);
    }

    let port = parsed.port_or_known_default().unwrap_or(80);
    let addrs: Vec<_> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| TransportError::Connect(format!("DNS resolution failed for {host}: {e}")))?
        .collect();

    if addrs.is_empty() {
        return Err(TransportError::Connect(format!(
            "DNS resolution returned no addresses for {host}"
        )));
    }

    addrs.iter().try_for_each(|addr| check_ip(host, addr.ip()))
}

fn check_ip(host: &str, ip: IpAddr) -> Result<(), TransportError> {
    if is_private_ip(ip) {
        Err(TransportError::Rejected(format!(
            "SSRF blocked: {host} resolves to private/reserved IP {ip}"
        )))
    } else {
        Ok(())
    }
}

/// Check if an IP address is in a private/reserved/link-local range.
fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xFFC0) == 0xFE80 // link-local fe80::/10
                || (first & 0xFE00) == 0xFC00 // unique local fc00::/7
                || v6.to_ipv4_mapped().is_some_and(is_private_v4)
        }
    }
}

fn is_private_v4(v4: Ipv4Addr) -> bool {
    let [a, b, ..] = v4.octets();
    v4.is_loopback()
        || v4.is_private()
        || v4.is_link_local() // includes cloud metadata 169.254.169.254
        || v4.is_unspecified()
        || v4.is_broadcast()
        || v4.is_documentation()
        || (a == 100 && (b & 0xC0) == 64) // carrier-grade NAT 100.64.0.0/10
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serve exactly one canned HTTP response on a local port.
    async fn serve_once(raw_response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket.write_all(raw_response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/page")
    }

    fn spec() -> RequestSpec {
        RequestSpec::get(Duration::from_secs(5))
    }

    #[test]
    fn test_private_ipv4() {
        for ip in ["127.0.0.1", "10.0.0.1", "172.16.0.1", "192.168.1.1", "169.254.169.254", "0.0.0.0", "100.64.0.1"] {
            assert!(is_private_ip(ip.parse().unwrap()), "{ip} should be private");
        }
    }

    #[test]
    fn test_public_ipv4() {
        for ip in ["8.8.8.8", "1.1.1.1", "93.184.216.34"] {
            assert!(!is_private_ip(ip.parse().unwrap()), "{ip} should be public");
        }
    }

    #[test]
    fn test_private_ipv6() {
        for ip in ["::1", "::", "fe80::1", "fc00::1", "::ffff:127.0.0.1", "::ffff:169.254.169.254"] {
            assert!(is_private_ip(ip.parse().unwrap()), "{ip} should be private");
        }
        assert!(!is_private_ip("2001:4860:4860::8888".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_validate_url_rejects_private_ip() {
        let err = validate_url("http://127.0.0.1/admin").await.unwrap_err();
        assert!(matches!(err, TransportError::Rejected(_)));
        assert!(err.to_string().contains("SSRF blocked"));
    }

    #[tokio::test]
    async fn test_validate_url_rejects_bracketed_ipv6_loopback() {
        let err = validate_url("http://[::1]:8080/").await.unwrap_err();
        assert!(matches!(err, TransportError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_validate_url_rejects_bad_scheme() {
        let err = validate_url("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, TransportError::Rejected(_)));
        assert!(err.to_string().contains("not allowed"));
    }

    #[tokio::test]
    async fn error_status_is_a_response_not_a_failure() {
        let url = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nX-Trace: abc\r\nContent-Length: 4\r\nConnection: close\r\n\r\nnope",
        )
        .await;
        let transport = ReqwestTransport::new().unwrap().allow_private_urls();

        let response = transport.request(&url, &spec()).await.unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.body_text, "nope");
        assert_eq!(response.headers.get("x-trace").map(String::as_str), Some("abc"));
        assert_eq!(
            response.headers.get("content-type").map(String::as_str),
            Some("text/plain")
        );
    }

    #[tokio::test]
    async fn guarded_transport_refuses_local_server() {
        let url = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n").await;
        let transport = ReqwestTransport::new().unwrap();

        let err = transport.request(&url, &spec()).await.unwrap_err();
        assert!(matches!(err, TransportError::Rejected(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_a_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let transport = ReqwestTransport::new().unwrap().allow_private_urls();

        let err = transport
            .request(&format!("http://{addr}/"), &spec())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)));
    }
}
