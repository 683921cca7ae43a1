use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use axum::http::HeaderMap;
use lottery_shared::constants::UNKNOWN_IDENTITY;
use serde::Deserialize;
use tokio::sync::OnceCell;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Deserialize)]
struct IpEchoResponse {
    ip: String,
}

/// Best-effort pseudo-identity for rate limiting.
///
/// Proxy headers win over the peer address. When the widget runs on the
/// player's own machine the peer is loopback, so the public address is
/// fetched once from an IP echo service and reused.
pub struct IdentityResolver {
    client: reqwest::Client,
    echo_url: String,
    public_ip: OnceCell<String>,
}

impl IdentityResolver {
    pub fn new(echo_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            echo_url: echo_url.into(),
            public_ip: OnceCell::new(),
        }
    }

    pub async fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        match client_address(headers, peer) {
            Some(ip) if ip.is_loopback() => self.public_ip().await,
            Some(ip) => ip.to_string(),
            None => UNKNOWN_IDENTITY.to_string(),
        }
    }

    async fn public_ip(&self) -> String {
        let lookup = self
            .public_ip
            .get_or_try_init(|| async {
                let response = self
                    .client
                    .get(&self.echo_url)
                    .timeout(LOOKUP_TIMEOUT)
                    .send()
                    .await?
                    .error_for_status()?;
                let body: IpEchoResponse = response.json().await?;
                tracing::info!("Public address resolved to {}", body.ip);
                Ok::<_, reqwest::Error>(body.ip)
            })
            .await;

        match lookup {
            Ok(ip) => ip.clone(),
            Err(e) => {
                tracing::warn!("Could not look up public address: {}", e);
                UNKNOWN_IDENTITY.to_string()
            }
        }
    }
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|value| value.trim().parse().ok())
}

/// Client address from `X-Forwarded-For`, then `X-Real-IP`, then the peer.
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    header_ip(headers, "x-forwarded-for")
        .or_else(|| header_ip(headers, "x-real-ip"))
        .or_else(|| peer.map(|addr| addr.ip()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        let peer = Some(SocketAddr::from(([10, 0, 0, 9], 5555)));
        assert_eq!(
            client_address(&headers, peer),
            Some("203.0.113.7".parse().unwrap())
        );
    }

    #[test]
    fn test_falls_back_to_real_ip_then_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(
            client_address(&headers, None),
            Some("198.51.100.2".parse().unwrap())
        );

        let peer = Some(SocketAddr::from(([10, 0, 0, 9], 5555)));
        assert_eq!(
            client_address(&HeaderMap::new(), peer),
            Some("10.0.0.9".parse().unwrap())
        );
        assert_eq!(client_address(&HeaderMap::new(), None), None);
    }

    #[tokio::test]
    async fn test_unreachable_echo_service_means_unknown() {
        let resolver = IdentityResolver::new("http://127.0.0.1:9/");
        let peer = Some(SocketAddr::from(([127, 0, 0, 1], 40000)));
        assert_eq!(resolver.resolve(&HeaderMap::new(), peer).await, UNKNOWN_IDENTITY);
        assert_eq!(
            resolver.resolve(&HeaderMap::new(), Some(SocketAddr::from(([192, 0, 2, 1], 1)))).await,
            "192.0.2.1"
        );
    }
}
