//! Per-client rate limiting for the public auth endpoints, built on governor.
//!
//! Each `client-ip:path` key gets a burst of `max_requests` that refills one
//! request every `window / max_requests`. The client ip is the socket peer;
//! forwarding headers are only read when the peer is a configured proxy.

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::DashMapStateStore;
use governor::Quota;

pub use governor::clock::{Clock, DefaultClock};

use crate::errors::AppError;

const DEFAULT_WINDOW_SECONDS: u64 = 60;
const DEFAULT_MAX_REQUESTS: u32 = 60;

type KeyedLimiter<C> =
    governor::RateLimiter<String, DashMapStateStore<String>, C, NoOpMiddleware<<C as Clock>::Instant>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
    /// Peers allowed to report the client address via `x-forwarded-for` / `x-real-ip`.
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_WINDOW_SECONDS), DEFAULT_MAX_REQUESTS)
    }
}

impl RateLimitConfig {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            trusted_proxies: Vec::new(),
        }
    }

    pub fn trust_proxies(mut self, proxies: impl IntoIterator<Item = IpAddr>) -> Self {
        self.trusted_proxies = proxies.into_iter().collect();
        self
    }

    pub fn from_env() -> Result<Self, AppError> {
        let window_secs = std::env::var("RATE_LIMIT_WINDOW_SECONDS")
            .map(|val| val.parse::<u64>())
            .unwrap_or(Ok(DEFAULT_WINDOW_SECONDS))
            .map_err(|_| AppError::configuration("RATE_LIMIT_WINDOW_SECONDS must be a positive integer"))?;
        let max_requests = std::env::var("RATE_LIMIT_MAX_REQUESTS")
            .map(|val| val.parse::<u32>())
            .unwrap_or(Ok(DEFAULT_MAX_REQUESTS))
            .map_err(|_| AppError::configuration("RATE_LIMIT_MAX_REQUESTS must be a positive integer"))?;
        let proxies = match std::env::var("RATE_LIMIT_TRUSTED_PROXIES") {
            Ok(list) => parse_proxies(&list)?,
            Err(_) => Vec::new(),
        };

        let config = Self::new(Duration::from_secs(window_secs), max_requests).trust_proxies(proxies);
        config.quota()?;
        Ok(config)
    }

    fn quota(&self) -> Result<Quota, AppError> {
        let burst = NonZeroU32::new(self.max_requests)
            .ok_or_else(|| AppError::configuration("rate limit maximum must be non-zero"))?;
        Quota::with_period(self.window / self.max_requests)
            .map(|quota| quota.allow_burst(burst))
            .ok_or_else(|| AppError::configuration("rate limit window must be non-zero"))
    }
}

fn parse_proxies(list: &str) -> Result<Vec<IpAddr>, AppError> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<IpAddr>()
                .map_err(|_| AppError::configuration(format!("RATE_LIMIT_TRUSTED_PROXIES: '{entry}' is not an ip address")))
        })
        .collect()
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Limited { retry_after: Duration },
}

pub struct RateLimiter<C: Clock = DefaultClock> {
    config: RateLimitConfig,
    clock: C,
    limiter: KeyedLimiter<C>,
}

impl RateLimiter {
    pub fn with_system_clock(config: RateLimitConfig) -> Result<Self, AppError> {
        Self::with_clock(config, DefaultClock::default())
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(config: RateLimitConfig, clock: C) -> Result<Self, AppError> {
        let limiter = governor::RateLimiter::dashmap_with_clock(config.quota()?, &clock);
        Ok(Self { config, clock, limiter })
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn check(&self, key: &str) -> Admission {
        match self.limiter.check_key(&key.to_string()) {
            Ok(()) => Admission::Allowed,
            Err(not_until) => Admission::Limited {
                retry_after: not_until.wait_time_from(self.clock.now()),
            },
        }
    }

    /// Resolves the address a request is accounted to.
    pub fn client_ip(&self, peer: Option<IpAddr>, headers: &HeaderMap) -> Option<IpAddr> {
        client_ip(peer, headers, &self.config.trusted_proxies)
    }
}

/// The socket peer, unless it is a trusted proxy: then the nearest
/// `x-forwarded-for` hop that is not itself trusted, or `x-real-ip`.
pub fn client_ip(peer: Option<IpAddr>, headers: &HeaderMap, trusted: &[IpAddr]) -> Option<IpAddr> {
    let peer = peer?;
    if !trusted.contains(&peer) {
        return Some(peer);
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|hops| {
            hops.rsplit(',')
                .filter_map(|hop| hop.trim().parse::<IpAddr>().ok())
                .find(|hop| !trusted.contains(hop))
        });
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };
    Some(forwarded.or_else(real_ip).unwrap_or(peer))
}

fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

pub async fn rate_limit(State(limiter): State<Arc<RateLimiter>>, req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let ip = limiter
        .client_ip(peer, req.headers())
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let key = format!("{}:{}", ip, req.uri().path());

    match limiter.check(&key) {
        Admission::Allowed => next.run(req).await,
        Admission::Limited { retry_after } => {
            let retry_after = retry_after_secs(retry_after);
            tracing::warn!(key = %key, retry_after, "rate limit exceeded");

            let mut response = AppError::TooManyRequests { retry_after }.into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::clock::FakeRelativeClock;

    fn limiter(max: u32, window_secs: u64) -> (RateLimiter<FakeRelativeClock>, FakeRelativeClock) {
        let clock = FakeRelativeClock::default();
        let limiter = RateLimiter::with_clock(
            RateLimitConfig::new(Duration::from_secs(window_secs), max),
            clock.clone(),
        )
        .unwrap();
        (limiter, clock)
    }

    fn retry_after(admission: Admission) -> Duration {
        match admission {
            Admission::Limited { retry_after } => retry_after,
            Admission::Allowed => panic!("expected to be limited"),
        }
    }

    #[test]
    fn admits_a_burst_then_rejects() {
        let (limiter, _clock) = limiter(3, 60);
        for _ in 0..3 {
            assert_eq!(limiter.check("k"), Admission::Allowed);
        }
        let wait = retry_after(limiter.check("k"));
        assert!(wait > Duration::ZERO && wait <= Duration::from_secs(20), "waited {wait:?}");
    }

    #[test]
    fn capacity_returns_with_the_clock() {
        let (limiter, clock) = limiter(2, 10);
        limiter.check("k");
        limiter.check("k");

        let wait = retry_after(limiter.check("k"));
        clock.advance(wait);
        assert_eq!(limiter.check("k"), Admission::Allowed);
        assert!(matches!(limiter.check("k"), Admission::Limited { .. }));
    }

    #[test]
    fn keys_are_independent() {
        let (limiter, _clock) = limiter(1, 60);
        assert_eq!(limiter.check("a"), Admission::Allowed);
        assert_eq!(limiter.check("b"), Admission::Allowed);
        assert!(matches!(limiter.check("a"), Admission::Limited { .. }));
    }

    #[test]
    fn zero_limits_are_rejected() {
        let config = RateLimitConfig::new(Duration::from_secs(60), 0);
        assert!(matches!(RateLimiter::with_system_clock(config), Err(AppError::Configuration(_))));
        let config = RateLimitConfig::new(Duration::ZERO, 5);
        assert!(matches!(RateLimiter::with_system_clock(config), Err(AppError::Configuration(_))));
    }

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(Duration::from_secs(3)), 3);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }

    #[test]
    fn forwarding_headers_are_ignored_from_untrusted_peers() {
        let peer: IpAddr = "198.51.100.1".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.10"));

        assert_eq!(client_ip(Some(peer), &headers, &[]), Some(peer));
        assert_eq!(client_ip(None, &headers, &[]), None);
    }

    #[test]
    fn trusted_proxies_report_the_nearest_untrusted_hop() {
        let proxy: IpAddr = "10.0.0.1".parse().unwrap();
        let inner: IpAddr = "10.0.0.2".parse().unwrap();
        let trusted = [proxy, inner];
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(Some(proxy), &headers, &trusted), Some(proxy));

        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.10"));
        assert_eq!(client_ip(Some(proxy), &headers, &trusted), Some("203.0.113.10".parse().unwrap()));

        // the left-most hop is whatever the client claimed
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.1.1.1, 203.0.113.9, 10.0.0.2"));
        assert_eq!(client_ip(Some(proxy), &headers, &trusted), Some("203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn proxy_list_parses_from_text() {
        assert_eq!(parse_proxies("").unwrap(), Vec::<IpAddr>::new());
        assert_eq!(parse_proxies(" 10.0.0.1, ::1 ").unwrap().len(), 2);
        assert!(parse_proxies("10.0.0.1, proxy.local").is_err());
    }
}
