//! URL blocklist for outbound connector and plugin requests
//!
//! Classifies a target URL before any network activity happens:
//! - Always blocked: cloud metadata hosts, localhost names, `0.0.0.0`/`::`,
//!   loopback (127.0.0.0/8, ::1), link-local (169.254.0.0/16, fe80::/10)
//! - Blocked unless `allow_private` is set: 10.0.0.0/8, 172.16.0.0/12,
//!   192.168.0.0/16, fc00::/7
//! - Only http/https schemes are accepted; anything unparseable is blocked
//!
//! The blocklist runs before, and independently of, any per-plugin allowlist.
//! Listing a private host in `allowed_domains` never unblocks it.
//!
//! Hosts are read from the WHATWG-parsed URL, so alternative IPv4 spellings
//! (`2130706433`, `0x7f.0.0.1`) and percent-encoded hostnames are normalised
//! before classification.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};
use url::{Host, Url};

/// Hostnames that resolve to instance metadata services.
const METADATA_HOSTS: &[&str] = &[
    "metadata.google.internal",
    "metadata.goog",
    "metadata",
    "instance-data",
];

/// AWS/GCP/Azure IPv4 metadata address.
const METADATA_IPV4: Ipv4Addr = Ipv4Addr::new(169, 254, 169, 254);

/// AWS EC2 IPv6 metadata address (fd00:ec2::254).
const METADATA_IPV6: Ipv6Addr = Ipv6Addr::new(0xfd00, 0x0ec2, 0, 0, 0, 0, 0, 0x0254);

/// Blocklist configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlocklistConfig {
    /// Permit RFC 1918 / ULA targets. Loopback, link-local and metadata
    /// targets stay blocked regardless.
    #[serde(default)]
    pub allow_private: bool,
}

impl BlocklistConfig {
    /// Config that also blocks private network ranges.
    pub fn strict() -> Self {
        Self {
            allow_private: false,
        }
    }

    /// Config that permits private network ranges.
    pub fn allowing_private() -> Self {
        Self {
            allow_private: true,
        }
    }
}

/// Why a URL was blocked.
///
/// The `Display` text always names the category ("Invalid URL",
/// "metadata", "localhost", "link-local", "private") because callers and
/// admin tooling match on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    InvalidUrl,
    UnsupportedScheme(String),
    Metadata(String),
    Localhost(String),
    LinkLocal(String),
    Private(String),
}

impl BlockReason {
    /// Short machine-readable category tag.
    pub fn category(&self) -> &'static str {
        match self {
            BlockReason::InvalidUrl => "invalid_url",
            BlockReason::UnsupportedScheme(_) => "scheme",
            BlockReason::Metadata(_) => "metadata",
            BlockReason::Localhost(_) => "localhost",
            BlockReason::LinkLocal(_) => "link-local",
            BlockReason::Private(_) => "private",
        }
    }

    /// Whether `allow_private` could have changed this outcome.
    pub fn is_conditional(&self) -> bool {
        matches!(self, BlockReason::Private(_))
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::InvalidUrl => write!(f, "Invalid URL"),
            BlockReason::UnsupportedScheme(scheme) => {
                write!(f, "unsupported scheme: {} (only http/https allowed)", scheme)
            }
            BlockReason::Metadata(host) => write!(f, "cloud metadata endpoint: {}", host),
            BlockReason::Localhost(host) => write!(f, "localhost address: {}", host),
            BlockReason::LinkLocal(host) => write!(f, "link-local address: {}", host),
            BlockReason::Private(host) => write!(f, "private network address: {}", host),
        }
    }
}

/// Outcome of classifying one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockDecision {
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Classify a URL, returning the block reason or `None` if the target is allowed.
pub fn block_reason(url: &str, config: &BlocklistConfig) -> Option<BlockReason> {
    let parsed = match Url::parse(url.trim()) {
        Ok(parsed) => parsed,
        Err(_) => return Some(BlockReason::InvalidUrl),
    };

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Some(BlockReason::UnsupportedScheme(scheme.to_string())),
    }

    match parsed.host() {
        None => Some(BlockReason::InvalidUrl),
        Some(Host::Domain(domain)) => domain_block_reason(domain),
        Some(Host::Ipv4(ip)) => ip_block_reason(IpAddr::V4(ip), config),
        Some(Host::Ipv6(ip)) => ip_block_reason(IpAddr::V6(ip), config),
    }
}

/// Returns true when [`block_reason`] would return a reason.
pub fn is_blocked_url(url: &str, config: &BlocklistConfig) -> bool {
    block_reason(url, config).is_some()
}

/// Classify a URL into a serializable decision.
pub fn classify(url: &str, config: &BlocklistConfig) -> BlockDecision {
    match block_reason(url, config) {
        Some(reason) => BlockDecision {
            blocked: true,
            reason: Some(reason.to_string()),
        },
        None => BlockDecision {
            blocked: false,
            reason: None,
        },
    }
}

/// Classify a bare IP address, e.g. one returned by DNS resolution.
pub fn ip_block_reason(ip: IpAddr, config: &BlocklistConfig) -> Option<BlockReason> {
    match ip {
        IpAddr::V4(v4) => ipv4_block_reason(v4, config),
        IpAddr::V6(v6) => {
            // ::ffff:a.b.c.d is classified by its IPv4 part
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return ipv4_block_reason(mapped, config);
            }
            ipv6_block_reason(v6, config)
        }
    }
}

fn domain_block_reason(domain: &str) -> Option<BlockReason> {
    let host = domain.trim_end_matches('.').to_ascii_lowercase();

    if METADATA_HOSTS.contains(&host.as_str()) {
        return Some(BlockReason::Metadata(host));
    }

    if host == "localhost" || host == "localhost.localdomain" || host.ends_with(".localhost") {
        return Some(BlockReason::Localhost(host));
    }

    None
}

fn ipv4_block_reason(ip: Ipv4Addr, config: &BlocklistConfig) -> Option<BlockReason> {
    let display = ip.to_string();

    if ip == METADATA_IPV4 {
        return Some(BlockReason::Metadata(display));
    }
    if ip.is_loopback() || ip.is_unspecified() {
        return Some(BlockReason::Localhost(display));
    }
    if ip.is_link_local() {
        return Some(BlockReason::LinkLocal(display));
    }
    if ip.is_private() && !config.allow_private {
        return Some(BlockReason::Private(display));
    }

    None
}

fn ipv6_block_reason(ip: Ipv6Addr, config: &BlocklistConfig) -> Option<BlockReason> {
    let display = ip.to_string();
    let first = ip.segments()[0];

    if ip == METADATA_IPV6 {
        return Some(BlockReason::Metadata(display));
    }
    if ip.is_loopback() || ip.is_unspecified() {
        return Some(BlockReason::Localhost(display));
    }
    // fe80::/10
    if (first & 0xffc0) == 0xfe80 {
        return Some(BlockReason::LinkLocal(display));
    }
    // fc00::/7
    if (first & 0xfe00) == 0xfc00 && !config.allow_private {
        return Some(BlockReason::Private(display));
    }

    None
}
