//! Plugin sandbox policy
//!
//! Display plugins are untrusted and user-installable. Anything they ask the
//! host to do on their behalf passes through this module.
//!
//! # Security Model
//!
//! 1. **SSRF Protection**: every outbound URL is classified by [`blocklist`]:
//!    - Cloud metadata endpoints (169.254.169.254, fd00:ec2::254, metadata hosts)
//!    - Localhost (127.0.0.0/8, ::1, 0.0.0.0, `*.localhost`)
//!    - Link-local (169.254.0.0/16, fe80::/10)
//!    - Private ranges (10/8, 172.16/12, 192.168/16, fc00::/7), unless a
//!      connector is explicitly configured with `allowPrivate`
//!    - Only HTTP/HTTPS schemes are allowed
//!
//! 2. **Domain Allowlist**: plugins may further restrict themselves to the
//!    domains declared in their manifest. The allowlist is checked after the
//!    blocklist and can never re-open a blocked target.
//!
//! 3. **Refresh Rate**: a manifest may declare a minimum refresh interval.
//!
//! 4. **Secret Scoping**: a plugin only sees the secret names it declares.

pub mod blocklist;
pub mod permissions;

pub use blocklist::{
    block_reason, classify, ip_block_reason, is_blocked_url, BlockDecision, BlockReason,
    BlocklistConfig,
};
pub use permissions::{
    GuardedTransport, PermissionEnforcer, PermissionError, PermissionViolation, PluginPermissions,
    RefreshDecision, RequestUrl, ScopedSecretResolver, ViolationCallback, ViolationKind,
};
