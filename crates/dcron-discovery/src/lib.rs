//! Cluster bootstrap: DNS-SRV resolution of the peer and client transports,
//! local-interface address matching, and membership reconciliation against
//! the consensus engine's admin API.
//!
//! ```text
//! dcron-discovery
//!   ├── backoff     exponential-jitter retry (hand-rolled, not a crate)
//!   ├── resolve     SRV lookup + local-interface matching
//!   └── membership  stale-self removal / join / bootstrap decision
//! ```

mod backoff;
mod membership;
mod resolve;

pub use backoff::backoff;
pub use membership::{reconcile_membership, ClusterConnector, ClusterState, Member, MembershipClient};
pub use resolve::{local_interface_ips, resolve_service, system_resolver, ResolvedService, SrvTarget};

/// Rewrites a `host:port` listen address to `0.0.0.0:port` when the
/// "bind-all" toggle is set, so the process accepts connections on every
/// local interface instead of only the one DNS resolved.
pub fn bind_all_rewrite(listen: &str, bind_all: bool) -> String {
    if !bind_all {
        return listen.to_string();
    }
    match listen.rsplit_once(':') {
        Some((_, port)) => format!("0.0.0.0:{port}"),
        None => listen.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_all_rewrites_host_to_wildcard() {
        assert_eq!(bind_all_rewrite("10.0.0.5:2380", true), "0.0.0.0:2380");
    }

    #[test]
    fn bind_all_off_leaves_address_untouched() {
        assert_eq!(bind_all_rewrite("10.0.0.5:2380", false), "10.0.0.5:2380");
    }
}
