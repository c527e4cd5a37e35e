//! DNS-SRV service resolution: scans `_<service>._tcp.<domain>` records and
//! picks the one whose target IP matches a local interface and whose port
//! matches the service's configured local port.

use dcron_core::{DcronError, DcronResult};
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::net::IpAddr;

/// One SRV record, trimmed of the trailing-dot FQDN convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvTarget {
    pub host: String,
    pub port: u16,
}

impl SrvTarget {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Outcome of resolving one service name: the address this node should bind
/// to, the SRV record that matched it, and the full record set (needed by
/// membership reconciliation to build the peer endpoint list).
#[derive(Debug, Clone)]
pub struct ResolvedService {
    pub local_ip: IpAddr,
    pub matched: SrvTarget,
    pub records: Vec<SrvTarget>,
}

/// Builds a resolver from the system's configured nameservers.
pub fn system_resolver() -> TokioAsyncResolver {
    TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
}

/// Local interface IPs, used to find which SRV record refers to this host.
pub fn local_interface_ips() -> DcronResult<Vec<IpAddr>> {
    if_addrs::get_if_addrs()
        .map(|ifaces| ifaces.into_iter().map(|i| i.ip()).collect())
        .map_err(|e| DcronError::CannotResolveService(e.to_string()))
}

/// Resolves `_<service>._tcp.<domain>`, returning the record whose target
/// resolves to one of `local_ips` and whose port equals `configured_port`.
pub async fn resolve_service(
    resolver: &TokioAsyncResolver,
    service: &str,
    domain: &str,
    configured_port: u16,
    local_ips: &[IpAddr],
) -> DcronResult<ResolvedService> {
    let query = format!("_{service}._tcp.{domain}");
    let lookup = resolver
        .srv_lookup(&query)
        .await
        .map_err(|e| DcronError::CannotResolveService(format!("{query}: {e}")))?;

    let mut records = Vec::new();
    let mut matched: Option<(IpAddr, SrvTarget)> = None;

    for srv in lookup.iter() {
        let host = srv.target().to_utf8().trim_end_matches('.').to_string();
        let target = SrvTarget {
            host: host.clone(),
            port: srv.port(),
        };
        records.push(target.clone());

        if matched.is_some() || target.port != configured_port {
            continue;
        }

        if let Ok(ips) = resolver.lookup_ip(host.as_str()).await {
            for ip in ips.iter() {
                if local_ips.contains(&ip) {
                    matched = Some((ip, target.clone()));
                    break;
                }
            }
        }
    }

    let (local_ip, matched) = matched.ok_or_else(|| DcronError::CannotResolveService(query.clone()))?;

    Ok(ResolvedService {
        local_ip,
        matched,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srv_target_formats_as_host_colon_port() {
        let target = SrvTarget {
            host: "node-a.internal".to_string(),
            port: 2380,
        };
        assert_eq!(target.endpoint(), "node-a.internal:2380");
    }
}
