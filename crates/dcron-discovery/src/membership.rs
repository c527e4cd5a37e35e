//! Membership reconciliation against the cluster's consensus engine — a
//! named external collaborator (the embedded KV engine's admin API is out
//! of scope, per the data model's Design Notes). Follows
//! `updateMembership` line for line in meaning: named-member means a stale
//! self from a prior run, peer-but-unnamed means already joined, neither
//! means a fresh-cluster bootstrap.

use async_trait::async_trait;
use dcron_core::DcronResult;
use std::time::Duration;

/// One member as reported by the consensus engine's admin API.
#[derive(Debug, Clone)]
pub struct Member {
    pub id: u64,
    pub name: String,
    pub peer_urls: Vec<String>,
}

/// The consensus engine's membership admin surface. `dcron-discovery`
/// defines the contract only; the engine itself is out of scope.
#[async_trait]
pub trait MembershipClient: Send + Sync {
    async fn list_members(&self) -> DcronResult<Vec<Member>>;
    async fn remove_member(&self, id: u64) -> DcronResult<()>;
    async fn add_member(&self, peer_url: &str) -> DcronResult<u64>;
}

/// Dials a candidate endpoint list for the engine's admin API. A connect
/// failure is read as "no cluster exists yet" rather than a hard error.
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    async fn connect(
        &self,
        endpoints: &[String],
        dial_timeout: Duration,
    ) -> DcronResult<Box<dyn MembershipClient>>;
}

/// Whether this node is bootstrapping a brand-new cluster or joining one
/// that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterState {
    New,
    Existing,
}

/// Reconciles this node's membership against `endpoints` (the other SRV
/// peers), returning the resulting cluster state.
pub async fn reconcile_membership(
    connector: &dyn ClusterConnector,
    endpoints: &[String],
    dial_timeout: Duration,
    self_name: &str,
    self_peer_url: &str,
) -> DcronResult<ClusterState> {
    let client = match connector.connect(endpoints, dial_timeout).await {
        Ok(client) => client,
        Err(_) => return Ok(ClusterState::New),
    };

    let members = client.list_members().await?;

    let named = members.iter().find(|m| m.name == self_name);
    let is_peer = members
        .iter()
        .any(|m| m.peer_urls.iter().any(|u| u == self_peer_url));

    if let Some(me) = named {
        client.remove_member(me.id).await?;
    }

    if named.is_some() || !is_peer {
        client.add_member(self_peer_url).await?;
        return Ok(ClusterState::Existing);
    }

    // Already a peer, not previously named: part of the initial static
    // configuration of a cluster that's still forming.
    Ok(ClusterState::New)
}
