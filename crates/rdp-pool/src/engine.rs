//! Pool state machine: Add, Claim, Release, Status, Expire
//!
//! The engine owns both sets exclusively. Every public operation runs as a
//! critical section under a single mutex: acquire, run the expiry sweep,
//! read both sets, mutate in memory, persist, release. No caller can observe
//! a state another operation is mid-mutating.
//!
//! Persistence ordering: every two-set mutation writes the shrinking set
//! first. If the second write fails the record can drop out of the pool
//! until re-added, but the same ip can never be live in both sets: mutual
//! exclusivity wins over conservation on storage failure. Sets are re-read
//! from storage at the start of every operation, so a failed write never
//! leaves a stale in-memory view behind.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::event::{EventKind, EventLog};
use crate::record::{now_millis, AvailableEntry, CredentialRecord, LeaseEntry};
use crate::store::{LineFile, SetStore};

/// File names inside the pool data directory.
const AVAILABLE_FILE: &str = "available_rdp.txt";
const IN_USE_FILE: &str = "in_use_rdp.txt";
const LOG_FILE: &str = "rdp_pool_log.txt";

/// Default lease duration: 6 hours.
pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(6 * 3600);

/// A claim receipt returned to the caller, including the computed deadline.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimedLease {
    #[serde(flatten)]
    pub record: CredentialRecord,
    pub lease_id: String,
    pub claimed_at: u64,
    pub expires_at: u64,
}

/// Read-only pool snapshot. The sweep that precedes it is its only side
/// effect.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub available_count: usize,
    pub leased_count: usize,
    pub total_count: usize,
    pub available_ips: Vec<String>,
    pub leased_ips: Vec<String>,
    pub timestamp: u64,
}

/// Lease-pool engine over two set stores.
pub struct PoolEngine<A, L>
where
    A: SetStore<AvailableEntry>,
    L: SetStore<LeaseEntry>,
{
    available: A,
    leased: L,
    events: EventLog,
    lease_duration: Duration,
    lock: Mutex<()>,
}

/// Engine over the delimited text files used in production.
pub type FilePoolEngine = PoolEngine<LineFile<AvailableEntry>, LineFile<LeaseEntry>>;

impl FilePoolEngine {
    /// Open a pool persisted as text files under `data_dir`, creating the
    /// directory if needed.
    pub fn open(data_dir: &Path, lease_duration: Duration) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| Error::Storage(format!("creating {}: {e}", data_dir.display())))?;
        Ok(Self::new(
            LineFile::new(data_dir.join(AVAILABLE_FILE)),
            LineFile::new(data_dir.join(IN_USE_FILE)),
            EventLog::new(data_dir.join(LOG_FILE)),
            lease_duration,
        ))
    }
}

impl<A, L> PoolEngine<A, L>
where
    A: SetStore<AvailableEntry>,
    L: SetStore<LeaseEntry>,
{
    pub fn new(available: A, leased: L, events: EventLog, lease_duration: Duration) -> Self {
        info!(
            lease_duration_secs = lease_duration.as_secs(),
            "pool engine initialized"
        );
        Self {
            available,
            leased,
            events,
            lease_duration,
            lock: Mutex::new(()),
        }
    }

    pub fn lease_duration(&self) -> Duration {
        self.lease_duration
    }

    /// Admit a credential record to the pool.
    ///
    /// Fields are trimmed and must be non-empty. The ip must not already be
    /// active anywhere in the pool; the duplicate check covers the leased
    /// set as well, so a release or expiry can never produce two live copies
    /// of the same ip.
    pub async fn add(&self, ip: &str, username: &str, password: &str) -> Result<AvailableEntry> {
        let record = CredentialRecord::validated(ip, username, password)?;

        let _guard = self.lock.lock().await;
        let (mut available, leased, _) = self.sweep_locked().await?;

        if available.iter().any(|e| e.record.ip == record.ip)
            || leased.iter().any(|e| e.record.ip == record.ip)
        {
            return Err(Error::Duplicate(record.ip));
        }

        let entry = AvailableEntry {
            record,
            added_at: now_millis(),
        };
        available.push(entry.clone());
        self.available.replace_all(&available).await?;

        self.events
            .append(EventKind::Added, &format!("ip={}", entry.record.ip))
            .await;
        metrics::counter!("pool_operations_total", "op" => "add").increment(1);
        info!(ip = entry.record.ip, "credential added to pool");
        Ok(entry)
    }

    /// Claim the oldest available credential.
    ///
    /// Removes the head of the available set (FIFO), mints a fresh lease id,
    /// and persists both sets before returning. The removal and insertion
    /// are one critical section, so no concurrent caller can claim the same
    /// record or observe it in neither set.
    pub async fn claim(&self) -> Result<ClaimedLease> {
        let _guard = self.lock.lock().await;
        let (mut available, mut leased, _) = self.sweep_locked().await?;

        if available.is_empty() {
            debug!("claim on exhausted pool");
            return Err(Error::PoolExhausted);
        }

        let head = available.remove(0);
        let lease = LeaseEntry {
            record: head.record,
            lease_id: new_lease_id(),
            claimed_at: now_millis(),
        };

        // Shrinking set first: a failure here leaves the record available.
        self.available.replace_all(&available).await?;
        leased.push(lease.clone());
        self.leased.replace_all(&leased).await?;

        self.events
            .append(
                EventKind::Claimed,
                &format!("ip={} lease_id={}", lease.record.ip, lease.lease_id),
            )
            .await;
        metrics::counter!("pool_operations_total", "op" => "claim").increment(1);
        info!(
            ip = lease.record.ip,
            lease_id = lease.lease_id,
            remaining = available.len(),
            "credential claimed"
        );

        let expires_at = lease.claimed_at + self.lease_duration.as_millis() as u64;
        Ok(ClaimedLease {
            record: lease.record,
            lease_id: lease.lease_id,
            claimed_at: lease.claimed_at,
            expires_at,
        })
    }

    /// Return a leased credential to the pool.
    ///
    /// The lease id becomes permanently invalid; the record re-enters the
    /// available set at the back with a fresh `added_at`.
    pub async fn release(&self, lease_id: &str) -> Result<CredentialRecord> {
        let lease_id = lease_id.trim();
        if lease_id.is_empty() {
            return Err(Error::Validation("missing lease_id".into()));
        }

        let _guard = self.lock.lock().await;
        let (mut available, mut leased, _) = self.sweep_locked().await?;

        let index = leased
            .iter()
            .position(|e| e.lease_id == lease_id)
            .ok_or_else(|| Error::NotFound(lease_id.to_string()))?;
        let entry = leased.remove(index);

        // Shrinking set first: a failure here keeps the lease outstanding.
        self.leased.replace_all(&leased).await?;
        available.push(AvailableEntry {
            record: entry.record.clone(),
            added_at: now_millis(),
        });
        self.available.replace_all(&available).await?;

        self.events
            .append(
                EventKind::Released,
                &format!("ip={} lease_id={}", entry.record.ip, entry.lease_id),
            )
            .await;
        metrics::counter!("pool_operations_total", "op" => "release").increment(1);
        info!(
            ip = entry.record.ip,
            lease_id = entry.lease_id,
            "credential released"
        );
        Ok(entry.record)
    }

    /// Snapshot both sets. Read-only aside from the sweep.
    pub async fn status(&self) -> Result<PoolStatus> {
        let _guard = self.lock.lock().await;
        let (available, leased, _) = self.sweep_locked().await?;

        metrics::gauge!("pool_available").set(available.len() as f64);
        metrics::gauge!("pool_leased").set(leased.len() as f64);

        Ok(PoolStatus {
            available_count: available.len(),
            leased_count: leased.len(),
            total_count: available.len() + leased.len(),
            available_ips: available.iter().map(|e| e.record.ip.clone()).collect(),
            leased_ips: leased.iter().map(|e| e.record.ip.clone()).collect(),
            timestamp: now_millis(),
        })
    }

    /// Run the expiry sweep on its own, returning the number of leases
    /// reclaimed. Every other operation already sweeps; this is the entry
    /// point for the periodic background task.
    pub async fn expire(&self) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let (_, _, expired) = self.sweep_locked().await?;
        Ok(expired)
    }

    /// Reclaim leases older than the lease duration. Must be called with the
    /// engine lock held. Returns the post-sweep view of both sets so callers
    /// don't re-read.
    ///
    /// Idempotent: with no elapsed time a second pass reclaims nothing.
    async fn sweep_locked(&self) -> Result<(Vec<AvailableEntry>, Vec<LeaseEntry>, usize)> {
        let mut available = self.available.list().await?;
        let leased = self.leased.list().await?;

        let now = now_millis();
        let lease_millis = self.lease_duration.as_millis() as u64;
        let (expired, live): (Vec<LeaseEntry>, Vec<LeaseEntry>) = leased
            .into_iter()
            .partition(|e| now.saturating_sub(e.claimed_at) > lease_millis);

        if expired.is_empty() {
            return Ok((available, live, 0));
        }

        // Shrinking set first, as everywhere else.
        self.leased.replace_all(&live).await?;
        for entry in &expired {
            available.push(AvailableEntry {
                record: entry.record.clone(),
                added_at: now,
            });
        }
        self.available.replace_all(&available).await?;

        for entry in &expired {
            self.events
                .append(
                    EventKind::Expired,
                    &format!("ip={} lease_id={}", entry.record.ip, entry.lease_id),
                )
                .await;
            info!(
                ip = entry.record.ip,
                lease_id = entry.lease_id,
                "expired lease reclaimed"
            );
        }
        metrics::counter!("pool_leases_expired_total").increment(expired.len() as u64);

        Ok((available, live, expired.len()))
    }
}

/// Mint a lease id: `lease_` plus 32 hex chars. Collision-resistant and
/// never reused for the life of the system.
fn new_lease_id() -> String {
    format!("lease_{}", uuid::Uuid::new_v4().as_simple())
}
