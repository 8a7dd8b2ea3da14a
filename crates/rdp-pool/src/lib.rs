//! Lease pool for remote-desktop credentials
//!
//! Manages a finite inventory of credential records (ip, username, password)
//! handed out to callers as exclusive, time-bounded leases. A producer
//! replenishes the pool via `add`; consumers take the oldest available
//! record via `claim` and hand it back via `release`, or the expiry sweep
//! reclaims it once the lease duration elapses.
//!
//! Credential lifecycle:
//! 1. Producer adds a record → it joins the available set (FIFO)
//! 2. Consumer claims → record moves to the leased set under a fresh lease id
//! 3. Consumer releases → record returns to the back of the available set
//! 4. Lease older than the configured duration → reclaimed by the lazy sweep
//!    that runs at the start of every operation (and optionally by a
//!    background task)
//!
//! Both sets persist through an ordered-list store contract; the durable
//! implementation is one delimited record per line with atomic writes. All
//! transitions are audited through an append-only event log.

pub mod engine;
pub mod error;
pub mod event;
pub mod record;
pub mod store;
pub mod sweep;

pub use engine::{ClaimedLease, FilePoolEngine, PoolEngine, PoolStatus, DEFAULT_LEASE_DURATION};
pub use error::{Error, Result};
pub use event::{EventKind, EventLog};
pub use record::{AvailableEntry, CredentialRecord, LeaseEntry};
pub use store::{LineFile, MemorySet, SetStore};
pub use sweep::spawn_sweep_task;
