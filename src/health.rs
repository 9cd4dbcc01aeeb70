//! Database connectivity tracking
//!
//! The current [`Connectivity`] lives in a watch channel. Only the
//! connection lifecycle (the connector task below) changes it; request
//! handlers take a snapshot at the start of each request and pass it to
//! [`StorageRouter::backend`].

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use crate::config::DatabaseTarget;
use crate::router::StorageRouter;
use crate::storage::SqliteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Connected,
    Disconnected,
}

impl Connectivity {
    pub fn is_connected(&self) -> bool {
        matches!(self, Connectivity::Connected)
    }
}

/// Shared handle to the current connectivity
#[derive(Clone)]
pub struct HealthMonitor {
    state: Arc<watch::Sender<Connectivity>>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthMonitor {
    /// Starts disconnected until the first successful connection
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Connectivity::Disconnected);
        Self { state: Arc::new(tx) }
    }

    pub fn current(&self) -> Connectivity {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.state.subscribe()
    }

    /// Connection established. Returns true on a transition.
    pub fn connected(&self) -> bool {
        let changed = self.transition(Connectivity::Connected);
        if changed {
            tracing::info!("Database connection established, serving from database");
        }
        changed
    }

    /// Connection failed or was lost. Returns true on a transition.
    pub fn connection_error(&self, err: &dyn Display) -> bool {
        let changed = self.transition(Connectivity::Disconnected);
        if changed {
            tracing::warn!("Database connection error, falling back to data file: {}", err);
        } else {
            tracing::debug!("Database still unavailable: {}", err);
        }
        changed
    }

    fn transition(&self, next: Connectivity) -> bool {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        })
    }
}

/// Open the database, then keep probing it.
///
/// While disconnected the database is reopened every `interval`; while
/// connected it is pinged every `interval`. A failed ping detaches the
/// handle from the router and flips the monitor to disconnected.
pub async fn run_connector(
    target: DatabaseTarget,
    router: Arc<StorageRouter>,
    monitor: HealthMonitor,
    interval: Duration,
) {
    loop {
        connect_once(&target, &router, &monitor);
        tokio::time::sleep(interval).await;
    }
}

/// One connector step
pub fn connect_once(target: &DatabaseTarget, router: &StorageRouter, monitor: &HealthMonitor) {
    match router.database() {
        Some(db) => {
            if let Err(e) = db.ping() {
                router.detach_database();
                monitor.connection_error(&e);
            }
        }
        None => match SqliteStore::open_target(target) {
            Ok(store) => {
                router.attach_database(Arc::new(store));
                monitor.connected();
            }
            Err(e) => {
                monitor.connection_error(&e);
            }
        },
    }
}
