//! # Valise Client
//!
//! The device runtime around `valise-engine`: a durable local store with a
//! degraded fallback, two interchangeable remote adapters (one-blob
//! snapshot or normalized per-row entities), a debounced push scheduler,
//! and an observable outbox for recovered settlement write-backs.
//!
//! The entry point is [`TripStore`]: open it from [`Config`], call
//! [`TripStore::load`] to hydrate and reconcile, then mutate away. Every
//! mutation lands locally first; remote propagation is best-effort.
//!
//! ```rust,no_run
//! use valise_client::{Config, TripStore};
//!
//! # async fn run() -> valise_client::Result<()> {
//! dotenvy::dotenv().ok();
//! let store = TripStore::open(&Config::from_env()?)?;
//! store.load().await?;
//!
//! store.add_checklist_item("Passport").await?;
//! let settlement = store.settlement().await;
//! println!("{} transfers suggested", settlement.transfers.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod local;
pub mod outbox;
pub mod remote;
pub mod scheduler;
pub mod store;

pub use config::{Config, RemoteConfig};
pub use error::{ClientError, Result};
pub use local::LocalStore;
pub use outbox::{EntryStatus, Outbox, OutboxEntry};
pub use remote::{ActivityPatch, EntityAdapter, RemoteAdapter, SnapshotAdapter, SyncMode};
pub use scheduler::{SyncScheduler, DEBOUNCE};
pub use store::{NewActivity, NewExpense, TripState, TripStore};
