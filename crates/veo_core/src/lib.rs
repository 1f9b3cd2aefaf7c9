//! # veo_core
//!
//! Migration engine moving media items to an OpenVeo publishing service.
//!
//! Each item goes through a fixed, linear sequence of reversible steps. When
//! a step fails, the steps already done are undone in reverse order so the
//! item ends up where it started.
//!
//! # Architecture
//!
//! - **Machine**: generic linear state machine with forward and rollback transitions
//! - **Transitions**: the migration steps (upload, wait, publish, swap references, ...)
//! - **Provider**: storage of items and migration records
//! - **Publisher**: client of the remote publishing service
//! - **Driver**: picks eligible items and migrates them one at a time
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use veo_core::{MigrationConfig, MigrationServices, Migrator, TracingSink};
//!
//! let services = MigrationServices::new(
//!     Arc::new(store),
//!     Arc::new(publisher),
//!     Arc::new(TracingSink),
//!     MigrationConfig::new("vimeo"),
//! );
//! let report = Migrator::new(services).run_pending().await?;
//! ```

pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod events;
pub mod machine;
pub mod migration;
pub mod planning;
pub mod provider;
pub mod publisher;
pub mod record;
pub mod state;
pub mod transitions;

// Re-export main types for convenience
pub use config::{MigrationConfig, NameFormats};
pub use context::{ContextKind, ItemContext, MigrationContext};
pub use driver::{ItemOutcome, MigrationReport, Migrator};
pub use error::{CoreError, CoreResult};
pub use events::{EventSink, JsonLinesSink, MigrationEvent, MultiSink, RecordingSink, TracingSink};
pub use machine::{Catalogue, MachineHooks, NoOperation, StateMachine, Transition, TransitionEntry};
pub use migration::{migration_catalogue, MigrationCatalogue, MigrationHooks, MigrationMachine};
pub use planning::{check_supported, Planner};
pub use provider::ItemProvider;
pub use publisher::{
    ClientError, ClientResult, PublishingClient, RemoteState, UploadMetadata, UploadRequest,
};
pub use record::{
    ContextId, FileField, Item, ItemId, ItemTemplate, MigrationRecord, RecordId, RecordUpdate,
    ReferenceTarget,
};
pub use state::{MigrationState, MigrationStatus};
pub use transitions::MigrationServices;
