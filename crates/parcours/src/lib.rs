//! argile-parcours: the applicant journey engine.
//!
//! - [`progression`] moves a journey to its next step once the current one
//!   is validated.
//! - [`sync`] pulls dossier status from Démarches Simplifiées and feeds
//!   progression.
//! - [`webhook`] records transactional-email events against sent
//!   notifications.
//!
//! [`ParcoursEngine`] wires them to one store. Every service returns
//! `Result<_, ParcoursError>`; [`ActionResult`] is the boundary shape.

pub mod clock;
pub mod config;
pub mod ds;
mod engine;
mod error;
pub mod progression;
mod result;
pub mod sync;
pub mod webhook;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, DemarcheIds, DsSettings, ServerSettings, Settings};
pub use ds::{DossierSnapshot, DossierSource, DsError, DsUrls, StaticDossierSource};
pub use engine::{JourneyOverview, ParcoursEngine};
pub use error::ParcoursError;
pub use progression::{ProgressionOutcome, ProgressionService};
pub use result::ActionResult;
pub use sync::{StepSyncReport, SyncAllReport, SyncOutcome, SyncService, DEFAULT_SYNC_MAX_AGE};
pub use webhook::{EmailTrackingService, EmailWebhookPayload, TrackedEvent, WebhookOutcome};

#[cfg(feature = "graphql")]
pub use ds::GraphqlDossierSource;
