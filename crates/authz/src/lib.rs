//! Cosign Authz - the authorization engine
//!
//! Given a proposed transaction, decide ALLOW, DENY or PENDING:
//! - `InitiatorStore`: rules, groups and public keys per initiator
//! - `Orchestrator`: evaluates the applicable rules and creates pending records
//! - `Processor`: verifies signed envelopes and dispatches typed `Request`s
//! - `FamilyRegistry`: per-family lanes serializing administrative mutations

pub mod error;
pub mod initiator;
pub mod orchestrator;
pub mod processor;
pub mod query;
pub mod recipient;
pub mod registry;
pub mod request;

pub use error::{AuthzError, AuthzResult, ErrorKind};
pub use initiator::InitiatorStore;
pub use orchestrator::Orchestrator;
pub use processor::Processor;
pub use query::{AuthQuery, Decision};
pub use recipient::RecipientStore;
pub use registry::{FamilyLease, FamilyRegistry};
pub use request::{Request, Response, SignatureStatus};
