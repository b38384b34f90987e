//! Continuous randomized property-test battery.
//!
//! A long-running driver that repeatedly picks a test case at random from a
//! registry of suites, executes it inside an isolated sandbox directory with
//! a reproducible seed, tolerates and records failures without stopping, and
//! writes a statistical pass/fail report when the wall-clock budget is spent.

pub mod driver;
pub mod error;
pub mod hooks;
pub mod record;
pub mod registry;
pub mod sampler;
pub mod sandbox;
pub mod session;

pub use driver::{run_case, Outcome};
pub use error::BatteryError;
pub use hooks::{Collaborators, NoopCollaborators, ShellCollaborators};
pub use record::{Counts, RecordKeeper, Report, ReportEntry};
pub use registry::{Case, CaseContext, CaseFn, Registry, Suite};
pub use sampler::Sampler;
pub use sandbox::{Sandbox, SandboxManager};
pub use session::{IterationRecord, Session, SessionConfig, SessionPhase};
