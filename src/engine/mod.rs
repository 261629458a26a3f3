//! Declarative case model and the engine that runs it.

pub mod case;
pub mod executor;
pub mod substitute;

pub use case::{load, load_suite, Case, Dataset, Step};
pub use executor::{CaseEngine, CaseRun, DataRuns};
pub use substitute::{substitute, SubstitutionMode};
