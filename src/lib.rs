#![deny(rust_2018_idioms)]

pub mod condition;
pub mod config;
pub mod domain;
pub mod editor;
pub mod error;
pub mod host;
pub mod io;
pub mod replay;
pub mod schedule;
pub mod session;
pub mod store;
pub mod uniqueness;
mod util;
pub mod validators;
pub mod visibility;

pub use condition::{ConditionAction, ConditionDescriptor, Operator};
pub use config::{EngineOptions, FieldInstanceConfig, ViewAllText};
pub use domain::{DomainConfig, QueryDomain};
pub use editor::{EditorKind, FieldEditor, FieldReport};
pub use error::{EntryGuardError, Misconfiguration, QueryError};
pub use replay::{Fixture, ReplayReport};
pub use session::EntrySession;
pub use store::{ValidationKey, ValidationState, ValidationStore};
pub use uniqueness::UniquenessChecker;
pub use visibility::{Visibility, VisibilityController};

pub mod prelude {
    pub use super::host::{EntryApi, EntryQuery, FieldApi, FieldDefinition, FieldType};
    pub use super::{
        EngineOptions, EntryGuardError, EntrySession, FieldEditor, FieldInstanceConfig,
        ValidationStore,
    };
}
