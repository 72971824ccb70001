//! Fleetplane Core - resource model, parameter validation and rendering

pub mod error;
pub mod parameter;
pub mod render;
pub mod resource;
pub mod store;
pub mod types;
pub mod validation;

pub use error::{Error, Result};
pub use parameter::*;
pub use render::*;
pub use resource::*;
pub use store::{Notifier, ResourceStore, StaticTypes};
pub use types::*;
pub use validation::{FieldViolation, ValidationError, ValidationErrors};
