//! Entity and state model for the library catalogue: item identity, circulation state,
//! transitions between states, query filters, and the error vocabulary shared by the
//! store and the search controller.

pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod protocol;

pub use domain::{Category, Item, ItemId, ItemState, PatronId, Status};
pub use error::{CatalogueError, ErrorCode, ErrorReport};
pub use lifecycle::{Transition, TransitionKind};
pub use protocol::{CatalogueEvent, ItemFilter, SearchResults};
