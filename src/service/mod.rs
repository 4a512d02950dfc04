//! Services: generic CRUD over the safe SQL builder, request validation, and the
//! hand-written character queries.

mod characters;
mod crud;
mod validation;

pub use characters::{CharacterDetail, CharacterQueries};
pub use crud::{resolve_includes, CrudService, DEFAULT_LIMIT, MAX_LIMIT};
pub(crate) use crud::fetch_optional;
pub use validation::RequestValidator;
