//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - A `Deserialize` update DTO (all `Option` fields) where patching exists

pub mod campaign;
pub mod event;
pub mod recipient;
pub mod status;
pub mod target;
