//! HTTP handlers for entity CRUD and the character queries.

pub mod characters;
pub mod entity;
