//! Change identifier generation

use uuid::Uuid;

/// Generate a fresh opaque change identifier.
///
/// Identifiers are compared only for equality, never for ordering. 122
/// random bits make cross-peer collisions vanishingly unlikely.
pub fn new_change_id() -> String {
    Uuid::new_v4().simple().to_string()
}
