//! External collaborators: the native binding seam, platform permissions,
//! and logging setup.

pub mod binding;
pub mod logging;
pub mod permissions;
