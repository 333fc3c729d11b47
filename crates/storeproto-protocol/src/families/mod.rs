//! The three protocol families and their message tables.

pub mod auth;
pub mod core;
pub mod main;

pub use self::auth::Auth;
pub use self::core::Core;
pub use self::main::Main;
