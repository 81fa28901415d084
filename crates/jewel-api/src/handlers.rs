//! Request handlers.

pub mod account;
pub mod generate;
pub mod health;
pub mod profile;
pub mod users;

pub use account::*;
pub use generate::*;
pub use health::*;
pub use profile::*;
pub use users::*;
