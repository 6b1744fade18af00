//! Account user management

mod user;

pub use user::IamUserResource;
