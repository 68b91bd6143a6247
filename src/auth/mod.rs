/// Authentication module
///
/// Token signing/verification, password hashing, refresh-token generation,
/// and the login/refresh/logout services built on them.

mod claims;
mod jwt;
mod password;
mod refresh_token;
mod rotation;
mod service;

pub use claims::{AuthenticatedUser, Claims, Role};
pub use jwt::TokenCodec;
pub use password::{hash_password, verify_password};
pub use refresh_token::{generate_refresh_token, hash_token};
pub use service::{AuthService, TokenPair};
