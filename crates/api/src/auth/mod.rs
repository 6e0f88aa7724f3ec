//! Authentication module

pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::{Claims, JwtError, JwtManager};
pub use middleware::{require_admin, require_auth, AuthState, AuthUser};
pub use password::{
    hash_password, validate_password, verify_password, PasswordError, PasswordValidationError,
};
