//! Authentication: session tokens, password hashing, bearer middleware

pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::{AuthError, Claims, Principal, Subject, TokenService, TokenType};
pub use middleware::{require_auth, AuthState, AuthUser};
pub use password::{
    validate_password, Argon2HashProvider, HashProvider, PasswordError, PasswordValidationError,
    DUMMY_HASH,
};
