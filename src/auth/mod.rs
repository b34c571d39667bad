pub mod credentials;
pub mod errors;
pub mod guard;
pub mod jwt;
pub mod password;

pub use credentials::{CredentialStore, UserRecord};
pub use errors::AuthError;
pub use guard::require_role;
pub use jwt::{Principal, TokenService, TokenServiceConfig};
pub use password::PasswordHasher;
