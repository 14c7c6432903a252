//! Domain services. Each one takes its store dependencies by trait object so
//! tests run against the in-memory backends.

pub mod api_key;
pub mod auth;
pub mod jwt;
pub mod keys;
pub mod rate_limit;
pub mod revocation;
pub mod scope;
pub mod team;

pub use auth::{AuthContext, AuthOptions, AuthService, Authenticator, Credential, CredentialKind};
pub use jwt::JwtService;
pub use keys::ApiKeyService;
pub use rate_limit::{RateCategory, RateLimitService};
pub use revocation::{MemoryRevocationStore, RedisRevocationStore, RevocationStore};
pub use team::TeamService;
