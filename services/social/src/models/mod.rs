//! Social service models

pub mod follow;
pub mod post;
pub mod user;
pub mod verification_token;

// Re-export for convenience
pub use follow::Follow;
pub use post::{NewPost, Post};
pub use user::{AccountType, LoginCredentials, NewUser, SignupRequest, UpdateProfile, User};
pub use verification_token::VerificationToken;
