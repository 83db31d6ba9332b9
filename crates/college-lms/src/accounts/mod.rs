//! Student and staff accounts: registration and e-mail verification.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{NewUser, Registration, Role, User};
pub use repository::AccountRepository;
pub use router::account_router;
pub use service::{AccountError, AccountService};
