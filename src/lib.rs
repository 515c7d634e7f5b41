//! Client core for the cocktail ordering API.
//!
//! [`Client`] owns an explicit session context: the JWT credential and its decoded
//! claims, the auto-logout timer, the basket mirror and the route guard. Every call
//! goes through the [`gateway::Gateway`], which refuses to send a credential known
//! to be expired and ends the session on a 401.

pub mod basket;
pub mod claims;
pub mod errors;
pub mod gateway;
pub mod notices;
pub mod options;
pub mod router;
pub mod session;
pub mod storage;
pub mod structs;
pub mod timer;
pub mod transport;

pub use claims::ClaimMapping;
pub use errors::ClientError;
pub use options::{AuthHeader, ClientOptions, Landing};
pub use session::{EndReason, Session, SessionState};
pub use structs::basket::Basket;
pub use structs::client::Client;
pub use structs::user::Claims;
