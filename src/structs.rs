//! Public data types: the client facade, the decoded identity and the basket snapshot.

pub mod basket;
pub mod client;
pub mod user;
