//! Domain models shared between desk-server and its clients

pub mod agent;
pub mod assignment;
pub mod sla;
pub mod ticket;

pub use agent::*;
pub use assignment::*;
pub use sla::*;
pub use ticket::*;
