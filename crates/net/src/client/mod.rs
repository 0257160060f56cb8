//! Client side: the message router and the lock-step game session.

pub mod router;
pub mod session;

pub use router::MessageRouter;
pub use session::{ClientView, GameClient};
