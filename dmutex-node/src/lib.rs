//! UDP process and resource sink for [`dmutex`].

#![warn(clippy::pedantic)]

pub mod args;
pub mod error;
pub mod input;
pub mod notifier;
pub mod transport;

pub use args::Args;
pub use error::NodeError;
pub use notifier::UdpResourceNotifier;
pub use transport::UdpTransport;
