// snowmix-api: Async session client for the Snowmix control protocol

pub mod error;
pub mod session;
pub mod tcp;
pub mod transport;

pub use error::Error;
pub use session::{Response, SendOptions, Session};
pub use tcp::TcpSession;
pub use transport::TransportConfig;
