//! Adapters Layer
//!
//! Concrete transports, responders and the background tasks that connect
//! them to the harness.

pub mod bus_sink;
pub mod channel;
pub mod expiry;
pub mod receipt;
pub mod responder;
pub mod socket;
pub mod socket_server;

pub use channel::{
    channel_link, ChannelEndpoint, ChannelResponder, ChannelResponderHandle, ChannelTransport,
};
pub use expiry::expiry_task;
pub use receipt::run_receipt_loop;
pub use socket::SocketTransport;
pub use socket_server::{SocketResponder, SocketResponderHandle, SocketServerToggle};
