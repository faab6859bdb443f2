mod server_io;
mod tls;
mod transport;

pub use server_io::{LineBuffer, LineWriteErr, MessagePollErr, ServerIo};
pub use transport::{registration, ConnectErr, Transport, TransportErr, CONNECT_TIMEOUT};
