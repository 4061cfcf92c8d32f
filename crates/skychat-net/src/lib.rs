// Connection handling over the mesh transport: length-prefixed JSON frames,
// dial with retry, accept loop and a single inbound message stream.

pub mod error;
pub mod frame;
pub mod handler;
pub mod retry;
pub mod transport;

pub use error::{FrameError, NetError};
pub use handler::{ConnectionHandler, HandlerConfig, HandlerStreams};
pub use retry::RetryPolicy;
pub use transport::memory::{MemoryNetwork, MemoryTransport};
pub use transport::tcp::TcpTransport;
pub use transport::{BoxStream, Connection, Listener, Transport};
