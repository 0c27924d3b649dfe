pub mod backoff;
pub mod correlator;
pub mod manager;
pub mod mock;
pub mod state;
pub mod transport;

pub use backoff::Backoff;
pub use correlator::Correlator;
pub use manager::{ConnectionManager, SubmitOutcome};
pub use state::{ConnectionPhase, ConnectionState};
pub use transport::{
    ChannelConnector, ChannelEvent, ChannelWriter, HttpTransport, StatelessTransport,
    WebSocketConnector,
};
