// bantay-api: transport links to the BantayBot boards and the cloud store

pub mod cloud;
pub mod dial;
pub mod error;
pub mod frame;
pub mod link;

pub use cloud::{CloudBackend, RestCloudClient};
pub use dial::{Dialer, FrameSink, FrameStream, WebSocketDialer};
pub use error::Error;
pub use link::{BoardRole, Endpoint, LinkSignal, LinkState, TransportLink};
