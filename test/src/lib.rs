pub mod helpers;
pub mod local_transport;
pub mod test_protocol;

pub use helpers::*;
pub use local_transport::LocalTransportPair;
pub use test_protocol::{protocol, BankPlugin};
