use ripple_server::{Controller, RestoreSessionCallback, Server, ServerConfig};
use ripple_shared::{Message, ReplicaError, Session, SessionId, SubscriptionId};

use crate::{protocol, LocalTransportPair};

/// A server with a single session bound to a local transport
pub struct TestServer {
    pub server: Server,
    pub session_id: SessionId,
    pub subscription_id: SubscriptionId,
}

impl TestServer {
    pub fn new(transport: &LocalTransportPair) -> Self {
        Self::with_config(ServerConfig::default(), transport)
    }

    pub fn with_config(config: ServerConfig, transport: &LocalTransportPair) -> Self {
        let mut server = Server::new(config, protocol());
        let (session_id, subscription_id) = server
            .create_session(transport.server_sender.clone(), None)
            .unwrap();
        Self {
            server,
            session_id,
            subscription_id,
        }
    }

    pub fn with_controller<C: Controller + 'static>(mut self, controller: C) -> Self {
        self.server.set_controller(controller);
        self
    }

    pub fn session(&self) -> &Session {
        self.server.session(self.session_id).unwrap()
    }

    pub fn session_mut(&mut self) -> &mut Session {
        self.server.session_mut(self.session_id).unwrap()
    }

    pub async fn process(
        &mut self,
        message: Message,
        restore_session: Option<RestoreSessionCallback>,
    ) -> Result<(), ReplicaError> {
        self.server
            .process_message(self.session_id, self.subscription_id, message, restore_session)
            .await
    }
}
