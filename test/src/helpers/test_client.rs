use ripple_client::{Client, ClientConfig, RemoteCallHandle};
use ripple_shared::{ObjectId, Session, Value};

use crate::{protocol, LocalTransportPair};

/// A client bound to a local transport
pub struct TestClient {
    pub client: Client,
}

impl TestClient {
    pub fn new(transport: &LocalTransportPair) -> Self {
        Self::with_config(ClientConfig::default(), transport)
    }

    pub fn offline(transport: &LocalTransportPair) -> Self {
        Self::with_config(
            ClientConfig {
                start_enabled: false,
            },
            transport,
        )
    }

    pub fn with_config(config: ClientConfig, transport: &LocalTransportPair) -> Self {
        let client =
            Client::new(config, protocol(), Some(transport.client_sender.clone())).unwrap();
        Self { client }
    }

    pub fn session(&self) -> &Session {
        self.client.session().unwrap()
    }

    /// Creates an object that survives garbage collection
    pub fn create_root(&mut self, template_name: &str) -> ObjectId {
        let object_id = self.client.create_object(template_name).unwrap();
        self.client.session_mut().unwrap().add_root(&object_id);
        object_id
    }

    pub fn get(&self, object_id: &ObjectId, property: &str) -> Value {
        self.client.get(object_id, property).unwrap().clone()
    }

    pub fn set(&mut self, object_id: &ObjectId, property: &str, value: impl Into<Value>) {
        self.client.set(object_id, property, value).unwrap();
    }

    pub fn call(&mut self, target: &ObjectId, name: &str, args: &[Value]) -> RemoteCallHandle {
        self.client.call(target, name, args).unwrap()
    }
}
