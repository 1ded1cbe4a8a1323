/// In-memory transport for end-to-end testing.
/// Messages cross as JSON text, the same way they would over a socket.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use log::trace;

use ripple_shared::{Message, MessageSender};

type Queue = Arc<Mutex<VecDeque<String>>>;

/// Pair of connected senders, one for each side, with the queues they fill
pub struct LocalTransportPair {
    pub server_sender: Arc<dyn MessageSender>,
    pub client_sender: Arc<dyn MessageSender>,
    to_client: Queue,
    to_server: Queue,
}

impl LocalTransportPair {
    pub fn new() -> Self {
        let to_client: Queue = Arc::new(Mutex::new(VecDeque::new()));
        let to_server: Queue = Arc::new(Mutex::new(VecDeque::new()));

        Self {
            server_sender: Arc::new(LocalSender {
                queue: to_client.clone(),
            }),
            client_sender: Arc::new(LocalSender {
                queue: to_server.clone(),
            }),
            to_client,
            to_server,
        }
    }

    /// Messages sent by the client, oldest first
    pub fn receive_on_server(&self) -> Vec<Message> {
        receive(&self.to_server)
    }

    /// Messages sent by the server, oldest first
    pub fn receive_on_client(&self) -> Vec<Message> {
        receive(&self.to_client)
    }

    pub fn in_flight(&self) -> usize {
        self.to_client.lock().unwrap().len() + self.to_server.lock().unwrap().len()
    }
}

impl Default for LocalTransportPair {
    fn default() -> Self {
        Self::new()
    }
}

struct LocalSender {
    queue: Queue,
}

impl MessageSender for LocalSender {
    fn send(&self, message: Message) {
        let payload = serde_json::to_string(&message).unwrap();
        trace!("send {}", payload);
        self.queue.lock().unwrap().push_back(payload);
    }
}

fn receive(queue: &Queue) -> Vec<Message> {
    queue
        .lock()
        .unwrap()
        .drain(..)
        .map(|payload| serde_json::from_str(&payload).unwrap())
        .collect()
}
