//! The session-message pipeline consumers.

pub mod buffer;
pub mod consumer;

use tracing::warn;

use lattice_core::{topics, LatticeError};
use lattice_mq::Broker;

use crate::deps::Deps;

/// Register the pipeline consumers on the broker. Undecodable bodies are
/// validation errors; logged and dropped, never redelivered.
pub fn register(broker: &mut Broker, deps: Deps) {
    let d = deps.clone();
    broker.subscribe(topics::NEW_MESSAGE, move |body| {
        let deps = d.clone();
        async move { buffer::insert_new_message(&deps, decode(body)?).await }
    });

    broker.subscribe(topics::BUFFERED_MESSAGE, move |body| {
        let deps = deps.clone();
        async move { consumer::buffer_new_message(&deps, decode(body)?).await }
    });
}

fn decode(body: serde_json::Value) -> lattice_core::Result<topics::InsertNewMessage> {
    serde_json::from_value(body).map_err(|e| {
        warn!("undecodable session message body: {e}");
        LatticeError::Validation(format!("bad message body: {e}"))
    })
}
