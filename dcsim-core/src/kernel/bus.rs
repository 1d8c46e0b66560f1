//! Event bus: a process implementing publish/subscribe fan-out. Does not
//! preserve the original publisher's identity — callers needing it encode
//! it in the event.

use super::event::Message;
use super::process::{Context, Process, ProcessId};
use std::collections::BTreeSet;

#[derive(Default)]
pub struct EventBus {
    subscribers: BTreeSet<ProcessId>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Process for EventBus {
    fn handle(&mut self, ctx: &mut Context<'_>, from: Option<ProcessId>, msg: Message) -> anyhow::Result<()> {
        match msg {
            Message::PreStart => {}
            Message::Subscribe => {
                if let Some(sender) = from {
                    // Subscribing twice has the same effect as once.
                    self.subscribers.insert(sender);
                }
            }
            Message::Unsubscribe => {
                if let Some(sender) = from {
                    // Unsubscribing an unknown subscriber is a no-op.
                    self.subscribers.remove(&sender);
                }
            }
            Message::Publish(event) => {
                // Delivery to subscribers uses the same kernel send path, so
                // subscription-order effects are FIFO-within-tick.
                for sub in &self.subscribers {
                    ctx.send(sub, Message::Publish(event.clone()), 0)?;
                }
            }
            other => {
                tracing::warn!(process = %ctx.self_id(), ?other, "event bus ignoring unexpected message");
            }
        }
        Ok(())
    }
}
