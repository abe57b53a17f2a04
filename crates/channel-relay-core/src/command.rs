//! Canned replies for remote commands.

use crate::event::CommandInvocation;
use crate::ledger::CommandLedger;
use serde_json::{json, Value};

/// Number of entries in the generated menu listing.
pub const MENU_ITEM_COUNT: usize = 20;

/// Price step between consecutive menu items, in whole dollars.
pub const MENU_UNIT_PRICE: usize = 10;

/// Reply produced for one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPayload {
    /// Plain channel message.
    Text { content: String },
    /// Channel message carrying a single link button.
    LinkButton {
        content: String,
        label: String,
        url: String,
    },
}

impl ReplyPayload {
    /// Render the chat-platform interaction response: type 4, channel
    /// message with source. Link buttons become a single action row with one
    /// style-5 (link) button.
    pub fn into_interaction_response(self) -> Value {
        match self {
            Self::Text { content } => json!({
                "type": 4,
                "data": {
                    "content": content,
                },
            }),
            Self::LinkButton {
                content,
                label,
                url,
            } => json!({
                "type": 4,
                "data": {
                    "content": content,
                    "components": [{
                        "type": 1,
                        "components": [{
                            "type": 2,
                            "style": 5,
                            "label": label,
                            "url": url,
                        }],
                    }],
                },
            }),
        }
    }
}

/// Answers the registered remote commands.
///
/// `menu` and `buy` have dedicated replies; every other name, including the
/// registered placeholders (`command3` through `command5`) and names never
/// registered at all, shares the generic acknowledgement.
#[derive(Debug, Clone)]
pub struct CommandResponder {
    payment_link_url: String,
}

impl CommandResponder {
    pub fn new(payment_link_url: impl Into<String>) -> Self {
        Self {
            payment_link_url: payment_link_url.into(),
        }
    }

    /// Answer one invocation.
    ///
    /// The ledger entry is written before the reply is built, so the
    /// invocation is recorded even for names the responder has no dedicated
    /// reply for.
    pub fn respond(&self, invocation: CommandInvocation, ledger: &CommandLedger) -> ReplyPayload {
        ledger.record(invocation.clone());

        match invocation.command_name.as_str() {
            "menu" => ReplyPayload::Text {
                content: menu_text(),
            },
            "buy" => ReplyPayload::LinkButton {
                content: "Ready to check out? Use the button below.".to_string(),
                label: "Proceed to payment".to_string(),
                url: self.payment_link_url.clone(),
            },
            name => ReplyPayload::Text {
                content: format!("Command {} received and processed.", name),
            },
        }
    }
}

/// The fixed menu listing: numbered lines with the price rising by
/// [`MENU_UNIT_PRICE`] per item.
pub fn menu_text() -> String {
    (1..=MENU_ITEM_COUNT)
        .map(|n| format!("Item {}: ${}", n, n * MENU_UNIT_PRICE))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
