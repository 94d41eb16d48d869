use serde_json::Value;

use crate::actions::Action;
use crate::types::{GameState, MapState};

#[derive(Debug)]
pub enum InboundMessage {
    Start { state: MapState },
    Tick { state: GameState },
    // A tick whose state did not parse. It still owes the game an answer.
    MalformedTick { tick: Option<u64> },
    End,
}

pub fn parse_inbound(raw: &str) -> Option<InboundMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "start" => {
            let state = match object.get("state") {
                None => MapState::default(),
                Some(value) => serde_json::from_value(value.clone()).ok()?,
            };
            Some(InboundMessage::Start { state })
        }
        "tick" => {
            let state = object.get("state");
            match state.map(|value| serde_json::from_value::<GameState>(value.clone())) {
                Some(Ok(state)) => Some(InboundMessage::Tick { state }),
                _ => Some(InboundMessage::MalformedTick {
                    tick: state
                        .and_then(|value| value.get("tick"))
                        .and_then(Value::as_u64),
                }),
            }
        }
        "end" => Some(InboundMessage::End),
        _ => None,
    }
}

pub fn encode_actions(actions: &[Action]) -> serde_json::Result<String> {
    serde_json::to_string(actions)
}
