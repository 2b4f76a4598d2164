use std::collections::BTreeMap;

use serde_json::Value;

use crate::foundation::props::{PropsExt, as_num};

/// Built-in behavior selected by an element's `action` key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Tapping plays the page; the element hides while the page plays.
    Play,
}

impl Action {
    pub fn parse(v: Option<&Value>) -> Option<Self> {
        match v?.as_str()? {
            "play" => Some(Self::Play),
            other => {
                tracing::debug!(action = other, "unknown element action");
                None
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Play,
    Pause,
    GoTo(usize),
    Next,
    Previous,
    Unknown(String),
}

impl Command {
    fn parse(name: &str, arg: &Value) -> Self {
        match name {
            "play" => Self::Play,
            "pause" => Self::Pause,
            "next" => Self::Next,
            "prev" | "previous" => Self::Previous,
            "goto" => {
                let page = as_num(arg).or_else(|| arg.as_object().and_then(|o| o.num("page")));
                match page {
                    Some(p) if p >= 0.0 => Self::GoTo(p as usize),
                    _ => Self::Unknown(name.to_owned()),
                }
            }
            other => Self::Unknown(other.to_owned()),
        }
    }
}

/// Event name → commands, from an `events` table such as
/// `{"tapped": {"actions": [{"play": {}}, {"goto": {"page": 2}}]}}`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventTable {
    handlers: BTreeMap<String, Vec<Command>>,
}

impl EventTable {
    pub fn parse(v: Option<&Value>) -> Self {
        let Some(table) = v.and_then(Value::as_object) else {
            return Self::default();
        };
        let handlers = table
            .iter()
            .map(|(event, handler)| {
                let actions = handler
                    .as_array()
                    .or_else(|| handler.as_object().and_then(|h| h.array("actions")));
                let commands = actions
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_object)
                    .flat_map(|a| a.iter().map(|(name, arg)| Command::parse(name, arg)))
                    .collect();
                (event.clone(), commands)
            })
            .collect();
        Self { handlers }
    }

    pub fn commands(&self, event: &str) -> &[Command] {
        self.handlers.get(event).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/element/action.rs"]
mod tests;
