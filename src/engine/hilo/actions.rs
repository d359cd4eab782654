use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::ActionError;
use super::types::{Chips, Declaration};

/// Player move with its payload attached to the variant that needs it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
pub enum PlayerAction {
    Check,
    Call,
    /// `raise_amount` is added on top of the seat's current street bet.
    Raise { raise_amount: Chips },
    Fold,
    Declare { declaration: Declaration },
}

impl PlayerAction {
    pub fn kind(&self) -> &'static str {
        match self {
            PlayerAction::Check => "check",
            PlayerAction::Call => "call",
            PlayerAction::Raise { .. } => "raise",
            PlayerAction::Fold => "fold",
            PlayerAction::Declare { .. } => "declare",
        }
    }

    /// Builds an action from a loosely typed `(kind, payload)` pair as sent by clients.
    pub fn from_wire(kind: &str, payload: &Value) -> Result<Self, ActionError> {
        match kind {
            "check" => Ok(PlayerAction::Check),
            "call" => Ok(PlayerAction::Call),
            "fold" => Ok(PlayerAction::Fold),
            "raise" => {
                let raise_amount = payload
                    .get("raise_amount")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| ActionError::InvalidPayload {
                        action: kind.to_string(),
                        reason: "expected a non-negative integer raise_amount".into(),
                    })?;
                Ok(PlayerAction::Raise { raise_amount })
            }
            "declare" => {
                let declaration = payload
                    .get("declaration")
                    .cloned()
                    .map(serde_json::from_value::<Declaration>)
                    .transpose()
                    .map_err(|err| ActionError::InvalidPayload {
                        action: kind.to_string(),
                        reason: err.to_string(),
                    })?
                    .ok_or_else(|| ActionError::InvalidPayload {
                        action: kind.to_string(),
                        reason: "missing declaration".into(),
                    })?;
                Ok(PlayerAction::Declare { declaration })
            }
            other => Err(ActionError::UnknownAction(other.to_string())),
        }
    }

    /// Payload half of the wire form, used for the action log.
    pub fn payload(&self) -> Value {
        match self {
            PlayerAction::Raise { raise_amount } => {
                serde_json::json!({ "raise_amount": raise_amount })
            }
            PlayerAction::Declare { declaration } => {
                serde_json::json!({ "declaration": declaration })
            }
            _ => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::serde::assert_round_trip_eq;
    use serde_json::json;

    #[test]
    fn wire_form_parses_each_kind() {
        assert_eq!(
            PlayerAction::from_wire("raise", &json!({ "raise_amount": 20 })),
            Ok(PlayerAction::Raise { raise_amount: 20 })
        );
        assert_eq!(
            PlayerAction::from_wire("declare", &json!({ "declaration": "both" })),
            Ok(PlayerAction::Declare {
                declaration: Declaration::Both
            })
        );
        assert_eq!(
            PlayerAction::from_wire("check", &Value::Null),
            Ok(PlayerAction::Check)
        );
    }

    #[test]
    fn unknown_kind_and_bad_payloads_are_rejected() {
        assert_eq!(
            PlayerAction::from_wire("bet", &Value::Null),
            Err(ActionError::UnknownAction("bet".into()))
        );
        assert!(matches!(
            PlayerAction::from_wire("raise", &json!({ "raise_amount": -5 })),
            Err(ActionError::InvalidPayload { .. })
        ));
        assert!(matches!(
            PlayerAction::from_wire("declare", &json!({ "declaration": "middle" })),
            Err(ActionError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn tagged_json_shape_is_stable() {
        let raise = PlayerAction::Raise { raise_amount: 30 };
        assert_eq!(
            serde_json::to_value(raise).unwrap(),
            json!({ "action": "raise", "payload": { "raise_amount": 30 } })
        );
        assert_round_trip_eq(&raise);
        assert_round_trip_eq(&PlayerAction::Fold);
        assert_eq!(raise.payload(), json!({ "raise_amount": 30 }));
    }
}
