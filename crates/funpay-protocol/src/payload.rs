use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ProtocolError;
use crate::objects::{ObjectKind, PollRequestObject, SubjectId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Out-of-band command sent alongside the subscriptions.
pub struct PollAction {
    pub action: String,
    pub data: Value,
}

impl PollAction {
    pub fn chat_message(chat_id: i64, content: impl Into<String>) -> Self {
        Self {
            action: "chat_message".to_string(),
            data: json!({"node": chat_id, "last_message": -1, "content": content.into()}),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
/// A poll request before serialization. At most one action by construction.
pub struct PollPayload {
    pub objects: Vec<PollRequestObject>,
    pub action: Option<PollAction>,
}

impl PollPayload {
    /// Number of distinct `(kind, subject_id)` pairs.
    pub fn distinct_objects(&self) -> usize {
        self.objects
            .iter()
            .map(PollRequestObject::key)
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn contains(&self, kind: &ObjectKind, subject_id: &SubjectId) -> bool {
        self.objects
            .iter()
            .any(|object| &object.kind == kind && &object.subject_id == subject_id)
    }
}

#[derive(Debug, Clone)]
/// Incrementally assembles a payload without ever exceeding the budget.
pub struct PollPayloadBuilder {
    budget: usize,
    payload: PollPayload,
}

impl PollPayloadBuilder {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            payload: PollPayload::default(),
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn remaining(&self) -> usize {
        self.budget.saturating_sub(self.payload.objects.len())
    }

    pub fn is_empty(&self) -> bool {
        self.payload.objects.is_empty()
    }

    /// Adds an object, replacing any object with the same identity.
    pub fn push_object(&mut self, object: PollRequestObject) -> Result<(), ProtocolError> {
        if let Some(existing) = self
            .payload
            .objects
            .iter_mut()
            .find(|existing| existing.kind == object.kind && existing.subject_id == object.subject_id)
        {
            *existing = object;
            return Ok(());
        }
        if self.payload.objects.len() >= self.budget {
            return Err(ProtocolError::BudgetExceeded {
                budget: self.budget,
                requested: self.payload.objects.len().saturating_add(1),
            });
        }
        self.payload.objects.push(object);
        Ok(())
    }

    pub fn with_action(mut self, action: PollAction) -> Self {
        self.payload.action = Some(action);
        self
    }

    pub fn build(self) -> PollPayload {
        self.payload
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Form-ready rendering of a [`PollPayload`].
pub struct EncodedPayload {
    pub objects: String,
    pub request: String,
    pub object_count: usize,
}

impl EncodedPayload {
    pub fn form_fields(&self, csrf_token: &str) -> [(&'static str, String); 3] {
        [
            ("objects", self.objects.clone()),
            ("request", self.request.clone()),
            ("csrf_token", csrf_token.to_string()),
        ]
    }
}

/// Serializes a payload, rejecting it if it would overflow `budget`.
pub fn encode(payload: &PollPayload, budget: usize) -> Result<EncodedPayload, ProtocolError> {
    let object_count = payload.distinct_objects();
    if object_count > budget {
        return Err(ProtocolError::BudgetExceeded {
            budget,
            requested: object_count,
        });
    }
    let objects = if payload.objects.is_empty() {
        String::new()
    } else {
        serde_json::to_string(&payload.objects)?
    };
    let request = match &payload.action {
        Some(action) => serde_json::to_string(action)?,
        None => "false".to_string(),
    };
    Ok(EncodedPayload {
        objects,
        request,
        object_count,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn unit_builder_replaces_duplicate_identity_without_consuming_budget() {
        let mut builder = PollPayloadBuilder::new(2);
        builder
            .push_object(PollRequestObject::chat_bookmarks(1, "first"))
            .expect("first push");
        builder
            .push_object(PollRequestObject::chat_bookmarks(1, "second"))
            .expect("replacement push");
        assert_eq!(builder.remaining(), 1);
        let payload = builder.build();
        assert_eq!(payload.objects.len(), 1);
        assert_eq!(payload.objects[0].tag, "second");
    }

    #[test]
    fn unit_builder_rejects_overflow() {
        let mut builder = PollPayloadBuilder::new(1);
        builder
            .push_object(PollRequestObject::chat_history(1))
            .expect("first push");
        let error = builder
            .push_object(PollRequestObject::chat_history(2))
            .expect_err("second push should overflow");
        assert!(matches!(
            error,
            ProtocolError::BudgetExceeded {
                budget: 1,
                requested: 2
            }
        ));
    }

    #[test]
    fn unit_encode_renders_form_fields() {
        let mut builder = PollPayloadBuilder::new(10);
        builder
            .push_object(PollRequestObject::orders_counters(5, "tagtagtag1"))
            .expect("push");
        let payload = builder.build();
        let encoded = encode(&payload, 10).expect("encode");
        assert_eq!(encoded.request, "false");
        assert_eq!(encoded.object_count, 1);
        let objects: Value = serde_json::from_str(&encoded.objects).expect("objects json");
        assert_eq!(objects[0]["type"], "orders_counters");
        assert_eq!(objects[0]["id"], 5);
        assert_eq!(objects[0]["data"], Value::Bool(false));

        let fields = encoded.form_fields("csrf");
        assert_eq!(fields[2], ("csrf_token", "csrf".to_string()));
    }

    #[test]
    fn unit_encode_action_only_payload_leaves_objects_empty() {
        let payload = PollPayloadBuilder::new(10)
            .with_action(PollAction::chat_message(9, "hello"))
            .build();
        let encoded = encode(&payload, 10).expect("encode");
        assert!(encoded.objects.is_empty());
        let request: Value = serde_json::from_str(&encoded.request).expect("request json");
        assert_eq!(request["action"], "chat_message");
        assert_eq!(request["data"]["node"], 9);
        assert_eq!(request["data"]["content"], "hello");
    }

    #[test]
    fn regression_encode_rejects_hand_built_payload_over_budget() {
        let payload = PollPayload {
            objects: (0..11).map(PollRequestObject::chat_history).collect(),
            action: None,
        };
        let error = encode(&payload, 10).expect_err("over budget");
        assert!(matches!(
            error,
            ProtocolError::BudgetExceeded {
                budget: 10,
                requested: 11
            }
        ));
    }

    proptest! {
        #[test]
        fn prop_builder_never_exceeds_budget(
            budget in 1usize..16,
            chat_ids in proptest::collection::vec(0i64..32, 0..64),
        ) {
            let mut builder = PollPayloadBuilder::new(budget);
            for chat_id in chat_ids {
                let _ = builder.push_object(PollRequestObject::chat_history(chat_id));
            }
            let payload = builder.build();
            prop_assert!(payload.distinct_objects() <= budget);
            prop_assert!(encode(&payload, budget).is_ok());
        }
    }
}
