use serde::{Deserialize, Serialize};

use crate::models::ScreeningResult;

/// One decoded event from the batch progress stream, dispatched on the JSON `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Start {
        total: u32,
    },
    Result(ScreeningResult),
    Complete(Completion),
}

impl ProgressEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ProgressEvent::Start { .. } => "start",
            ProgressEvent::Result(_) => "result",
            ProgressEvent::Complete(_) => "complete",
        }
    }
}

/// Terminal success event. `processed` may be lower than the announced total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    #[serde(alias = "sessionId")]
    pub session_id: String,
    pub processed: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_start() {
        let event: ProgressEvent = serde_json::from_str(r#"{"type":"start","total":3}"#).unwrap();
        assert_eq!(event, ProgressEvent::Start { total: 3 });
    }

    #[test]
    fn test_decode_result_with_optional_fields_missing() {
        let event: ProgressEvent = serde_json::from_str(
            r#"{"type":"result","index":1,"filename":"a.pdf","score":80}"#,
        )
        .unwrap();
        match event {
            ProgressEvent::Result(r) => {
                assert_eq!(r.index, 1);
                assert_eq!(r.score, 80);
                assert!(r.matching_skills.is_empty());
            }
            other => panic!("expected result, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_complete_camel_case() {
        let event: ProgressEvent =
            serde_json::from_str(r#"{"type":"complete","sessionId":"s1","processed":3}"#).unwrap();
        assert_eq!(
            event,
            ProgressEvent::Complete(Completion {
                session_id: "s1".to_string(),
                processed: 3
            })
        );
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        assert!(serde_json::from_str::<ProgressEvent>(r#"{"type":"heartbeat"}"#).is_err());
    }
}
