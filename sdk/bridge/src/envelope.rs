//! # Response Envelopes
//!
//! JSON endpoints answer in one of a handful of shapes: a started job
//! (`jobIds`), a top-level `errorCode`, a nested `error` object, a
//! `response` array, or a `genericError` block. [`classify`] folds all of
//! them into one [`Envelope`]; the `expect_*` helpers turn an envelope into
//! the result an operation needs and log every failure they surface.

use log::error;
use serde_json::Value;

use policy_engine::wire::{as_i64, as_u64};

use crate::error::RemoteError;
use crate::job::{JobHandle, TaskOutcome};
use crate::transport::ApiResponse;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    Jobs(Vec<u64>),
    Scheduled(u64),
    Failure { code: i64, message: String },
    Success,
    Unrecognized,
}

pub fn classify(body: &Value) -> Envelope {
    if let Some(ids) = body.get("jobIds").and_then(Value::as_array) {
        let ids: Vec<u64> = ids.iter().filter_map(as_u64).collect();
        if !ids.is_empty() {
            return Envelope::Jobs(ids);
        }
    }
    if let Some(code) = body.get("errorCode") {
        return from_code(code, body);
    }
    if let Some(error) = body.get("error").filter(|e| e.is_object()) {
        return match error.get("errorCode") {
            Some(code) => from_code(code, error),
            None => Envelope::Failure {
                code: -1,
                message: message_of(error),
            },
        };
    }
    if let Some(first) = body
        .get("response")
        .and_then(Value::as_array)
        .and_then(|entries| entries.first())
    {
        if let Some(code) = first.get("errorCode") {
            return from_code(code, first);
        }
    }
    if let Some(code) = body.pointer("/genericError/errorCode") {
        return from_code(code, &body["genericError"]);
    }
    if let Some(task_id) = body.get("taskId").and_then(as_u64) {
        return Envelope::Scheduled(task_id);
    }
    Envelope::Unrecognized
}

fn from_code(code: &Value, holder: &Value) -> Envelope {
    match as_i64(code) {
        Some(0) => Envelope::Success,
        Some(code) => Envelope::Failure {
            code,
            message: message_of(holder),
        },
        None => Envelope::Unrecognized,
    }
}

fn message_of(holder: &Value) -> String {
    ["errorMessage", "errorString", "warningMessage"]
        .iter()
        .filter_map(|key| holder.get(*key).and_then(Value::as_str))
        .find(|m| !m.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Logs a failure on its way to the caller.
pub(crate) fn surface(err: RemoteError) -> RemoteError {
    error!("{}", err);
    err
}

fn server_error(operation: &str, code: i64, message: String) -> RemoteError {
    surface(RemoteError::Server {
        operation: operation.to_string(),
        code,
        message,
    })
}

fn unexpected(operation: &str, body: &Value) -> RemoteError {
    surface(RemoteError::Unexpected {
        operation: operation.to_string(),
        body: body.to_string(),
    })
}

/// Checks the status and decodes a non-empty JSON body.
pub fn decode(operation: &str, response: &ApiResponse) -> Result<Value, RemoteError> {
    if !response.success {
        return Err(surface(RemoteError::Status {
            operation: operation.to_string(),
            status: response.status,
            body: response.text.clone(),
        }));
    }
    if response.text.trim().is_empty() {
        return Err(surface(RemoteError::EmptyBody {
            operation: operation.to_string(),
        }));
    }
    serde_json::from_str(&response.text).map_err(|e| {
        surface(RemoteError::Undecodable {
            operation: operation.to_string(),
            message: e.to_string(),
        })
    })
}

/// Requires an explicit success code (or a started job).
pub fn expect_success(operation: &str, response: &ApiResponse) -> Result<Value, RemoteError> {
    let body = decode(operation, response)?;
    match classify(&body) {
        Envelope::Success | Envelope::Jobs(_) => Ok(body),
        Envelope::Failure { code, message } => Err(server_error(operation, code, message)),
        Envelope::Scheduled(_) | Envelope::Unrecognized => Err(unexpected(operation, &body)),
    }
}

/// Fails only on a structured error; any other decodable body is accepted.
pub fn expect_no_failure(operation: &str, response: &ApiResponse) -> Result<Value, RemoteError> {
    let body = decode(operation, response)?;
    match classify(&body) {
        Envelope::Failure { code, message } => Err(server_error(operation, code, message)),
        _ => Ok(body),
    }
}

pub fn expect_job(operation: &str, response: &ApiResponse) -> Result<JobHandle, RemoteError> {
    let body = decode(operation, response)?;
    match classify(&body) {
        Envelope::Jobs(ids) => Ok(JobHandle::new(ids[0])),
        Envelope::Failure { code, message } => Err(server_error(operation, code, message)),
        _ => Err(unexpected(operation, &body)),
    }
}

/// A started job or a created schedule.
pub fn expect_task(operation: &str, response: &ApiResponse) -> Result<TaskOutcome, RemoteError> {
    let body = decode(operation, response)?;
    match classify(&body) {
        Envelope::Jobs(ids) => Ok(TaskOutcome::Started(JobHandle::new(ids[0]))),
        Envelope::Scheduled(task_id) => Ok(TaskOutcome::Scheduled { task_id }),
        Envelope::Failure { code, message } => Err(server_error(operation, code, message)),
        _ => Err(unexpected(operation, &body)),
    }
}

/// Success with an optional job; used by operations that may or may not
/// start one.
pub fn expect_optional_job(
    operation: &str,
    response: &ApiResponse,
) -> Result<Option<JobHandle>, RemoteError> {
    let body = decode(operation, response)?;
    match classify(&body) {
        Envelope::Jobs(ids) => Ok(Some(JobHandle::new(ids[0]))),
        Envelope::Success => Ok(None),
        Envelope::Failure { code, message } => Err(server_error(operation, code, message)),
        _ => Err(unexpected(operation, &body)),
    }
}

/// Command endpoints may answer with JSON or with text. Only a structured
/// failure is an error; a text body is returned as `None`.
pub fn expect_accepted(operation: &str, response: &ApiResponse) -> Result<Option<Value>, RemoteError> {
    if response.success && !response.text.trim().is_empty() && response.json().is_none() {
        return Ok(None);
    }
    expect_no_failure(operation, response).map(Some)
}

/// Policy deletion may answer with JSON or with plain text.
pub fn expect_deleted(operation: &str, response: &ApiResponse) -> Result<String, RemoteError> {
    if response.success {
        if let Some(body) = response.json() {
            if let Envelope::Failure { code, message } = classify(&body) {
                return Err(server_error(operation, code, message));
            }
            return Ok(response.text.trim().to_string());
        }
        let text = response.text.trim();
        if text.is_empty() {
            return Err(surface(RemoteError::EmptyBody {
                operation: operation.to_string(),
            }));
        }
        if text.contains("errorCode") && text.contains("errorMessage") {
            return Err(surface(RemoteError::Rejected {
                operation: operation.to_string(),
                message: text.to_string(),
            }));
        }
        return Ok(text.to_string());
    }
    decode(operation, response).map(|_| String::new())
}

/// The compliance-lock disable endpoint reports errors under `genericError`
/// (message on the first copy) or as an `error` warning.
pub fn expect_compliance_disabled(operation: &str, response: &ApiResponse) -> Result<(), RemoteError> {
    let body = decode(operation, response)?;
    if let Some(code) = body.pointer("/genericError/errorCode") {
        return match as_i64(code) {
            Some(0) => Ok(()),
            Some(code) => {
                let message = body
                    .pointer("/copies/0/genericError/errorMessage")
                    .and_then(Value::as_str)
                    .unwrap_or("failed to disable compliance lock")
                    .to_string();
                Err(server_error(operation, code, message))
            }
            None => Err(unexpected(operation, &body)),
        };
    }
    if let Some(error) = body.get("error") {
        let message = error
            .get("warningMessage")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(surface(RemoteError::Rejected {
            operation: operation.to_string(),
            message,
        }));
    }
    Err(unexpected(operation, &body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(body: Value) -> ApiResponse {
        ApiResponse::ok_json(&body)
    }

    #[test]
    fn test_classify_shapes() {
        assert_eq!(classify(&json!({"jobIds": ["41", 42]})), Envelope::Jobs(vec![41, 42]));
        assert_eq!(
            classify(&json!({"errorCode": 5, "errorMessage": "busy"})),
            Envelope::Failure { code: 5, message: "busy".into() }
        );
        assert_eq!(classify(&json!({"error": {"errorCode": 0}})), Envelope::Success);
        assert_eq!(
            classify(&json!({"error": {"errorCode": "12", "errorMessage": "no lib"}})),
            Envelope::Failure { code: 12, message: "no lib".into() }
        );
        assert_eq!(
            classify(&json!({"response": [{"errorCode": 3, "errorString": "bad flag"}]})),
            Envelope::Failure { code: 3, message: "bad flag".into() }
        );
        assert_eq!(classify(&json!({"genericError": {"errorCode": 0}})), Envelope::Success);
        assert_eq!(classify(&json!({"taskId": 77})), Envelope::Scheduled(77));
        assert_eq!(classify(&json!({"policies": []})), Envelope::Unrecognized);
    }

    #[test]
    fn test_decode_failures() {
        let err = decode("list", &ApiResponse::new(503, "down")).unwrap_err();
        assert!(matches!(err, RemoteError::Status { status: 503, .. }));
        assert!(matches!(
            decode("list", &ApiResponse::new(200, "")),
            Err(RemoteError::EmptyBody { .. })
        ));
        assert!(matches!(
            decode("list", &ApiResponse::new(200, "<xml/>")),
            Err(RemoteError::Undecodable { .. })
        ));
    }

    #[test]
    fn test_strict_and_lenient() {
        assert!(expect_success("create", &ok(json!({"error": {"errorCode": 0}}))).is_ok());
        assert!(matches!(
            expect_success("create", &ok(json!({"something": 1}))),
            Err(RemoteError::Unexpected { .. })
        ));
        assert!(expect_no_failure("update", &ok(json!({"something": 1}))).is_ok());

        let err = expect_no_failure("update", &ok(json!({"errorCode": 9, "errorMessage": "locked"})))
            .unwrap_err();
        assert_eq!(err.code(), Some(9));
        assert!(err.to_string().contains("locked"));
    }

    #[test]
    fn test_jobs_and_tasks() {
        assert_eq!(
            expect_job("move", &ok(json!({"jobIds": ["901"]}))).unwrap(),
            JobHandle::new(901)
        );
        assert!(expect_job("move", &ok(json!({"errorCode": 0}))).is_err());
        assert_eq!(
            expect_task("aux", &ok(json!({"taskId": 5}))).unwrap(),
            TaskOutcome::Scheduled { task_id: 5 }
        );
        assert_eq!(expect_optional_job("start over", &ok(json!({"errorCode": 0}))).unwrap(), None);
    }

    #[test]
    fn test_accepted_tolerates_text() {
        assert_eq!(expect_accepted("seal", &ApiResponse::new(200, "done")).unwrap(), None);
        assert!(expect_accepted("seal", &ok(json!({"errorCode": 0}))).unwrap().is_some());
        assert!(expect_accepted("seal", &ok(json!({"errorCode": 2}))).is_err());
        assert!(expect_accepted("seal", &ApiResponse::new(500, "")).is_err());
    }

    #[test]
    fn test_deleted_accepts_plain_text() {
        assert_eq!(
            expect_deleted("delete", &ApiResponse::new(200, "Policy deleted")).unwrap(),
            "Policy deleted"
        );
        assert!(matches!(
            expect_deleted("delete", &ApiResponse::new(200, "errorCode=2 errorMessage=in use")),
            Err(RemoteError::Rejected { .. })
        ));
        assert!(expect_deleted("delete", &ok(json!({"error": {"errorCode": 4, "errorMessage": "x"}}))).is_err());
        assert!(expect_deleted("delete", &ApiResponse::new(404, "")).is_err());
    }

    #[test]
    fn test_compliance_disable_shapes() {
        assert!(expect_compliance_disabled("disable", &ok(json!({"genericError": {"errorCode": 0}}))).is_ok());

        let err = expect_compliance_disabled(
            "disable",
            &ok(json!({
                "genericError": {"errorCode": 1},
                "copies": [{"genericError": {"errorMessage": "retention not met"}}]
            })),
        )
        .unwrap_err();
        assert!(err.to_string().contains("retention not met"));

        let err = expect_compliance_disabled(
            "disable",
            &ok(json!({"error": {"warningMessage": "WORM pool"}})),
        )
        .unwrap_err();
        assert!(matches!(err, RemoteError::Rejected { ref message, .. } if message == "WORM pool"));

        assert!(expect_compliance_disabled("disable", &ok(json!({}))).is_err());
    }
}
