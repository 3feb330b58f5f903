use lambda_runtime::{Error, LambdaEvent};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Response {
    /// The event's `date`, whatever JSON type it had
    pub date: Option<Value>,
}

/// Log the invocation and echo back the event's `date`
pub async fn handle(event: LambdaEvent<Value>) -> Result<Response, Error> {
    info!(request_id = %event.context.request_id, "Lambda function execution started.");

    let date = event.payload.get("date").cloned();
    info!(date = ?date, "Received event");

    Ok(Response { date })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_runtime::Context;
    use serde_json::json;

    #[tokio::test]
    async fn test_echoes_date() {
        let event = LambdaEvent::new(json!({ "date": "2017-02-12", "other": 1 }), Context::default());

        let response = handle(event).await.unwrap();

        assert_eq!(response.date, Some(json!("2017-02-12")));
    }

    #[tokio::test]
    async fn test_non_string_date_is_passed_through() {
        let event = LambdaEvent::new(json!({ "date": 20170212 }), Context::default());

        let response = handle(event).await.unwrap();

        assert_eq!(response.date, Some(json!(20170212)));
    }

    #[tokio::test]
    async fn test_missing_date() {
        let event = LambdaEvent::new(json!({}), Context::default());

        let response = handle(event).await.unwrap();

        assert_eq!(response, Response { date: None });
    }

    #[tokio::test]
    async fn test_non_object_event_has_no_date() {
        let event = LambdaEvent::new(json!("2017-02-12"), Context::default());

        let response = handle(event).await.unwrap();

        assert_eq!(response.date, None);
    }
}
