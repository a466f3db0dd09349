#[cfg(test)]
mod tests {
    use super::super::error::{classify, ErrorKind, GatewayError, RequestError};
    use serde_json::json;

    fn response(status: u16, body: serde_json::Value) -> RequestError {
        RequestError::from_response("https://portal.example.org/api/x/", None, status, Some(body), "")
    }

    #[test]
    fn test_unauthenticated_takes_precedence() {
        let body = json!({"detail": "Authentication credentials were not provided.", "is_authenticated": false});
        assert_eq!(classify(401, Some(&body)), ErrorKind::Unauthenticated);
        assert_eq!(classify(403, Some(&body)), ErrorKind::Unauthenticated);

        // Only 401/403 mark the session as gone.
        assert_eq!(classify(400, Some(&body)), ErrorKind::ApiException);

        let err = response(403, body);
        assert!(err.is_unauthenticated());
        assert!(!err.is_api_exception());
        assert_eq!(err.message, "Authentication credentials were not provided.");
    }

    #[test]
    fn test_detail_bodies_are_api_exceptions() {
        let err = response(403, json!({"detail": "You do not have permission."}));
        assert_eq!(err.kind, ErrorKind::Unauthorized);
        assert!(err.is_api_exception());

        let err = response(404, json!({"detail": "Not found."}));
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.message, "Not found.");

        let err = response(500, json!({"detail": "Server exploded"}));
        assert_eq!(err.kind, ErrorKind::ApiException);
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_validation_errors() {
        let err = response(
            400,
            json!({"name": ["This field is required."], "userConfigurationData": {"queueName": "Invalid queue"}}),
        );
        assert!(err.is_validation_error());
        assert!(!err.is_api_exception());

        let fields = err.field_errors().unwrap();
        assert_eq!(fields["name"], vec!["This field is required."]);
        assert_eq!(fields["userConfigurationData.queueName"], vec!["Invalid queue"]);
    }

    #[test]
    fn test_non_object_bodies_are_plain_http_errors() {
        assert_eq!(classify(400, Some(&json!(["bad"]))), ErrorKind::Http);
        assert_eq!(classify(502, None), ErrorKind::Http);

        let err = RequestError::from_response("/api/x/", None, 502, None, "<html>Bad Gateway</html>");
        assert_eq!(err.kind, ErrorKind::Http);
        assert_eq!(err.message, "<html>Bad Gateway</html>");
        assert_eq!(err.details.response, Some(json!("<html>Bad Gateway</html>")));
        assert!(err.field_errors().is_none());
    }

    #[test]
    fn test_empty_body_uses_reason_phrase() {
        let err = RequestError::from_response("/api/x/", Some("{}".to_string()), 503, None, "");
        assert_eq!(err.message, "Service Unavailable");
        assert_eq!(err.details.response, None);
        assert_eq!(err.details.body.as_deref(), Some("{}"));
    }

    #[test]
    fn test_network_failure_has_no_status() {
        let err = RequestError::network("/api/x/", None, "connection refused");
        assert_eq!(err.kind, ErrorKind::NetworkFailure);
        assert_eq!(err.status(), None);

        let error = GatewayError::from(err);
        assert!(error.is_retryable());
        let hint = error.hint().unwrap();
        assert!(hint.contains("internet connection"));
    }

    #[test]
    fn test_hints() {
        let error = GatewayError::from(response(401, json!({"is_authenticated": false})));
        assert!(error.hint().unwrap().contains("gateway config set server.session_id"));
        assert!(!error.is_retryable());

        let error = GatewayError::UnknownService("Nope".to_string());
        assert!(error.hint().unwrap().contains("gateway services"));
        assert_eq!(error.to_string(), "Unknown service: Nope");

        let error = GatewayError::decode("Experiment.inputs[2].type", "expected a string");
        assert_eq!(error.to_string(), "Decode error at Experiment.inputs[2].type: expected a string");
        assert!(error.hint().is_none());
    }

    #[test]
    fn test_server_errors_are_retryable() {
        let error = GatewayError::from(response(503, json!({})));
        assert!(error.is_retryable());
        let error = GatewayError::from(response(400, json!({"name": ["bad"]})));
        assert!(!error.is_retryable());
    }
}
