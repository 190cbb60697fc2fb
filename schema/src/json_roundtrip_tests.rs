//! Wire-format tests for the API types
//!
//! These pin the exact JSON shapes clients rely on.

#[cfg(test)]
mod tests {
    use crate::api::*;
    use serde_json::json;

    #[test]
    fn test_spawn_request_parses_full_body() {
        let body = json!({
            "command": "sleep",
            "args": ["5"],
            "env": {"PATH": "/usr/bin:/bin"},
            "pid": 1000
        });
        let req: SpawnRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.command, "sleep");
        assert_eq!(req.args, vec!["5".to_string()]);
        assert_eq!(req.env.get("PATH").map(String::as_str), Some("/usr/bin:/bin"));
        assert_eq!(req.pid, 1000);
    }

    #[test]
    fn test_spawn_request_defaults_args_and_env() {
        let req: SpawnRequest = serde_json::from_str(r#"{"command":"true","pid":7}"#).unwrap();
        assert!(req.args.is_empty());
        assert!(req.env.is_empty());
    }

    #[test]
    fn test_spawn_request_requires_owner_pid() {
        assert!(serde_json::from_str::<SpawnRequest>(r#"{"command":"true"}"#).is_err());
        assert!(serde_json::from_str::<SpawnRequest>(r#"{"command":"true","pid":-1}"#).is_err());
    }

    #[test]
    fn test_stop_request_shape() {
        let req: StopRequest = serde_json::from_str(r#"{"subproc_pid": 42, "pid": 1000}"#).unwrap();
        assert_eq!(req, StopRequest { subproc_pid: 42, pid: 1000 });
    }

    #[test]
    fn test_spawn_response_shapes() {
        assert_eq!(
            serde_json::to_value(SpawnResponse::success(4242)).unwrap(),
            json!({"code": "success", "subproc_pid": 4242})
        );
        assert_eq!(
            serde_json::to_value(SpawnResponse::failure()).unwrap(),
            json!({"code": "failure"})
        );
    }

    #[test]
    fn test_stop_response_shapes() {
        assert_eq!(
            serde_json::to_value(StopResponse::from_found(true)).unwrap(),
            json!({"code": "success"})
        );
        assert_eq!(
            serde_json::to_value(StopResponse::from_found(false)).unwrap(),
            json!({"code": "failure"})
        );
    }

    #[test]
    fn test_listing_uses_string_owner_keys() {
        let mut listing = Listing::new();
        listing.insert(1000, vec![11, 12]);
        listing.insert(2000, vec![]);
        let value = serde_json::to_value(&listing).unwrap();
        assert_eq!(value, json!({"1000": [11, 12], "2000": []}));

        let back: Listing = serde_json::from_value(value).unwrap();
        assert_eq!(back, listing);
    }
}
