use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Reply for a line that did not parse as a request; there is no id to echo.
pub fn bad_json(message: impl Into<String>) -> serde_json::Value {
    json!({
        "ok": false,
        "error": {
            "code": "bad_json",
            "message": message.into(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_omits_empty_details() {
        let e = err("7", "not_found", "missing", None);
        assert_eq!(e["ok"], false);
        assert_eq!(e["error"]["code"], "not_found");
        assert!(e["error"].get("details").is_none());

        let e = err("7", "bad_params", "bad", Some(json!({ "index": 2 })));
        assert_eq!(e["error"]["details"]["index"], 2);
    }
}
