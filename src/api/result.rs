use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Business code the backend returns when the bearer token has expired.
pub const AUTH_EXPIRED_CODE: i64 = 10000001;

/// Envelope every backend response is wrapped in.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Value,
}

/// Outcome of a backend call once the envelope has been classified.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResult<T> {
    Ok(T),
    AuthExpired,
    BusinessError { code: i64, message: String },
}

impl ApiEnvelope {
    /// Classifies the envelope. The auth-expired code is checked before
    /// success so that no caller can mistake it for a plain business error.
    pub fn classify<T: DeserializeOwned>(self) -> Result<ApiResult<T>, serde_json::Error> {
        if self.code == AUTH_EXPIRED_CODE {
            return Ok(ApiResult::AuthExpired);
        }
        if self.code != 0 {
            return Ok(ApiResult::BusinessError {
                code: self.code,
                message: self.msg,
            });
        }
        serde_json::from_value(self.data).map(ApiResult::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        id: u32,
    }

    fn envelope(value: Value) -> ApiEnvelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_success_decodes_data() {
        let res = envelope(json!({"code": 0, "msg": "ok", "data": {"id": 7}}))
            .classify::<Payload>()
            .unwrap();
        assert_eq!(res, ApiResult::Ok(Payload { id: 7 }));
    }

    #[test]
    fn test_auth_expired_code() {
        let res = envelope(json!({"code": 10000001, "msg": "expired"}))
            .classify::<Payload>()
            .unwrap();
        assert_eq!(res, ApiResult::AuthExpired);
    }

    #[test]
    fn test_business_error_keeps_message() {
        let res = envelope(json!({"code": 5001, "msg": "quota exceeded"}))
            .classify::<Payload>()
            .unwrap();
        assert_eq!(
            res,
            ApiResult::BusinessError {
                code: 5001,
                message: "quota exceeded".to_string()
            }
        );
    }

    #[test]
    fn test_success_with_malformed_data_is_an_error() {
        let res = envelope(json!({"code": 0, "data": {"other": true}})).classify::<Payload>();
        assert!(res.is_err());
    }

    #[test]
    fn test_missing_msg_and_data_default() {
        let env = envelope(json!({"code": 3}));
        assert_eq!(env.msg, "");
        assert!(env.data.is_null());
    }
}
