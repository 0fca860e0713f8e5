use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

/// Authenticated identity.
///
/// The `user_id` doubles as the rate-limit bucket key and as job ownership,
/// so it must be stable per caller: a configured user name for API key auth,
/// or the source address for anonymous callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub method: String,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            method: "none".to_string(),
        }
    }

    /// Identity keyed by the caller's address, for anonymous requests.
    pub fn from_address(addr: IpAddr) -> Self {
        Self {
            user_id: format!("ip:{}", addr),
            method: "none".to_string(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.method == "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_identity() {
        let identity = Identity::anonymous();
        assert_eq!(identity.user_id, "anonymous");
        assert_eq!(identity.method, "none");
        assert!(identity.is_anonymous());
    }

    #[test]
    fn test_address_identity() {
        let identity = Identity::from_address("192.168.1.7".parse().unwrap());
        assert_eq!(identity.user_id, "ip:192.168.1.7");
        assert!(identity.is_anonymous());
    }

    #[test]
    fn test_identity_serialization() {
        let identity = Identity {
            user_id: "alice".to_string(),
            method: "api_key".to_string(),
        };

        let json = serde_json::to_string(&identity).unwrap();
        let deserialized: Identity = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.user_id, "alice");
        assert_eq!(deserialized.method, "api_key");
        assert!(!deserialized.is_anonymous());
    }
}
