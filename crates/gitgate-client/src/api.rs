//! Internal API endpoints.

pub mod allowed;
pub mod authorized_keys;
pub mod discover;
pub mod healthcheck;
pub mod lfs;
pub mod personal_access_token;
pub mod two_factor;

use gitgate_core::Who;
use serde::Serialize;

/// The principal as request-body fields; exactly one is set.
#[derive(Debug, Default, Serialize)]
pub(crate) struct Principal<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    key_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    krb5principal: Option<&'a str>,
}

impl<'a> From<&'a Who> for Principal<'a> {
    fn from(who: &'a Who) -> Self {
        match who {
            Who::KeyId(id) => Self {
                key_id: Some(id),
                ..Self::default()
            },
            Who::Username(name) => Self {
                username: Some(name),
                ..Self::default()
            },
            Who::Krb5Principal(principal) => Self {
                krb5principal: Some(principal),
                ..Self::default()
            },
        }
    }
}

/// Encode `key=value` pairs for a query string.
pub(crate) fn query(pairs: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_encoding() {
        assert_eq!(query(&[("key_id", "1")]), "key_id=1");
        assert_eq!(
            query(&[("key", "ssh-rsa AAA+/=")]),
            "key=ssh-rsa+AAA%2B%2F%3D"
        );
    }

    #[test]
    fn test_principal_fields() {
        let who = Who::Krb5Principal("alice@EXAMPLE.COM".to_owned());
        assert_eq!(
            serde_json::to_value(Principal::from(&who)).unwrap(),
            serde_json::json!({"krb5principal": "alice@EXAMPLE.COM"})
        );
    }
}
