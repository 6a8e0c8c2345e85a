//! `personal_access_token <name> <scope,...> [ttl_days]`.

use async_trait::async_trait;
use chrono::Utc;
use gitgate_client::api::personal_access_token::{TokenRequest, issue};
use gitgate_core::{CommandContext, GateError, GateResult, ReadWriter, ShellArgs};
use tracing::info;

use crate::Command;
use crate::output::write_text;
use crate::services::Services;

const USAGE: &str = "usage: personal_access_token <name> <scope1[,scope2,...]> [ttl_days]";

/// Issues a personal access token for the authenticated user.
#[derive(Debug)]
pub struct PersonalAccessTokenCommand {
    args: ShellArgs,
    streams: ReadWriter,
    services: Services,
}

impl PersonalAccessTokenCommand {
    /// Build the command.
    #[must_use]
    pub fn new(args: ShellArgs, streams: ReadWriter, services: Services) -> Self {
        Self {
            args,
            streams,
            services,
        }
    }
}

/// Parse the token request out of the session tokens.
fn parse_request(tokens: &[String]) -> GateResult<TokenRequest> {
    let (name, scopes, ttl) = match tokens {
        [_, name, scopes] => (name, scopes, None),
        [_, name, scopes, ttl] => (name, scopes, Some(ttl)),
        _ => return Err(GateError::InvalidArguments(USAGE.to_owned())),
    };

    let expires_at = match ttl {
        Some(raw) => {
            let days = raw.parse::<u64>().map_err(|_| {
                GateError::InvalidArguments(format!("Invalid value for days_ttl: '{raw}'"))
            })?;
            let expiry = TokenRequest::expiry_after(Utc::now().date_naive(), days).ok_or_else(
                || GateError::InvalidArguments(format!("Invalid value for days_ttl: '{raw}'")),
            )?;
            Some(expiry)
        },
        None => None,
    };

    Ok(TokenRequest {
        name: name.clone(),
        scopes: scopes
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
        expires_at,
    })
}

#[async_trait]
impl Command for PersonalAccessTokenCommand {
    async fn execute(self: Box<Self>, ctx: &CommandContext) -> GateResult<()> {
        let Self {
            args,
            mut streams,
            services,
        } = *self;

        let request = parse_request(&args.ssh_args)?;
        let response = issue(&services.api, ctx, &args.who, &request).await?;
        if !response.success {
            return Err(GateError::AccessDenied(response.message));
        }
        info!(name = %request.name, "personal access token issued");

        let text = format!(
            "Token:   {}\nScopes:  {}\nExpires: {}\n",
            response.token,
            response.scopes.join(","),
            response.expires_at.as_deref().unwrap_or("never"),
        );
        write_text(&mut streams.output, &text).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Days;

    use super::*;

    fn tokens(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_owned).collect()
    }

    #[test]
    fn test_parse_without_ttl() {
        let request = parse_request(&tokens("personal_access_token ci read_api,read_repository"))
            .unwrap();
        assert_eq!(request.name, "ci");
        assert_eq!(request.scopes, vec!["read_api", "read_repository"]);
        assert!(request.expires_at.is_none());
    }

    #[test]
    fn test_parse_with_ttl() {
        let request = parse_request(&tokens("personal_access_token ci api 30")).unwrap();
        let expected = Utc::now().date_naive().checked_add_days(Days::new(30));
        assert_eq!(request.expires_at, expected);
    }

    #[test]
    fn test_bad_ttl() {
        let err = parse_request(&tokens("personal_access_token ci api soon")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for days_ttl: 'soon'");
    }

    #[test]
    fn test_wrong_token_count() {
        let err = parse_request(&tokens("personal_access_token ci")).unwrap_err();
        assert!(matches!(err, GateError::InvalidArguments(ref m) if m.starts_with("usage:")));
    }
}
