//! Parsed command arguments for each entry point.

use crate::error::{GateError, GateResult};
use crate::executable::ExecutableKind;
use crate::session_env::SessionEnv;

/// The operation requested by an SSH session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    /// Identify the authenticated user.
    Discover,
    /// Regenerate two-factor recovery codes.
    TwoFactorRecover,
    /// Verify a one-time password.
    TwoFactorVerify,
    /// Issue Git LFS credentials.
    LfsAuthenticate,
    /// `git push`.
    ReceivePack,
    /// `git fetch` / `git clone`.
    UploadPack,
    /// `git archive --remote`.
    UploadArchive,
    /// Issue a personal access token.
    PersonalAccessToken,
}

impl CommandType {
    /// Every command type.
    pub const ALL: [Self; 8] = [
        Self::Discover,
        Self::TwoFactorRecover,
        Self::TwoFactorVerify,
        Self::LfsAuthenticate,
        Self::ReceivePack,
        Self::UploadPack,
        Self::UploadArchive,
        Self::PersonalAccessToken,
    ];

    /// The session command token for this type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discover => "discover",
            Self::TwoFactorRecover => "2fa_recovery_codes",
            Self::TwoFactorVerify => "2fa_verify",
            Self::LfsAuthenticate => "git-lfs-authenticate",
            Self::ReceivePack => "git-receive-pack",
            Self::UploadPack => "git-upload-pack",
            Self::UploadArchive => "git-upload-archive",
            Self::PersonalAccessToken => "personal_access_token",
        }
    }

    /// Look up a command type by its first session token.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ct| ct.as_str() == token)
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated principal, as handed over by sshd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Who {
    /// Authenticated by a deploy or user key (`key-<id>`).
    KeyId(String),
    /// Authenticated by username (`username-<name>`).
    Username(String),
    /// Authenticated by Kerberos principal (`principal-<name>`).
    Krb5Principal(String),
}

impl Who {
    /// Parse the forced-command argument.
    #[must_use]
    pub fn parse(arg: &str) -> Option<Self> {
        if let Some(id) = arg.strip_prefix("key-")
            && !id.is_empty()
            && id.bytes().all(|b| b.is_ascii_digit())
        {
            return Some(Self::KeyId(id.to_string()));
        }
        if let Some(name) = arg.strip_prefix("username-")
            && !name.is_empty()
        {
            return Some(Self::Username(name.to_string()));
        }
        if let Some(principal) = arg.strip_prefix("principal-")
            && !principal.is_empty()
        {
            return Some(Self::Krb5Principal(principal.to_string()));
        }
        None
    }

    /// Query/body parameter name and value identifying this principal to
    /// the control plane.
    #[must_use]
    pub fn param(&self) -> (&'static str, &str) {
        match self {
            Self::KeyId(id) => ("key_id", id),
            Self::Username(name) => ("username", name),
            Self::Krb5Principal(principal) => ("krb5principal", principal),
        }
    }

    /// The key id, if authenticated by key.
    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        match self {
            Self::KeyId(id) => Some(id),
            Self::Username(_) | Self::Krb5Principal(_) => None,
        }
    }
}

/// Arguments for the shell dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellArgs {
    /// The requested operation; `None` when the first token is unknown.
    pub command_type: Option<CommandType>,
    /// Session command line split into tokens.
    pub ssh_args: Vec<String>,
    /// Authenticated principal.
    pub who: Who,
    /// Client address, set only when the caller knows it explicitly.
    pub remote_addr: Option<String>,
    /// Git protocol version recorded with the session.
    pub git_protocol_version: String,
}

impl ShellArgs {
    /// Build shell arguments from a command line.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidArguments`] if the command line cannot be
    /// split with shell-word rules.
    pub fn from_command_line(who: Who, command_line: &str) -> GateResult<Self> {
        let ssh_args = split_command_line(command_line)?;
        let command_type = if ssh_args.is_empty() {
            Some(CommandType::Discover)
        } else {
            CommandType::from_token(&ssh_args[0])
        };

        Ok(Self {
            command_type,
            ssh_args,
            who,
            remote_addr: None,
            git_protocol_version: String::new(),
        })
    }

    /// Record an explicitly known client address.
    #[must_use]
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Record the git protocol version.
    #[must_use]
    pub fn with_git_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.git_protocol_version = version.into();
        self
    }

    /// The repository token of a data-plane command (second token).
    #[must_use]
    pub fn repository(&self) -> Option<&str> {
        self.ssh_args.get(1).map(String::as_str)
    }
}

/// Arguments for the `AuthorizedKeysCommand` helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedKeysArgs {
    /// The user sshd expects to log in as (the git user).
    pub expected_user: String,
    /// The user the client is trying to log in as.
    pub actual_user: String,
    /// The public key offered by the client.
    pub key: String,
}

/// Arguments for the `AuthorizedPrincipalsCommand` helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedPrincipalsArgs {
    /// Key id of the certificate.
    pub key_id: String,
    /// Principals listed on the certificate.
    pub principals: Vec<String>,
}

/// Parsed arguments, one variant per entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandArgs {
    /// Shell dispatcher arguments.
    Shell(ShellArgs),
    /// Authorized keys check arguments.
    AuthorizedKeys(AuthorizedKeysArgs),
    /// Authorized principals check arguments.
    AuthorizedPrincipals(AuthorizedPrincipalsArgs),
    /// Health check (no arguments).
    Healthcheck,
}

impl CommandArgs {
    /// Parse process arguments for the given entry point.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidArguments`] when the arguments do not fit
    /// the entry point.
    pub fn parse(kind: ExecutableKind, argv: &[String], env: &SessionEnv) -> GateResult<Self> {
        match kind {
            ExecutableKind::Shell => parse_shell(argv, env).map(Self::Shell),
            ExecutableKind::AuthorizedKeysCheck => {
                parse_authorized_keys(argv).map(Self::AuthorizedKeys)
            },
            ExecutableKind::AuthorizedPrincipalsCheck => {
                parse_authorized_principals(argv).map(Self::AuthorizedPrincipals)
            },
            ExecutableKind::Healthcheck => Ok(Self::Healthcheck),
        }
    }
}

fn parse_shell(argv: &[String], env: &SessionEnv) -> GateResult<ShellArgs> {
    if !env.is_ssh_connection {
        return Err(GateError::InvalidArguments("Only SSH allowed".to_string()));
    }

    let who = argv
        .first()
        .and_then(|arg| Who::parse(arg))
        .ok_or_else(|| GateError::InvalidArguments("Failed to identify the user".to_string()))?;

    Ok(ShellArgs::from_command_line(who, env.original_command())?
        .with_git_protocol_version(env.git_protocol_version()))
}

fn parse_authorized_keys(argv: &[String]) -> GateResult<AuthorizedKeysArgs> {
    match argv {
        [expected_user, actual_user, key] => {
            if expected_user.is_empty() {
                return Err(GateError::InvalidArguments(
                    "# No username provided".to_string(),
                ));
            }
            if key.is_empty() {
                return Err(GateError::InvalidArguments("# No key provided".to_string()));
            }
            Ok(AuthorizedKeysArgs {
                expected_user: expected_user.clone(),
                actual_user: actual_user.clone(),
                key: key.clone(),
            })
        },
        _ => Err(GateError::InvalidArguments(
            "# Insufficient arguments. Usage: <expected-user> <actual-user> <key>".to_string(),
        )),
    }
}

fn parse_authorized_principals(argv: &[String]) -> GateResult<AuthorizedPrincipalsArgs> {
    let Some((key_id, principals)) = argv.split_first() else {
        return Err(GateError::InvalidArguments(
            "# Insufficient arguments. Usage: <key-id> <principal> [<principal>...]".to_string(),
        ));
    };
    if key_id.is_empty() {
        return Err(GateError::InvalidArguments("# No key_id provided".to_string()));
    }
    if principals.is_empty() || principals.iter().any(String::is_empty) {
        return Err(GateError::InvalidArguments(
            "# An invalid principal was provided".to_string(),
        ));
    }
    Ok(AuthorizedPrincipalsArgs {
        key_id: key_id.clone(),
        principals: principals.to_vec(),
    })
}

/// Split a session command line, folding `git <subcommand>` into
/// `git-<subcommand>`.
fn split_command_line(command_line: &str) -> GateResult<Vec<String>> {
    let mut tokens = shell_words::split(command_line)
        .map_err(|_| GateError::InvalidArguments("Invalid SSH command".to_string()))?;

    if tokens.len() >= 2
        && tokens[0] == "git"
        && matches!(
            tokens[1].as_str(),
            "upload-pack" | "receive-pack" | "upload-archive" | "lfs-authenticate"
        )
    {
        let joined = format!("git-{}", tokens[1]);
        tokens.drain(0..2);
        tokens.insert(0, joined);
    }

    Ok(tokens)
}
