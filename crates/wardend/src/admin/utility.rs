//! Maintenance utilities run on behalf of `COMMAND` requests.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::info;
use warden_wire::Tokens;

use super::{ADMIN_TARGET, AdminError, UtilityError};

/// Utilities an administrator may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Utility {
    Aimdex,
    Build,
    Copy,
    Create,
    Delete,
    Encode,
    Erase,
    Exist,
    Index,
    Reformat,
    Rename,
    Sort,
}

impl Utility {
    pub(crate) const ALL: [Self; 12] = [
        Self::Aimdex,
        Self::Build,
        Self::Copy,
        Self::Create,
        Self::Delete,
        Self::Encode,
        Self::Erase,
        Self::Exist,
        Self::Index,
        Self::Reformat,
        Self::Rename,
        Self::Sort,
    ];

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Aimdex => "AIMDEX",
            Self::Build => "BUILD",
            Self::Copy => "COPY",
            Self::Create => "CREATE",
            Self::Delete => "DELETE",
            Self::Encode => "ENCODE",
            Self::Erase => "ERASE",
            Self::Exist => "EXIST",
            Self::Index => "INDEX",
            Self::Reformat => "REFORMAT",
            Self::Rename => "RENAME",
            Self::Sort => "SORT",
        }
    }

    /// Whether the utility writes scratch files and needs `-w=<dir>`.
    pub(crate) const fn needs_work_dir(self) -> bool {
        matches!(self, Self::Index | Self::Sort)
    }

    /// Splits `NAME args` into the utility and its argument text.
    ///
    /// The name is matched case-insensitively and must be followed by a space.
    pub(crate) fn parse(command_line: &str) -> Result<(Self, &str), AdminError> {
        let (name, arguments) = command_line
            .split_once(' ')
            .ok_or(AdminError::UnknownUtility)?;
        let utility = Self::ALL
            .into_iter()
            .find(|utility| utility.as_str().eq_ignore_ascii_case(name))
            .ok_or(AdminError::UnknownUtility)?;
        if arguments.is_empty() {
            return Err(AdminError::MissingUtilityArguments);
        }
        Ok((utility, arguments))
    }
}

impl fmt::Display for Utility {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Runs a maintenance utility to completion.
pub(crate) trait UtilityRunner: Send {
    fn run(&self, utility: Utility, arguments: &str, working_dir: &Path)
    -> Result<(), UtilityError>;
}

/// Runner that launches the configured utility binary.
///
/// The binary receives the utility name followed by the tokenised arguments.
/// A non-zero exit is reported with the first line the utility wrote to
/// standard error.
#[derive(Debug, Clone)]
pub(crate) struct SystemUtilityRunner {
    binary: PathBuf,
}

impl SystemUtilityRunner {
    pub(crate) fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl UtilityRunner for SystemUtilityRunner {
    fn run(
        &self,
        utility: Utility,
        arguments: &str,
        working_dir: &Path,
    ) -> Result<(), UtilityError> {
        let args: Vec<String> = Tokens::new(arguments.as_bytes())
            .map(|token| String::from_utf8_lossy(&token).into_owned())
            .collect();
        info!(
            target: ADMIN_TARGET,
            %utility,
            ?args,
            "running utility"
        );
        let output = Command::new(&self.binary)
            .arg(utility.as_str())
            .args(&args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| UtilityError::Launch { source })?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = stderr
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map_or_else(
                || format!("{utility} failed: {}", output.status),
                str::to_owned,
            );
        Err(UtilityError::Failed { message })
    }
}
