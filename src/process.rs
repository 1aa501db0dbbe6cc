// Copyright (c) tdb contributors.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! External command execution (§4.4), simplified from the teacher's
//! forkserver `gather_output`: spawn, capture combined output, wait. No
//! cancellation or timeout machinery. Both are explicit Non-goals (§1).

use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::error::BuildError;
use crate::error::BuildErrorKind;

/// The outcome of running an external command.
#[derive(Debug)]
pub struct CommandOutput {
    pub status_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }
}

/// Spawns `argv[0]` with the remaining entries as arguments, captures stdout
/// and stderr separately, and waits for exit. stdin is nulled since rule
/// commands are not expected to read from it (matches the teacher's
/// `prepare_command`, minus the process-group/signal machinery that exists
/// there only to support cancellation).
pub async fn run_command(argv: &[String]) -> Result<CommandOutput, BuildError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| BuildError::new(BuildErrorKind::CommandExecution("empty command".into()), Vec::new()))?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BuildError::io(e, Vec::new()))?;

    let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr was piped");

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let (stdout_result, stderr_result, status) = tokio::join!(
        stdout_pipe.read_to_end(&mut stdout),
        stderr_pipe.read_to_end(&mut stderr),
        child.wait(),
    );
    stdout_result.map_err(|e| BuildError::io(e, Vec::new()))?;
    stderr_result.map_err(|e| BuildError::io(e, Vec::new()))?;
    let status = status.map_err(|e| BuildError::io(e, Vec::new()))?;

    Ok(CommandOutput {
        status_code: status.code(),
        stdout,
        stderr,
    })
}
