use std::{
    io::Write,
    path::Path,
    process::{Command, Stdio},
};

use colored::Colorize;
use log::trace;

use crate::error::{ContainerError, Result};

/// Checked execution of external compression and signing tools
pub trait Shell {
    /// Run to completion and return stdout; a non-zero exit is an error
    fn exec(&mut self, echo: bool) -> Result<Vec<u8>>;

    /// Like [`Shell::exec`], feeding `input` through stdin
    fn exec_with_input(&mut self, input: &[u8], echo: bool) -> Result<Vec<u8>>;
}

fn command_line(cmd: &Command) -> String {
    let mut cmd_str = cmd.get_program().to_string_lossy().to_string();
    for arg in cmd.get_args() {
        cmd_str += " ";
        cmd_str += arg.to_string_lossy().as_ref();
    }
    cmd_str
}

fn tool_name(cmd: &Command) -> String {
    let program = cmd.get_program();
    Path::new(program)
        .file_name()
        .unwrap_or(program)
        .to_string_lossy()
        .to_string()
}

impl Shell for Command {
    fn exec(&mut self, echo: bool) -> Result<Vec<u8>> {
        self.stdin(Stdio::null());
        run(self, None, echo)
    }

    fn exec_with_input(&mut self, input: &[u8], echo: bool) -> Result<Vec<u8>> {
        self.stdin(Stdio::piped());
        run(self, Some(input), echo)
    }
}

fn run(cmd: &mut Command, input: Option<&[u8]>, echo: bool) -> Result<Vec<u8>> {
    let cmd_str = command_line(cmd);
    let tool = tool_name(cmd);
    trace!("exec: {cmd_str}");
    if echo {
        println!("{}", cmd_str.purple().bold());
    }

    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ContainerError::tool(&tool, format!("could not start '{cmd_str}': {e}")))?;

    let stdin = child.stdin.take();
    let (written, output) = std::thread::scope(|s| {
        let writer = s.spawn(move || match (stdin, input) {
            (Some(mut stdin), Some(input)) => stdin.write_all(input),
            _ => Ok(()),
        });
        let output = child.wait_with_output();
        (writer.join(), output)
    });
    let output = output?;

    if !output.status.success() {
        return Err(ContainerError::tool(
            tool,
            format!(
                "{} ({})",
                String::from_utf8_lossy(&output.stderr).trim(),
                output.status
            ),
        ));
    }
    match written {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(ContainerError::tool(tool, "stdin writer panicked")),
    }

    Ok(output.stdout)
}
