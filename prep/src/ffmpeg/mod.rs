use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Output, Stdio};
use std::thread::JoinHandle;

use crate::PrepError;

// Thin handle on the ffmpeg executable.
//
// Every invocation overwrites its output and only reports errors on stderr, which is
// captured and carried in `PrepError::ExternalTool` when the exit status is non-zero.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: PathBuf,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::from_env()
    }
}

impl Ffmpeg {
    pub fn new<AP>(program: AP) -> Self
    where
        AP: AsRef<Path>,
    {
        Self {
            program: program.as_ref().to_path_buf(),
        }
    }

    // $FFMPEG, else whatever `ffmpeg` resolves to on PATH
    pub fn from_env() -> Self {
        let program = std::env::var_os("FFMPEG").unwrap_or_else(|| "ffmpeg".into());
        Self::new(program)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-y", "-hide_banner", "-loglevel", "error"]);
        cmd
    }

    pub fn run<I, S>(&self, args: I) -> Result<(), PrepError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = self.command();
        cmd.args(args);
        tracing::debug!("running {:?}", cmd);
        let output = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()?;
        self.check(output)
    }

    // Spawn with a piped stdin so the caller can stream raw frames into it
    pub fn spawn_piped<I, S>(&self, args: I) -> Result<PipedChild, PrepError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = self.command();
        cmd.args(args);
        tracing::debug!("spawning {:?}", cmd);
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        // read concurrently, or a full stderr pipe blocks the child while we block on stdin
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });
        Ok(PipedChild { child, stderr })
    }

    pub fn check(&self, output: Output) -> Result<(), PrepError> {
        if output.status.success() {
            Ok(())
        } else {
            Err(self.failure(output.status, &output.stderr))
        }
    }

    pub(crate) fn failure(&self, status: ExitStatus, stderr: &[u8]) -> PrepError {
        PrepError::ExternalTool {
            tool: self.program.display().to_string(),
            status: status.to_string(),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }
}

pub struct PipedChild {
    child: Child,
    stderr: Option<JoinHandle<Vec<u8>>>,
}

impl PipedChild {
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    // Closes stdin if still open, then waits for the exit and the drained stderr
    pub fn wait(mut self) -> Result<Output, PrepError> {
        let status = self.child.wait()?;
        let stderr = match self.stderr.take() {
            Some(reader) => reader.join().unwrap_or_default(),
            None => Vec::new(),
        };
        Ok(Output {
            status,
            stdout: Vec::new(),
            stderr,
        })
    }
}


#[cfg(all(test, unix))]
mod test {
    use super::*;

    #[test]
    fn success_is_ok() {
        Ffmpeg::new("true").run(["-i", "whatever"]).unwrap();
    }

    #[test]
    fn failure_carries_exit_status() {
        match Ffmpeg::new("false").run(["-i", "whatever"]) {
            Err(PrepError::ExternalTool { tool, status, .. }) => {
                assert_eq!(tool, "false");
                assert!(status.contains('1'), "{status}");
            }
            other => panic!("expected tool failure, got {other:?}"),
        }
    }

    #[test]
    fn missing_program_is_io() {
        assert!(matches!(
            Ffmpeg::new("/nonexistent/ffmpeg-binary").run(["-version"]),
            Err(PrepError::IoErr(_))
        ));
    }
}
