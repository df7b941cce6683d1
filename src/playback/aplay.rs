use anyhow::{Context, Result};
use std::io::Write;
use std::process::{Child, Command, Stdio};

use super::{PlaybackSink, SinkStatus, SinkStream, CHANNELS};

/// Spawns an external player reading raw PCM on stdin, `aplay` by default.
pub struct CommandSink {
    program: String,
    device: Option<String>,
}

impl CommandSink {
    pub fn new(program: impl Into<String>, device: Option<String>) -> Self {
        Self {
            program: program.into(),
            device,
        }
    }

    pub fn args(&self, sample_rate: u32) -> Vec<String> {
        let mut args = vec!["-q".to_string()];
        if let Some(ref device) = self.device {
            args.extend(["-D".to_string(), device.clone()]);
        }
        args.extend([
            "-f".into(), "S16_LE".into(),
            "-c".into(), CHANNELS.to_string(),
            "-r".into(), sample_rate.to_string(),
            "-".into(),
        ]);
        args
    }
}

impl PlaybackSink for CommandSink {
    fn open(&mut self, sample_rate: u32) -> Result<Box<dyn SinkStream>> {
        let child = Command::new(&self.program)
            .args(self.args(sample_rate))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn {}. Is it installed?", self.program))?;

        log::info!(
            "Playback started: {} ({} Hz, {} ch, S16_LE)",
            self.program, sample_rate, CHANNELS
        );

        Ok(Box::new(CommandStream {
            child,
            program: self.program.clone(),
        }))
    }
}

struct CommandStream {
    child: Child,
    program: String,
}

impl SinkStream for CommandStream {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let stdin = self
            .child
            .stdin
            .as_mut()
            .with_context(|| format!("{} stdin not available", self.program))?;
        stdin
            .write_all(bytes)
            .with_context(|| format!("Failed to write PCM to {}", self.program))?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<SinkStatus> {
        let CommandStream { mut child, program } = *self;
        // Close stdin to signal EOF
        drop(child.stdin.take());

        let output = child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for {}", program))?;

        if output.status.success() {
            Ok(SinkStatus::Success)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Ok(SinkStatus::Failed(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_aplay_arguments() {
        let sink = CommandSink::new("aplay", Some("pipewire".into()));
        assert_eq!(
            sink.args(48_000),
            ["-q", "-D", "pipewire", "-f", "S16_LE", "-c", "2", "-r", "48000", "-"]
        );
        let plain = CommandSink::new("aplay", None);
        assert_eq!(plain.args(44_100), ["-q", "-f", "S16_LE", "-c", "2", "-r", "44100", "-"]);
    }

    #[test]
    fn missing_program_fails_to_open() {
        let mut sink = CommandSink::new("auralis-no-such-player", None);
        assert!(sink.open(44_100).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn reports_nonzero_exit_status() {
        // `false` ignores its arguments and exits 1.
        let mut sink = CommandSink::new("false", None);
        let stream = sink.open(44_100).expect("false spawns");
        match stream.close().expect("wait succeeds") {
            SinkStatus::Failed(msg) => assert!(msg.contains("false")),
            SinkStatus::Success => panic!("expected failure status"),
        }
    }
}
