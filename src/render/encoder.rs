use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use crate::config::RenderConfig;

/// ffmpeg child fed raw RGBA frames on stdin.
pub struct VideoEncoder {
    child: Child,
}

/// Arguments for `ffmpeg`; `audio` is muxed in and trimmed to the shorter stream.
pub fn ffmpeg_args(output: &Path, audio: Option<&Path>, render: &RenderConfig) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-f".into(), "rawvideo".into(),
        "-pixel_format".into(), "rgba".into(),
        "-video_size".into(), format!("{}x{}", render.width, render.height),
        "-framerate".into(), render.fps.to_string(),
        "-i".into(), "pipe:0".into(),
    ];
    if let Some(audio) = audio {
        args.extend(["-i".to_string(), audio.to_string_lossy().into_owned()]);
    }
    args.extend([
        "-c:v".into(), render.codec.clone(),
        "-pix_fmt".into(), render.pix_fmt.clone(),
        "-crf".into(), render.crf.to_string(),
        "-preset".into(), "medium".into(),
    ]);
    if audio.is_some() {
        args.extend([
            "-c:a".into(), "aac".into(),
            "-b:a".into(), "192k".into(),
            "-shortest".into(),
        ]);
    }
    args.push(output.to_string_lossy().into_owned());
    args
}

impl VideoEncoder {
    pub fn new(output: &Path, audio: Option<&Path>, render: &RenderConfig) -> Result<Self> {
        let child = Command::new("ffmpeg")
            .args(ffmpeg_args(output, audio, render))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

        log::info!(
            "FFmpeg encoder started: {}x{} @ {}fps, codec={}",
            render.width, render.height, render.fps, render.codec
        );

        Ok(Self { child })
    }

    pub fn write_frame(&mut self, rgba_pixels: &[u8]) -> Result<()> {
        let stdin = self.child.stdin.as_mut().context("FFmpeg stdin not available")?;
        stdin.write_all(rgba_pixels).context("Failed to write frame to ffmpeg")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        // Close stdin to signal EOF
        drop(self.child.stdin.take());

        let output = self.child.wait_with_output().context("Failed to wait for ffmpeg")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("FFmpeg exited with error:\n{}", stderr);
        }

        log::info!("FFmpeg encoding complete");
        Ok(())
    }
}
