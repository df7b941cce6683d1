//! Producer task: decode, buffer, analyze every hop, publish visual events and
//! forward audio to the playback sink.

use anyhow::Result;
use indicatif::ProgressBar;

use crate::audio::analysis::Analyzer;
use crate::audio::buffer::ChannelBuffers;
use crate::audio::decode::{FrameDecoder, PcmFrame};
use crate::config::AnalysisConfig;
use crate::error::{ConfigError, PipelineError};
use crate::playback::{pcm_to_le_bytes, PlaybackSink, SinkStatus, SinkStream};
use crate::visual::mapper;
use crate::visual::queue::SharedState;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineReport {
    pub frames_decoded: usize,
    /// Bytes stepped over one at a time while hunting for a valid frame
    pub bytes_skipped: usize,
    pub windows_analyzed: usize,
    pub events_pushed: usize,
    pub sink_status: Option<SinkStatus>,
}

pub struct Pipeline<D: FrameDecoder> {
    decoder: D,
    analyzer: Analyzer,
    buffers: ChannelBuffers,
    hop_size: usize,
    sink: Box<dyn PlaybackSink>,
    stream: Option<Box<dyn SinkStream>>,
    sink_opened: bool,
    require_sink: bool,
    /// Samples advanced past by completed hops, for window timestamps
    processed_samples: u64,
    report: PipelineReport,
}

impl<D: FrameDecoder> Pipeline<D> {
    pub fn new(
        config: &AnalysisConfig,
        require_sink: bool,
        decoder: D,
        sink: Box<dyn PlaybackSink>,
    ) -> Result<Self, ConfigError> {
        if config.hop_size == 0 || config.hop_size > config.fft_size {
            return Err(ConfigError::HopSize {
                hop_size: config.hop_size,
                fft_size: config.fft_size,
            });
        }
        Ok(Self {
            decoder,
            analyzer: Analyzer::new(config)?,
            buffers: ChannelBuffers::new(),
            hop_size: config.hop_size,
            sink,
            stream: None,
            sink_opened: false,
            require_sink,
            processed_samples: 0,
            report: PipelineReport::default(),
        })
    }

    #[cfg(test)]
    pub fn buffered_samples(&self) -> usize {
        self.buffers.len()
    }

    /// Consume the whole input, then close the sink. The sink is closed even
    /// when decoding stops on an error.
    pub fn run(&mut self, data: &[u8], shared: &SharedState, progress: &ProgressBar) -> Result<PipelineReport> {
        let result = self.decode_all(data, shared, progress);
        if !self.buffers.is_empty() {
            log::debug!("{} trailing samples short of a full window were not analyzed", self.buffers.len());
        }
        self.close_sink();
        progress.finish_and_clear();
        result?;

        let report = self.report.clone();
        log::info!(
            "Analysis finished: {} frames, {} windows, {} events, {} bytes skipped",
            report.frames_decoded,
            report.windows_analyzed,
            report.events_pushed,
            report.bytes_skipped
        );
        Ok(report)
    }

    fn decode_all(&mut self, data: &[u8], shared: &SharedState, progress: &ProgressBar) -> Result<()> {
        let mut offset = 0;
        while offset < data.len() {
            let frame = self.decoder.decode_next_frame(data, offset);
            if frame.consumed == 0 {
                // Nothing valid starts here; step one byte to resynchronize.
                offset += 1;
                self.report.bytes_skipped += 1;
                continue;
            }
            offset += frame.consumed;
            progress.set_position(offset.min(data.len()) as u64);

            if frame.samples.is_empty() {
                continue;
            }
            self.process_frame(&frame, shared)?;
        }
        Ok(())
    }

    fn process_frame(&mut self, frame: &PcmFrame, shared: &SharedState) -> Result<()> {
        if frame.channels != 2 {
            return Err(PipelineError::UnsupportedFormat {
                channels: frame.channels,
            }
            .into());
        }
        if !self.sink_opened {
            self.open_sink(frame.sample_rate)?;
        }
        self.report.frames_decoded += 1;
        log::trace!(
            "Frame {}: {} samples/ch at {} Hz",
            self.report.frames_decoded,
            frame.frame_count(),
            frame.sample_rate
        );

        self.buffers.append_interleaved(&frame.samples);
        self.hop_loop(frame.sample_rate, shared);

        if let Some(stream) = self.stream.as_mut() {
            if let Err(err) = stream.write(&pcm_to_le_bytes(&frame.samples)) {
                log::warn!("Playback write failed, continuing without audio: {:#}", err);
                self.close_sink();
            }
        }
        Ok(())
    }

    fn hop_loop(&mut self, sample_rate: u32, shared: &SharedState) {
        let n = self.analyzer.fft_size();
        let mut offset = 0;
        while let Some(view) = self.buffers.window(offset, n) {
            let time = self.processed_samples as f64 / sample_rate as f64;
            let features = self.analyzer.analyze(view, sample_rate, time);
            for event in mapper::map_window(&features) {
                shared.queue.push(event);
                self.report.events_pushed += 1;
            }
            self.report.windows_analyzed += 1;
            offset += self.hop_size;
            self.processed_samples += self.hop_size as u64;
        }
        self.buffers.consume(offset);
    }

    fn open_sink(&mut self, sample_rate: u32) -> Result<()> {
        self.sink_opened = true;
        log::info!("Decoded format: {} Hz, 2 ch", sample_rate);
        match self.sink.open(sample_rate) {
            Ok(stream) => {
                self.stream = Some(stream);
                Ok(())
            }
            Err(source) if self.require_sink => Err(PipelineError::SinkOpen { sample_rate, source }.into()),
            Err(err) => {
                log::warn!("Playback unavailable, analyzing headless: {:#}", err);
                Ok(())
            }
        }
    }

    fn close_sink(&mut self) {
        let Some(stream) = self.stream.take() else {
            return;
        };
        match stream.close() {
            Ok(SinkStatus::Success) => {
                self.report.sink_status = Some(SinkStatus::Success);
            }
            Ok(SinkStatus::Failed(msg)) => {
                log::warn!("Playback ended abnormally: {}", msg);
                self.report.sink_status = Some(SinkStatus::Failed(msg));
            }
            Err(err) => {
                log::warn!("Failed to close playback: {:#}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    const SR: u32 = 44_100;
    const FRAME: usize = 1152;

    /// Byte script: 0 = garbage, 1 = stereo frame, 2 = mono frame, 3 = tag with no audio.
    struct ScriptDecoder {
        left_amp: f64,
        right_amp: f64,
        phase: usize,
    }

    impl ScriptDecoder {
        fn new(left_amp: f64, right_amp: f64) -> Self {
            Self {
                left_amp,
                right_amp,
                phase: 0,
            }
        }

        fn tone(&mut self, channels: usize) -> Vec<i16> {
            let mut out = Vec::with_capacity(FRAME * channels);
            for _ in 0..FRAME {
                let s = (2.0 * std::f64::consts::PI * 440.0 * self.phase as f64 / SR as f64).sin();
                out.push((s * self.left_amp * 32767.0) as i16);
                if channels == 2 {
                    out.push((s * self.right_amp * 32767.0) as i16);
                }
                self.phase += 1;
            }
            out
        }
    }

    impl FrameDecoder for ScriptDecoder {
        fn decode_next_frame(&mut self, data: &[u8], offset: usize) -> PcmFrame {
            match data[offset] {
                1 => PcmFrame {
                    samples: self.tone(2),
                    channels: 2,
                    sample_rate: SR,
                    consumed: 1,
                },
                2 => PcmFrame {
                    samples: self.tone(1),
                    channels: 1,
                    sample_rate: SR,
                    consumed: 1,
                },
                3 => PcmFrame {
                    consumed: 1,
                    ..PcmFrame::default()
                },
                _ => PcmFrame::default(),
            }
        }
    }

    #[derive(Default)]
    struct Recorded {
        opened_at: Vec<u32>,
        bytes: usize,
        writes: usize,
        closes: usize,
    }

    struct RecordingSink {
        log: Arc<Mutex<Recorded>>,
        fail_open: bool,
        fail_write: bool,
        exit: SinkStatus,
    }

    struct RecordingStream {
        log: Arc<Mutex<Recorded>>,
        fail_write: bool,
        exit: SinkStatus,
    }

    impl PlaybackSink for RecordingSink {
        fn open(&mut self, sample_rate: u32) -> Result<Box<dyn SinkStream>> {
            if self.fail_open {
                anyhow::bail!("device busy");
            }
            self.log.lock().opened_at.push(sample_rate);
            Ok(Box::new(RecordingStream {
                log: Arc::clone(&self.log),
                fail_write: self.fail_write,
                exit: self.exit.clone(),
            }))
        }
    }

    impl SinkStream for RecordingStream {
        fn write(&mut self, bytes: &[u8]) -> Result<()> {
            let mut log = self.log.lock();
            log.writes += 1;
            if self.fail_write {
                anyhow::bail!("broken pipe");
            }
            log.bytes += bytes.len();
            Ok(())
        }

        fn close(self: Box<Self>) -> Result<SinkStatus> {
            self.log.lock().closes += 1;
            Ok(self.exit)
        }
    }

    fn sink(fail_open: bool, exit: SinkStatus) -> (Box<dyn PlaybackSink>, Arc<Mutex<Recorded>>) {
        let log = Arc::new(Mutex::new(Recorded::default()));
        let sink = RecordingSink {
            log: Arc::clone(&log),
            fail_open,
            fail_write: false,
            exit,
        };
        (Box::new(sink), log)
    }

    fn pipeline(
        decoder: ScriptDecoder,
        require_sink: bool,
        sink: Box<dyn PlaybackSink>,
    ) -> Pipeline<ScriptDecoder> {
        Pipeline::new(&AnalysisConfig::default(), require_sink, decoder, sink).expect("valid config")
    }

    #[test]
    fn resynchronizes_over_garbage_and_terminates() {
        let (sink, log) = sink(false, SinkStatus::Success);
        let mut p = pipeline(ScriptDecoder::new(0.5, 0.5), false, sink);
        let shared = SharedState::new(128);
        let data = [0, 0, 1, 0, 3, 1, 0, 0, 0, 1, 1, 0];

        let report = p.run(&data, &shared, &ProgressBar::hidden()).expect("run succeeds");
        assert_eq!(report.frames_decoded, 4);
        assert_eq!(report.bytes_skipped, 7);
        assert_eq!(report.sink_status, Some(SinkStatus::Success));

        let log = log.lock();
        assert_eq!(log.opened_at, vec![SR]);
        assert_eq!(log.bytes, 4 * FRAME * 2 * 2);
        assert_eq!(log.closes, 1);
    }

    #[test]
    fn hops_over_buffered_samples_and_keeps_the_tail() {
        let (sink, _) = sink(false, SinkStatus::Success);
        let mut p = pipeline(ScriptDecoder::new(0.5, 0.5), false, sink);
        let shared = SharedState::new(128);

        let report = p.run(&[1, 1, 1, 1], &shared, &ProgressBar::hidden()).expect("run succeeds");
        // 4608 samples, N = 1024, H = 512: windows start at 0, 512, ..., 3584.
        assert_eq!(report.windows_analyzed, 8);
        assert_eq!(p.buffered_samples(), 4 * FRAME - 8 * 512);
        assert!(report.events_pushed > 0);
        assert!(shared.queue.len() <= 128);
    }

    #[test]
    fn left_only_tone_lands_on_the_left_edge() {
        let (sink, _) = sink(false, SinkStatus::Success);
        let mut p = pipeline(ScriptDecoder::new(0.5, 0.0), false, sink);
        let shared = SharedState::new(128);

        let report = p.run(&[1, 1], &shared, &ProgressBar::hidden()).expect("run succeeds");
        assert!(report.events_pushed > 0);
        let events = shared.queue.drain_non_expired(0.0, 1.0);
        assert!(!events.is_empty());
        for e in &events {
            assert!((e.x - 0.9).abs() < 1e-6, "x = {}", e.x);
        }
    }

    #[test]
    fn silence_produces_no_events() {
        let (sink, _) = sink(false, SinkStatus::Success);
        let mut p = pipeline(ScriptDecoder::new(0.0, 0.0), false, sink);
        let shared = SharedState::new(128);

        let report = p.run(&[1, 1, 1], &shared, &ProgressBar::hidden()).expect("run succeeds");
        assert!(report.windows_analyzed > 0);
        assert_eq!(report.events_pushed, 0);
        assert!(shared.queue.is_empty());
    }

    #[test]
    fn mono_input_is_rejected_and_sink_closed() {
        let (sink, log) = sink(false, SinkStatus::Success);
        let mut p = pipeline(ScriptDecoder::new(0.5, 0.5), false, sink);
        let shared = SharedState::new(128);

        let err = p
            .run(&[1, 2, 1], &shared, &ProgressBar::hidden())
            .expect_err("mono frame is fatal");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::UnsupportedFormat { channels: 1 })
        ));
        assert_eq!(log.lock().closes, 1);
    }

    #[test]
    fn sink_open_failure_falls_back_to_headless() {
        let (sink, _) = sink(true, SinkStatus::Success);
        let mut p = pipeline(ScriptDecoder::new(0.5, 0.5), false, sink);
        let shared = SharedState::new(128);

        let report = p.run(&[1, 1], &shared, &ProgressBar::hidden()).expect("headless run");
        assert!(report.events_pushed > 0);
        assert_eq!(report.sink_status, None);
    }

    #[test]
    fn required_sink_failure_is_fatal() {
        let (sink, _) = sink(true, SinkStatus::Success);
        let mut p = pipeline(ScriptDecoder::new(0.5, 0.5), true, sink);
        let shared = SharedState::new(128);

        let err = p
            .run(&[1, 1], &shared, &ProgressBar::hidden())
            .expect_err("required sink");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::SinkOpen { sample_rate: SR, .. })
        ));
    }

    #[test]
    fn abnormal_sink_exit_is_reported_not_fatal() {
        let (sink, _) = sink(false, SinkStatus::Failed("exit status 1".into()));
        let mut p = pipeline(ScriptDecoder::new(0.5, 0.5), false, sink);
        let shared = SharedState::new(128);

        let report = p.run(&[1], &shared, &ProgressBar::hidden()).expect("run succeeds");
        assert_eq!(report.sink_status, Some(SinkStatus::Failed("exit status 1".into())));
    }

    #[test]
    fn failed_write_closes_sink_once_and_reports_exit() {
        let log = Arc::new(Mutex::new(Recorded::default()));
        let sink = RecordingSink {
            log: Arc::clone(&log),
            fail_open: false,
            fail_write: true,
            exit: SinkStatus::Failed("aplay exited with status 1".into()),
        };
        let mut p = pipeline(ScriptDecoder::new(0.5, 0.5), false, Box::new(sink));
        let shared = SharedState::new(128);

        let report = p.run(&[1, 1, 1], &shared, &ProgressBar::hidden()).expect("write failure is not fatal");
        assert_eq!(report.frames_decoded, 3);
        assert!(report.events_pushed > 0);
        assert_eq!(
            report.sink_status,
            Some(SinkStatus::Failed("aplay exited with status 1".into()))
        );

        let log = log.lock();
        assert_eq!(log.writes, 1);
        assert_eq!(log.closes, 1);
        assert_eq!(log.bytes, 0);
    }

    #[test]
    fn empty_input_produces_nothing() {
        let (sink, log) = sink(false, SinkStatus::Success);
        let mut p = pipeline(ScriptDecoder::new(0.5, 0.5), false, sink);
        let shared = SharedState::new(128);

        let report = p.run(&[], &shared, &ProgressBar::hidden()).expect("run succeeds");
        assert_eq!(report, PipelineReport::default());
        assert!(log.lock().opened_at.is_empty());
    }
}
