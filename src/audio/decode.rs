use std::path::Path;

use symphonia::core::audio::{Channels, SampleBuffer};
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_MP3};
use symphonia::core::formats::Packet;

/// One decoded compressed unit.
#[derive(Clone, Debug, Default)]
pub struct PcmFrame {
    /// Interleaved signed 16-bit samples
    pub samples: Vec<i16>,
    pub channels: usize,
    pub sample_rate: u32,
    /// Input bytes covered by this unit; 0 means nothing valid starts at the offset.
    pub consumed: usize,
}

impl PcmFrame {
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    fn skipped(consumed: usize) -> Self {
        Self {
            consumed,
            ..Self::default()
        }
    }
}

/// Produces PCM from a compressed byte buffer, one unit at a time.
pub trait FrameDecoder {
    fn decode_next_frame(&mut self, data: &[u8], offset: usize) -> PcmFrame;
}

/// Read the whole asset. An unreadable file is reported and yields an empty
/// buffer, so decoding produces no frames.
pub fn read_asset(path: &Path) -> Vec<u8> {
    match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::warn!("Cannot open {}: {}", path.display(), err);
            Vec::new()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MpegVersion {
    V1,
    V2,
    V25,
}

/// Parsed MPEG audio Layer III frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub padding: bool,
    pub channels: usize,
}

const BITRATES_V1_L3: [u32; 15] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
const BITRATES_V2_L3: [u32; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

impl FrameHeader {
    /// Parse the 4-byte header at the start of `bytes`. Free-format and
    /// non-Layer-III streams are rejected.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] & 0xE0 != 0xE0 {
            return None;
        }
        let version = match (bytes[1] >> 3) & 0b11 {
            0b00 => MpegVersion::V25,
            0b10 => MpegVersion::V2,
            0b11 => MpegVersion::V1,
            _ => return None,
        };
        if (bytes[1] >> 1) & 0b11 != 0b01 {
            return None;
        }

        let bitrate_index = (bytes[2] >> 4) as usize;
        if bitrate_index == 0 || bitrate_index == 15 {
            return None;
        }
        let bitrate_kbps = match version {
            MpegVersion::V1 => BITRATES_V1_L3[bitrate_index],
            MpegVersion::V2 | MpegVersion::V25 => BITRATES_V2_L3[bitrate_index],
        };

        let base_rate = match (bytes[2] >> 2) & 0b11 {
            0 => 44_100,
            1 => 48_000,
            2 => 32_000,
            _ => return None,
        };
        let sample_rate = match version {
            MpegVersion::V1 => base_rate,
            MpegVersion::V2 => base_rate / 2,
            MpegVersion::V25 => base_rate / 4,
        };

        let channels = if bytes[3] >> 6 == 0b11 { 1 } else { 2 };

        Some(Self {
            version,
            bitrate_kbps,
            sample_rate,
            padding: (bytes[2] >> 1) & 1 == 1,
            channels,
        })
    }

    pub fn frame_length(&self) -> usize {
        let coefficient = match self.version {
            MpegVersion::V1 => 144,
            MpegVersion::V2 | MpegVersion::V25 => 72,
        };
        (coefficient * self.bitrate_kbps as usize * 1000 / self.sample_rate as usize)
            + self.padding as usize
    }

    pub fn samples_per_frame(&self) -> u64 {
        match self.version {
            MpegVersion::V1 => 1152,
            MpegVersion::V2 | MpegVersion::V25 => 576,
        }
    }
}

/// Length of an ID3v2 tag at the start of `bytes`, including header and footer.
pub fn id3v2_length(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < 10 || &bytes[..3] != b"ID3" {
        return None;
    }
    let size_bytes = &bytes[6..10];
    if size_bytes.iter().any(|b| b & 0x80 != 0) {
        return None;
    }
    let size = size_bytes.iter().fold(0usize, |acc, &b| (acc << 7) | b as usize);
    let footer = if bytes[5] & 0x10 != 0 { 10 } else { 0 };
    Some(10 + size + footer)
}

const ID3V1_LENGTH: usize = 128;

/// Frame-synchronizing MP3 decoder built on symphonia's MPEG audio codec.
pub struct Mp3FrameDecoder {
    decoder: Option<Box<dyn Decoder>>,
    timestamp: u64,
}

impl Mp3FrameDecoder {
    pub fn new() -> Self {
        Self {
            decoder: None,
            timestamp: 0,
        }
    }

    fn codec(&mut self, header: &FrameHeader) -> Option<&mut Box<dyn Decoder>> {
        if self.decoder.is_none() {
            let layout = if header.channels == 1 {
                Channels::FRONT_CENTRE
            } else {
                Channels::FRONT_LEFT | Channels::FRONT_RIGHT
            };
            let mut params = CodecParameters::new();
            params
                .for_codec(CODEC_TYPE_MP3)
                .with_sample_rate(header.sample_rate)
                .with_channels(layout);
            match symphonia::default::get_codecs().make(&params, &DecoderOptions::default()) {
                Ok(decoder) => self.decoder = Some(decoder),
                Err(err) => {
                    log::error!("Failed to create MP3 decoder: {}", err);
                    return None;
                }
            }
        }
        self.decoder.as_mut()
    }
}

impl Default for Mp3FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for Mp3FrameDecoder {
    fn decode_next_frame(&mut self, data: &[u8], offset: usize) -> PcmFrame {
        let Some(rest) = data.get(offset..) else {
            return PcmFrame::default();
        };

        if let Some(len) = id3v2_length(rest) {
            return PcmFrame::skipped(len.min(rest.len()));
        }
        if rest.len() == ID3V1_LENGTH && rest.starts_with(b"TAG") {
            return PcmFrame::skipped(ID3V1_LENGTH);
        }

        let Some(header) = FrameHeader::parse(rest) else {
            return PcmFrame::default();
        };
        let len = header.frame_length();
        if len < 4 || len > rest.len() {
            return PcmFrame::default();
        }

        let ts = self.timestamp;
        let dur = header.samples_per_frame();
        let Some(codec) = self.codec(&header) else {
            return PcmFrame::skipped(len);
        };

        let packet = Packet::new_from_slice(0, ts, dur, &rest[..len]);
        let frame = match codec.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let mut buf = SampleBuffer::<i16>::new(decoded.frames() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                PcmFrame {
                    samples: buf.samples().to_vec(),
                    channels: spec.channels.count(),
                    sample_rate: spec.rate,
                    consumed: len,
                }
            }
            Err(err) => {
                log::debug!("Skipping undecodable frame at byte {}: {}", offset, err);
                PcmFrame::skipped(len)
            }
        };
        self.timestamp += dur;
        frame
    }
}
