/// Full-scale divisor for signed 16-bit PCM.
pub const I16_FULL_SCALE: f32 = 32768.0;

/// Borrowed view of one analysis window across the three channel buffers.
#[derive(Clone, Copy, Debug)]
pub struct WindowView<'a> {
    pub left: &'a [f32],
    pub right: &'a [f32],
    pub mid: &'a [f32],
}

/// Rolling left/right/mid sample store. All three buffers always hold the same
/// number of samples.
#[derive(Debug, Default)]
pub struct ChannelBuffers {
    left: Vec<f32>,
    right: Vec<f32>,
    mid: Vec<f32>,
}

impl ChannelBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.mid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mid.is_empty()
    }

    /// Normalize interleaved stereo int16 pairs to [-1, 1] and append them.
    /// A trailing unpaired sample is ignored.
    pub fn append_interleaved(&mut self, pcm: &[i16]) {
        let frames = pcm.len() / 2;
        self.left.reserve(frames);
        self.right.reserve(frames);
        self.mid.reserve(frames);

        for pair in pcm.chunks_exact(2) {
            let l = pair[0] as f32 / I16_FULL_SCALE;
            let r = pair[1] as f32 / I16_FULL_SCALE;
            self.left.push(l);
            self.right.push(r);
            self.mid.push(0.5 * (l + r));
        }
    }

    /// The `size`-sample window starting at `offset`, if fully buffered.
    pub fn window(&self, offset: usize, size: usize) -> Option<WindowView<'_>> {
        let end = offset.checked_add(size)?;
        if end > self.len() {
            return None;
        }
        Some(WindowView {
            left: &self.left[offset..end],
            right: &self.right[offset..end],
            mid: &self.mid[offset..end],
        })
    }

    /// Drop the first `count` samples from every channel.
    pub fn consume(&mut self, count: usize) {
        let count = count.min(self.len());
        if count == 0 {
            return;
        }
        self.left.drain(..count);
        self.right.drain(..count);
        self.mid.drain(..count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_normalizes_and_derives_mid() {
        let mut buffers = ChannelBuffers::new();
        buffers.append_interleaved(&[i16::MIN, 16384, 0, -16384, 7]);

        assert_eq!(buffers.len(), 2);
        let w = buffers.window(0, 2).expect("two samples buffered");
        assert_eq!(w.left, &[-1.0, 0.0]);
        assert_eq!(w.right, &[0.5, -0.5]);
        assert_eq!(w.mid, &[-0.25, -0.25]);
    }

    #[test]
    fn window_requires_full_block() {
        let mut buffers = ChannelBuffers::new();
        buffers.append_interleaved(&[1; 16]);
        assert!(buffers.window(0, 8).is_some());
        assert!(buffers.window(4, 4).is_some());
        assert!(buffers.window(5, 4).is_none());
        assert!(buffers.window(usize::MAX, 2).is_none());
    }

    #[test]
    fn consume_trims_all_channels_identically() {
        let mut buffers = ChannelBuffers::new();
        let pcm: Vec<i16> = (0..20).map(|i| (i * 100) as i16).collect();
        buffers.append_interleaved(&pcm);
        buffers.consume(3);

        assert_eq!(buffers.len(), 7);
        let w = buffers.window(0, 7).expect("remaining samples");
        assert_eq!(w.left.len(), w.right.len());
        assert_eq!(w.right.len(), w.mid.len());
        assert_eq!(w.left[0], 600.0 / I16_FULL_SCALE);
        assert_eq!(w.right[0], 700.0 / I16_FULL_SCALE);

        buffers.consume(100);
        assert!(buffers.is_empty());
    }
}
