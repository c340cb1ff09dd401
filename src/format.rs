//! Sample encodings and channel layouts for PCM streams

/// Encoding of a single PCM sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleFormat {
    #[default]
    Unknown,
    U8,
    S16,
    S24,
    S32,
    F32,
}

impl SampleFormat {
    /// Size in bytes of one sample, 0 for `Unknown`.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::Unknown => 0,
            Self::U8 => 1,
            Self::S16 => 2,
            Self::S24 => 3,
            Self::S32 | Self::F32 => 4,
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Most channels a frame may carry.
pub const MAX_CHANNELS: u32 = 254;

/// Semantic role of one channel inside an interleaved frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Channel {
    #[default]
    None,
    Mono,
    FrontLeft,
    FrontRight,
    FrontCenter,
    Lfe,
    BackLeft,
    BackRight,
    FrontLeftCenter,
    FrontRightCenter,
    BackCenter,
    SideLeft,
    SideRight,
    TopCenter,
    TopFrontLeft,
    TopFrontCenter,
    TopFrontRight,
    TopBackLeft,
    TopBackCenter,
    TopBackRight,
    Left,
    Right,
}

impl Channel {
    /// Standard channel layout for `channels` interleaved channels.
    ///
    /// Mono, stereo, 3.0, quad, 5.0, 5.1, 6.1 and 7.1 get their usual layouts.
    /// Wider layouts fall back to `None` for the channels beyond 7.1.
    pub fn default_map(channels: usize) -> Vec<Channel> {
        use Channel::*;

        match channels {
            0 => Vec::new(),
            1 => vec![Mono],
            2 => vec![FrontLeft, FrontRight],
            3 => vec![FrontLeft, FrontRight, FrontCenter],
            4 => vec![FrontLeft, FrontRight, BackLeft, BackRight],
            5 => vec![FrontLeft, FrontRight, FrontCenter, BackLeft, BackRight],
            6 => vec![FrontLeft, FrontRight, FrontCenter, Lfe, SideLeft, SideRight],
            7 => vec![
                FrontLeft,
                FrontRight,
                FrontCenter,
                Lfe,
                BackCenter,
                SideLeft,
                SideRight,
            ],
            n => {
                let mut map = vec![
                    FrontLeft,
                    FrontRight,
                    FrontCenter,
                    Lfe,
                    BackLeft,
                    BackRight,
                    SideLeft,
                    SideRight,
                ];
                map.resize(n, None);
                map
            }
        }
    }
}

/// The negotiated format triple of a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFormat {
    pub format: SampleFormat,
    pub channels: u32,
    pub sample_rate: u32,
}

impl DataFormat {
    pub fn new(format: SampleFormat, channels: u32, sample_rate: u32) -> Self {
        Self {
            format,
            channels,
            sample_rate,
        }
    }

    /// Bytes occupied by one interleaved frame.
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.format.bytes_per_sample()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_frame() {
        assert_eq!(DataFormat::new(SampleFormat::F32, 2, 48000).bytes_per_frame(), 8);
        assert_eq!(DataFormat::new(SampleFormat::S24, 6, 44100).bytes_per_frame(), 18);
        assert_eq!(DataFormat::new(SampleFormat::Unknown, 2, 48000).bytes_per_frame(), 0);
    }

    #[test]
    fn test_default_map_lengths() {
        for n in 0..12 {
            assert_eq!(Channel::default_map(n).len(), n);
        }
        assert_eq!(Channel::default_map(1), vec![Channel::Mono]);
        assert_eq!(Channel::default_map(10)[9], Channel::None);
    }
}
