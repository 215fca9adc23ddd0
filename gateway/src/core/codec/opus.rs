//! Opus identification header (`OpusHead`, RFC 7845 section 5.1).

use super::{CodecError, CodecResult};

/// Magic signature at the start of the identification header.
pub const OPUS_HEAD_MAGIC: &[u8; 8] = b"OpusHead";

/// Minimum header length for mapping family 0.
pub const OPUS_HEAD_LEN: usize = 19;

/// Decoder configuration carried by the first page of an Opus stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpusHead {
    pub channel_count: u8,
    pub pre_skip: u16,
    /// Original input sample rate in Hz
    pub sample_rate: u32,
    /// Output gain in Q7.8 dB
    pub output_gain: i16,
    pub mapping_family: u8,
}

impl OpusHead {
    /// Parse an identification header.
    ///
    /// Only version 1, mono, mapping family 0 streams are accepted.
    pub fn parse(data: &[u8]) -> CodecResult<Self> {
        if data.len() < OPUS_HEAD_LEN {
            return Err(CodecError::Format(format!(
                "OpusHead too short: {} bytes",
                data.len()
            )));
        }
        if &data[0..8] != OPUS_HEAD_MAGIC {
            return Err(CodecError::Format(
                "OpusHead is not present in the configuration page".to_string(),
            ));
        }
        if data[8] != 1 {
            return Err(CodecError::Format(format!("Wrong Opus version {}", data[8])));
        }

        let channel_count = data[9];
        if channel_count != 1 {
            return Err(CodecError::Format(format!(
                "Unsupported number of channels: {channel_count}"
            )));
        }

        let mapping_family = data[18];
        if mapping_family != 0 {
            return Err(CodecError::Format(format!(
                "Unsupported mapping family {mapping_family}"
            )));
        }

        Ok(Self {
            channel_count,
            pre_skip: u16::from_le_bytes([data[10], data[11]]),
            sample_rate: u32::from_le_bytes([data[12], data[13], data[14], data[15]]),
            output_gain: i16::from_le_bytes([data[16], data[17]]),
            mapping_family,
        })
    }

    /// Serialize to the 19-byte family-0 layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(OPUS_HEAD_LEN);
        out.extend_from_slice(OPUS_HEAD_MAGIC);
        out.push(1);
        out.push(self.channel_count);
        out.extend_from_slice(&self.pre_skip.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&self.output_gain.to_le_bytes());
        out.push(self.mapping_family);
        out
    }
}

impl Default for OpusHead {
    fn default() -> Self {
        Self {
            channel_count: 1,
            pre_skip: 312,
            sample_rate: 48_000,
            output_gain: 0,
            mapping_family: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mono_head() {
        let raw = [
            b'O', b'p', b'u', b's', b'H', b'e', b'a', b'd', //
            1, 1, // version, channels
            0x38, 0x01, // pre-skip 312
            0x80, 0xBB, 0x00, 0x00, // 48000
            0xFE, 0xFF, // gain -2
            0, // mapping family
        ];
        let head = OpusHead::parse(&raw).unwrap();
        assert_eq!(head.channel_count, 1);
        assert_eq!(head.pre_skip, 312);
        assert_eq!(head.sample_rate, 48_000);
        assert_eq!(head.output_gain, -2);
        assert_eq!(head.mapping_family, 0);
    }

    #[test]
    fn test_to_bytes_parses_back() {
        let head = OpusHead {
            sample_rate: 16_000,
            ..Default::default()
        };
        assert_eq!(OpusHead::parse(&head.to_bytes()).unwrap(), head);
    }

    #[test]
    fn test_wrong_magic() {
        let mut raw = OpusHead::default().to_bytes();
        raw[..8].copy_from_slice(b"OpusTags");
        assert!(matches!(
            OpusHead::parse(&raw),
            Err(CodecError::Format(_))
        ));
    }

    #[test]
    fn test_wrong_version() {
        let mut raw = OpusHead::default().to_bytes();
        raw[8] = 2;
        let err = OpusHead::parse(&raw).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_stereo_rejected() {
        let head = OpusHead {
            channel_count: 2,
            ..Default::default()
        };
        let err = OpusHead::parse(&head.to_bytes()).unwrap_err();
        assert!(err.to_string().contains("channels"));
    }

    #[test]
    fn test_mapping_family_rejected() {
        let mut raw = OpusHead::default().to_bytes();
        raw[18] = 1;
        let err = OpusHead::parse(&raw).unwrap_err();
        assert!(err.to_string().contains("mapping family"));
    }

    #[test]
    fn test_short_header_rejected() {
        let raw = OpusHead::default().to_bytes();
        assert!(OpusHead::parse(&raw[..12]).is_err());
    }
}
