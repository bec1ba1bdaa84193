use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom};

use super::constants::*;
use super::error::WfmFormatError;

/// Byte order declared by the first two bytes of a WFM file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// The byte order of the machine we are running on
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            Self::Little
        } else {
            Self::Big
        }
    }

    fn from_marker(marker: [u8; 2]) -> Result<Self, WfmFormatError> {
        match marker {
            BYTE_ORDER_LITTLE => Ok(Self::Little),
            BYTE_ORDER_BIG => Ok(Self::Big),
            _ => Err(WfmFormatError::UnknownByteOrder(marker)),
        }
    }

    /// True when raw samples read in host order must be swapped to match the file
    pub fn needs_swap(&self) -> bool {
        *self != Self::native()
    }
}

/// Storage format of a single raw sample in the curve buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    Int8,
    Int16,
    Int32,
    Float32,
}

impl SampleFormat {
    pub fn from_code(code: i32) -> Result<Self, WfmFormatError> {
        match code {
            FORMAT_INT8 => Ok(Self::Int8),
            FORMAT_INT16 => Ok(Self::Int16),
            FORMAT_INT32 => Ok(Self::Int32),
            FORMAT_FP32 => Ok(Self::Float32),
            _ => Err(WfmFormatError::UnknownSampleFormat(code)),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Int8 => FORMAT_INT8,
            Self::Int16 => FORMAT_INT16,
            Self::Int32 => FORMAT_INT32,
            Self::Float32 => FORMAT_FP32,
        }
    }

    pub fn size_bytes(&self) -> usize {
        match self {
            Self::Int8 => 1,
            Self::Int16 => 2,
            Self::Int32 | Self::Float32 => 4,
        }
    }
}

/// The subset of the Tektronix WFM static header needed to decode the curve buffer.
///
/// Only the fields at fixed offsets are read; the remainder of the header (and any
/// pre/post charge samples) is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct WfmHeader {
    pub byte_order: Endianness,
    pub version: String,
    pub bytes_per_point: i8,
    pub curve_offset: u32,
    pub fastframe_count: u32,
    pub set_type: i32,
    pub volt_scale: f64,
    pub volt_offset: f64,
    pub sample_format: SampleFormat,
    pub time_scale: f64,
    pub time_offset: f64,
    pub time_size: u32,
}

impl WfmHeader {
    /// Parse the header from the start of a WFM buffer
    pub fn parse(buffer: &[u8]) -> Result<Self, WfmFormatError> {
        let mut cursor = Cursor::new(buffer);
        let mut marker = [0u8; 2];
        cursor.seek(SeekFrom::Start(OFFSET_BYTE_ORDER))?;
        cursor.read_exact(&mut marker)?;
        match Endianness::from_marker(marker)? {
            Endianness::Little => Self::parse_fields::<LittleEndian>(&mut cursor, Endianness::Little),
            Endianness::Big => Self::parse_fields::<BigEndian>(&mut cursor, Endianness::Big),
        }
    }

    fn parse_fields<E: ByteOrder>(
        cursor: &mut Cursor<&[u8]>,
        byte_order: Endianness,
    ) -> Result<Self, WfmFormatError> {
        let mut version_bytes = [0u8; VERSION_LENGTH];
        cursor.seek(SeekFrom::Start(OFFSET_VERSION))?;
        cursor.read_exact(&mut version_bytes)?;
        let version = String::from_utf8_lossy(&version_bytes)
            .trim_end_matches(['\0', ' '])
            .to_string();

        cursor.seek(SeekFrom::Start(OFFSET_BYTES_PER_POINT))?;
        let bytes_per_point = cursor.read_i8()?;
        cursor.seek(SeekFrom::Start(OFFSET_CURVE_OFFSET))?;
        let curve_offset = cursor.read_u32::<E>()?;
        cursor.seek(SeekFrom::Start(OFFSET_FASTFRAME_COUNT))?;
        let fastframe_count = cursor.read_u32::<E>()?;
        cursor.seek(SeekFrom::Start(OFFSET_SET_TYPE))?;
        let set_type = cursor.read_i32::<E>()?;

        // Explicit dimension 1 (voltage)
        cursor.seek(SeekFrom::Start(OFFSET_VOLT_SCALE))?;
        let volt_scale = cursor.read_f64::<E>()?;
        cursor.seek(SeekFrom::Start(OFFSET_VOLT_OFFSET))?;
        let volt_offset = cursor.read_f64::<E>()?;
        cursor.seek(SeekFrom::Start(OFFSET_DATA_FORMAT))?;
        let sample_format = SampleFormat::from_code(cursor.read_i32::<E>()?)?;

        // Implicit dimension 1 (time)
        cursor.seek(SeekFrom::Start(OFFSET_TIME_SCALE))?;
        let time_scale = cursor.read_f64::<E>()?;
        cursor.seek(SeekFrom::Start(OFFSET_TIME_OFFSET))?;
        let time_offset = cursor.read_f64::<E>()?;
        cursor.seek(SeekFrom::Start(OFFSET_TIME_SIZE))?;
        let time_size = cursor.read_u32::<E>()?;

        let header = Self {
            byte_order,
            version,
            bytes_per_point,
            curve_offset,
            fastframe_count,
            set_type,
            volt_scale,
            volt_offset,
            sample_format,
            time_scale,
            time_offset,
            time_size,
        };
        if header.bytes_per_point as usize != sample_format.size_bytes() {
            log::warn!(
                "WFM header declares {} bytes per point but sample format {:?} uses {}",
                header.bytes_per_point,
                sample_format,
                sample_format.size_bytes()
            );
        }
        Ok(header)
    }

    /// Number of frames the header claims are stored in the curve buffer
    pub fn declared_frames(&self) -> usize {
        if self.set_type == SET_TYPE_SINGLE {
            1
        } else {
            self.fastframe_count as usize + 1
        }
    }

    pub fn samples_per_frame(&self) -> usize {
        self.time_size as usize
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Write;

    /// Fields used to build a synthetic header in tests
    pub(crate) struct HeaderSpec {
        pub byte_order: Endianness,
        pub format_code: i32,
        pub bytes_per_point: i8,
        pub fastframe_count: u32,
        pub set_type: i32,
        pub volt_scale: f64,
        pub volt_offset: f64,
        pub time_scale: f64,
        pub time_offset: f64,
        pub time_size: u32,
    }

    impl Default for HeaderSpec {
        fn default() -> Self {
            Self {
                byte_order: Endianness::Little,
                format_code: FORMAT_INT16,
                bytes_per_point: 2,
                fastframe_count: 0,
                set_type: 1,
                volt_scale: 1.0e-4,
                volt_offset: 0.0,
                time_scale: 1.0e-10,
                time_offset: 0.0,
                time_size: 10,
            }
        }
    }

    fn write_at<E: ByteOrder>(buffer: &mut [u8], spec: &HeaderSpec) {
        let mut cursor = Cursor::new(buffer);
        cursor.set_position(OFFSET_VERSION);
        cursor.write_all(b":WFM#003").unwrap();
        cursor.set_position(OFFSET_BYTES_PER_POINT);
        cursor.write_i8(spec.bytes_per_point).unwrap();
        cursor.set_position(OFFSET_CURVE_OFFSET);
        cursor.write_u32::<E>(MIN_HEADER_SIZE as u32).unwrap();
        cursor.set_position(OFFSET_FASTFRAME_COUNT);
        cursor.write_u32::<E>(spec.fastframe_count).unwrap();
        cursor.set_position(OFFSET_SET_TYPE);
        cursor.write_i32::<E>(spec.set_type).unwrap();
        cursor.set_position(OFFSET_VOLT_SCALE);
        cursor.write_f64::<E>(spec.volt_scale).unwrap();
        cursor.set_position(OFFSET_VOLT_OFFSET);
        cursor.write_f64::<E>(spec.volt_offset).unwrap();
        cursor.set_position(OFFSET_DATA_FORMAT);
        cursor.write_i32::<E>(spec.format_code).unwrap();
        cursor.set_position(OFFSET_TIME_SCALE);
        cursor.write_f64::<E>(spec.time_scale).unwrap();
        cursor.set_position(OFFSET_TIME_OFFSET);
        cursor.write_f64::<E>(spec.time_offset).unwrap();
        cursor.set_position(OFFSET_TIME_SIZE);
        cursor.write_u32::<E>(spec.time_size).unwrap();
    }

    /// Build a header whose curve buffer starts immediately after it
    pub(crate) fn build_header(spec: &HeaderSpec) -> Vec<u8> {
        let mut buffer = vec![0u8; MIN_HEADER_SIZE];
        match spec.byte_order {
            Endianness::Little => {
                buffer[..2].copy_from_slice(&BYTE_ORDER_LITTLE);
                write_at::<LittleEndian>(&mut buffer, spec);
            }
            Endianness::Big => {
                buffer[..2].copy_from_slice(&BYTE_ORDER_BIG);
                write_at::<BigEndian>(&mut buffer, spec);
            }
        }
        buffer
    }

    #[test]
    fn test_parse_little_endian() {
        let spec = HeaderSpec {
            fastframe_count: 4,
            time_size: 1000,
            ..Default::default()
        };
        let header = WfmHeader::parse(&build_header(&spec)).unwrap();
        assert_eq!(header.byte_order, Endianness::Little);
        assert_eq!(header.version, ":WFM#003");
        assert_eq!(header.curve_offset, MIN_HEADER_SIZE as u32);
        assert_eq!(header.sample_format, SampleFormat::Int16);
        assert_eq!(header.declared_frames(), 5);
        assert_eq!(header.samples_per_frame(), 1000);
        assert_eq!(header.volt_scale, 1.0e-4);
        assert_eq!(header.time_scale, 1.0e-10);
    }

    #[test]
    fn test_parse_big_endian_matches_little() {
        let little = HeaderSpec {
            fastframe_count: 9,
            volt_offset: -0.25,
            time_offset: -5.0e-8,
            ..Default::default()
        };
        let big = HeaderSpec {
            byte_order: Endianness::Big,
            fastframe_count: 9,
            volt_offset: -0.25,
            time_offset: -5.0e-8,
            ..Default::default()
        };
        let mut parsed_little = WfmHeader::parse(&build_header(&little)).unwrap();
        let parsed_big = WfmHeader::parse(&build_header(&big)).unwrap();
        assert_eq!(parsed_big.byte_order, Endianness::Big);
        parsed_little.byte_order = Endianness::Big;
        assert_eq!(parsed_little, parsed_big);
    }

    #[test]
    fn test_single_waveform_set_type() {
        let spec = HeaderSpec {
            fastframe_count: 99,
            set_type: SET_TYPE_SINGLE,
            ..Default::default()
        };
        let header = WfmHeader::parse(&build_header(&spec)).unwrap();
        assert_eq!(header.declared_frames(), 1);
    }

    #[test]
    fn test_bad_byte_order() {
        let mut buffer = build_header(&HeaderSpec::default());
        buffer[0] = 0x12;
        buffer[1] = 0x34;
        match WfmHeader::parse(&buffer) {
            Err(WfmFormatError::UnknownByteOrder(marker)) => assert_eq!(marker, [0x12, 0x34]),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_bad_sample_format() {
        let spec = HeaderSpec {
            format_code: 3,
            ..Default::default()
        };
        assert!(matches!(
            WfmHeader::parse(&build_header(&spec)),
            Err(WfmFormatError::UnknownSampleFormat(3))
        ));
    }

    #[test]
    fn test_truncated_header() {
        let buffer = build_header(&HeaderSpec::default());
        assert!(matches!(
            WfmHeader::parse(&buffer[..300]),
            Err(WfmFormatError::TruncatedHeader(_))
        ));
    }

    #[test]
    fn test_needs_swap() {
        assert!(!Endianness::native().needs_swap());
        let foreign = match Endianness::native() {
            Endianness::Little => Endianness::Big,
            Endianness::Big => Endianness::Little,
        };
        assert!(foreign.needs_swap());
    }
}
