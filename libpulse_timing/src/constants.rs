// Tektronix WFM header layout. All offsets are in bytes from the start of the file.
pub const OFFSET_BYTE_ORDER: u64 = 0;
pub const OFFSET_VERSION: u64 = 2;
pub const OFFSET_BYTES_PER_POINT: u64 = 15;
pub const OFFSET_CURVE_OFFSET: u64 = 16;
pub const OFFSET_FASTFRAME_COUNT: u64 = 72;
pub const OFFSET_SET_TYPE: u64 = 78;
pub const OFFSET_VOLT_SCALE: u64 = 168;
pub const OFFSET_VOLT_OFFSET: u64 = 176;
pub const OFFSET_DATA_FORMAT: u64 = 240;
pub const OFFSET_TIME_SCALE: u64 = 488;
pub const OFFSET_TIME_OFFSET: u64 = 496;
pub const OFFSET_TIME_SIZE: u64 = 504;

/// Smallest buffer which contains every header field we read
pub const MIN_HEADER_SIZE: usize = 508;
pub const VERSION_LENGTH: usize = 8;

pub const BYTE_ORDER_LITTLE: [u8; 2] = [0x0f, 0x0f];
pub const BYTE_ORDER_BIG: [u8; 2] = [0xf0, 0xf0];

pub const FORMAT_INT16: i32 = 0;
pub const FORMAT_INT32: i32 = 1;
pub const FORMAT_FP32: i32 = 4;
pub const FORMAT_INT8: i32 = 7;

/// Set type flag for a single (non fast-frame) waveform
pub const SET_TYPE_SINGLE: i32 = 0;

// Channel files are named <prefix>_Ch<N>.wfm
pub const CHANNEL_TAG: &str = "_Ch";
pub const WFM_EXTENSION: &str = "wfm";
pub const RUN_DIR_PREFIX: &str = "run";
pub const LAYOUT_TAG: &str = "config_";

/// Number of positions in the detector stack
pub const STACK_SIZE: usize = 4;

pub const SECONDS_TO_NS: f64 = 1.0e9;
pub const VOLTS_TO_MV: f64 = 1.0e3;
