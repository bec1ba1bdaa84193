use byteorder::{ByteOrder, NativeEndian};
use ndarray::{s, Array1, Array2, ArrayView1};
use std::path::{Path, PathBuf};

use super::error::WfmFileError;
use super::wfm_header::{SampleFormat, WfmHeader};

/// Convert raw codes to volts: `code * scale + offset`
fn to_volts<T: Copy + Into<f64>>(raw: &[T], scale: f64, offset: f64) -> Vec<f64> {
    raw.iter().map(|code| (*code).into() * scale + offset).collect()
}

/// Decode the curve payload to volts. Samples are read in host order, then swapped
/// if `swap` is set.
fn convert_curve(
    payload: &[u8],
    format: SampleFormat,
    swap: bool,
    scale: f64,
    offset: f64,
) -> Vec<f64> {
    let n = payload.len() / format.size_bytes();
    match format {
        SampleFormat::Int8 => {
            let raw: Vec<i8> = payload.iter().map(|b| *b as i8).collect();
            to_volts(&raw, scale, offset)
        }
        SampleFormat::Int16 => {
            let mut raw = vec![0i16; n];
            NativeEndian::read_i16_into(payload, &mut raw);
            if swap {
                raw.iter_mut().for_each(|v| *v = v.swap_bytes());
            }
            to_volts(&raw, scale, offset)
        }
        SampleFormat::Int32 => {
            let mut raw = vec![0i32; n];
            NativeEndian::read_i32_into(payload, &mut raw);
            if swap {
                raw.iter_mut().for_each(|v| *v = v.swap_bytes());
            }
            to_volts(&raw, scale, offset)
        }
        SampleFormat::Float32 => {
            let mut raw = vec![0f32; n];
            NativeEndian::read_f32_into(payload, &mut raw);
            if swap {
                raw.iter_mut()
                    .for_each(|v| *v = f32::from_bits(v.to_bits().swap_bytes()));
            }
            to_volts(&raw, scale, offset)
        }
    }
}

/// The decoded contents of one capture file: a shared time axis and one voltage
/// trace per frame (event).
///
/// `traces` has shape (frames, samples). Frame `i` is event `i` of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveforms {
    pub time: Array1<f64>,
    pub traces: Array2<f64>,
}

impl Waveforms {
    pub fn n_frames(&self) -> usize {
        self.traces.nrows()
    }

    pub fn samples_per_frame(&self) -> usize {
        self.traces.ncols()
    }

    pub fn trace(&self, frame: usize) -> ArrayView1<'_, f64> {
        self.traces.row(frame)
    }

    /// Drop every frame past `n_frames`. Does nothing if there are already fewer.
    pub fn truncate(&mut self, n_frames: usize) {
        if n_frames < self.n_frames() {
            self.traces = self.traces.slice(s![..n_frames, ..]).to_owned();
        }
    }
}

/// Decode a complete WFM buffer into its header and waveforms.
///
/// If the buffer holds fewer samples than the header declares, the frame count is
/// reduced to the number of complete frames present. Only a buffer without a single
/// complete frame is an error.
pub fn decode(buffer: &[u8]) -> Result<(WfmHeader, Waveforms), WfmFileError> {
    let header = WfmHeader::parse(buffer)?;
    let frame_size = header.samples_per_frame();
    let declared_frames = header.declared_frames();
    let sample_size = header.sample_format.size_bytes();

    let payload = buffer.get(header.curve_offset as usize..).unwrap_or(&[]);
    let available = payload.len() / sample_size;
    let n_frames = if frame_size == 0 {
        0
    } else {
        declared_frames.min(available / frame_size)
    };
    if n_frames == 0 {
        return Err(WfmFileError::ShortFile {
            available,
            frame_size,
        });
    }
    if n_frames < declared_frames {
        log::warn!(
            "WFM curve buffer holds {} of {} declared frames; truncating",
            n_frames,
            declared_frames
        );
    }

    let payload = &payload[..n_frames * frame_size * sample_size];
    let volts = convert_curve(
        payload,
        header.sample_format,
        header.byte_order.needs_swap(),
        header.volt_scale,
        header.volt_offset,
    );
    let traces = Array2::from_shape_vec((n_frames, frame_size), volts)?;
    let time = Array1::from_iter(
        (0..frame_size).map(|k| k as f64 * header.time_scale + header.time_offset),
    );

    Ok((header, Waveforms { time, traces }))
}

/// A single channel capture file loaded from disk.
#[derive(Debug, Clone)]
pub struct WfmFile {
    path: PathBuf,
    size_bytes: u64,
    pub header: WfmHeader,
    pub waveforms: Waveforms,
}

impl WfmFile {
    /// Read and decode the file at path
    pub fn open(path: &Path) -> Result<Self, WfmFileError> {
        if !path.exists() {
            return Err(WfmFileError::BadFilePath(path.to_path_buf()));
        }
        let buffer = std::fs::read(path)?;
        let (header, waveforms) = decode(&buffer)?;
        log::info!(
            "Decoded {} ({}): {} frames x {} samples",
            path.display(),
            human_bytes::human_bytes(buffer.len() as f64),
            waveforms.n_frames(),
            waveforms.samples_per_frame()
        );
        Ok(Self {
            path: path.to_path_buf(),
            size_bytes: buffer.len() as u64,
            header,
            waveforms,
        })
    }

    pub fn get_path(&self) -> &Path {
        &self.path
    }

    pub fn get_size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::wfm_header::tests::{build_header, HeaderSpec};
    use crate::wfm_header::Endianness;
    use approx::assert_relative_eq;

    fn int16_file(spec: &HeaderSpec, codes: &[i16]) -> Vec<u8> {
        let mut buffer = build_header(spec);
        for code in codes {
            match spec.byte_order {
                Endianness::Little => buffer.extend_from_slice(&code.to_le_bytes()),
                Endianness::Big => buffer.extend_from_slice(&code.to_be_bytes()),
            }
        }
        buffer
    }

    #[test]
    fn test_decode_single_pulse() {
        let spec = HeaderSpec {
            time_size: 1000,
            ..Default::default()
        };
        let mut codes = vec![0i16; 1000];
        codes[400] = -2000;
        let (header, waveforms) = decode(&int16_file(&spec, &codes)).unwrap();
        assert_eq!(header.declared_frames(), 1);
        assert_eq!(waveforms.n_frames(), 1);
        assert_eq!(waveforms.samples_per_frame(), 1000);
        assert_relative_eq!(waveforms.traces[[0, 400]], -0.2, max_relative = 1e-12);
        assert_eq!(waveforms.traces[[0, 399]], 0.0);
    }

    #[test]
    fn test_time_axis() {
        let spec = HeaderSpec {
            time_size: 4,
            time_scale: 2.0e-10,
            time_offset: -1.0e-9,
            ..Default::default()
        };
        let (_, waveforms) = decode(&int16_file(&spec, &[0, 0, 0, 0])).unwrap();
        let expected = [-1.0e-9, -0.8e-9, -0.6e-9, -0.4e-9];
        for (t, e) in waveforms.time.iter().zip(expected.iter()) {
            assert_relative_eq!(*t, *e, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_volt_offset_applied() {
        let spec = HeaderSpec {
            time_size: 2,
            volt_scale: 0.5,
            volt_offset: 0.25,
            ..Default::default()
        };
        let (_, waveforms) = decode(&int16_file(&spec, &[2, -4])).unwrap();
        assert_eq!(waveforms.traces[[0, 0]], 1.25);
        assert_eq!(waveforms.traces[[0, 1]], -1.75);
    }

    #[test]
    fn test_truncates_partial_frames() {
        // Declares 5 frames of 10 samples, but only 3.5 frames were written
        let spec = HeaderSpec {
            fastframe_count: 4,
            time_size: 10,
            ..Default::default()
        };
        let codes: Vec<i16> = (0..35).map(|i| -(i as i16)).collect();
        let (_, waveforms) = decode(&int16_file(&spec, &codes)).unwrap();
        assert_eq!(waveforms.n_frames(), 3);
        assert_relative_eq!(waveforms.traces[[2, 9]], -29.0e-4, max_relative = 1e-12);
    }

    #[test]
    fn test_ignores_trailing_samples() {
        let spec = HeaderSpec {
            fastframe_count: 1,
            time_size: 3,
            ..Default::default()
        };
        let (_, waveforms) = decode(&int16_file(&spec, &[1, 2, 3, 4, 5, 6, 7, 8])).unwrap();
        assert_eq!(waveforms.n_frames(), 2);
    }

    #[test]
    fn test_short_file() {
        let spec = HeaderSpec {
            time_size: 10,
            ..Default::default()
        };
        match decode(&int16_file(&spec, &[1, 2, 3])) {
            Err(WfmFileError::ShortFile {
                available,
                frame_size,
            }) => {
                assert_eq!(available, 3);
                assert_eq!(frame_size, 10);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_zero_length_frames_are_short() {
        let spec = HeaderSpec {
            time_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            decode(&int16_file(&spec, &[1, 2])),
            Err(WfmFileError::ShortFile { .. })
        ));
    }

    #[test]
    fn test_float_samples_in_both_byte_orders() {
        let samples = [0.0f32, -0.125, -3.5, 1.0e-3, 42.0];
        let mut decoded = Vec::new();
        for byte_order in [Endianness::Little, Endianness::Big] {
            let spec = HeaderSpec {
                byte_order,
                format_code: FORMAT_FP32,
                bytes_per_point: 4,
                volt_scale: 1.0,
                time_size: samples.len() as u32,
                ..Default::default()
            };
            let mut buffer = build_header(&spec);
            for s in samples {
                match byte_order {
                    Endianness::Little => buffer.extend_from_slice(&s.to_le_bytes()),
                    Endianness::Big => buffer.extend_from_slice(&s.to_be_bytes()),
                }
            }
            let (_, waveforms) = decode(&buffer).unwrap();
            decoded.push(waveforms.traces);
        }
        assert_eq!(decoded[0], decoded[1]);
        for (v, s) in decoded[0].iter().zip(samples.iter()) {
            assert_eq!(*v, *s as f64);
        }
    }

    #[test]
    fn test_int8_and_int32_formats() {
        let spec = HeaderSpec {
            byte_order: Endianness::Big,
            format_code: FORMAT_INT32,
            bytes_per_point: 4,
            volt_scale: 1.0,
            time_size: 2,
            ..Default::default()
        };
        let mut buffer = build_header(&spec);
        buffer.extend_from_slice(&(-70000i32).to_be_bytes());
        buffer.extend_from_slice(&(123456i32).to_be_bytes());
        let (_, waveforms) = decode(&buffer).unwrap();
        assert_eq!(waveforms.traces[[0, 0]], -70000.0);
        assert_eq!(waveforms.traces[[0, 1]], 123456.0);

        let spec = HeaderSpec {
            format_code: FORMAT_INT8,
            bytes_per_point: 1,
            volt_scale: 1.0,
            time_size: 3,
            ..Default::default()
        };
        let mut buffer = build_header(&spec);
        buffer.extend_from_slice(&[0x80, 0x7f, 0xff]);
        let (_, waveforms) = decode(&buffer).unwrap();
        assert_eq!(waveforms.traces.row(0).to_vec(), vec![-128.0, 127.0, -1.0]);
    }

    #[test]
    fn test_truncate_waveforms() {
        let spec = HeaderSpec {
            fastframe_count: 2,
            time_size: 2,
            ..Default::default()
        };
        let (_, mut waveforms) = decode(&int16_file(&spec, &[1, 2, 3, 4, 5, 6])).unwrap();
        waveforms.truncate(5);
        assert_eq!(waveforms.n_frames(), 3);
        waveforms.truncate(1);
        assert_eq!(waveforms.n_frames(), 1);
        assert_eq!(waveforms.trace(0).to_vec(), vec![1.0e-4, 2.0e-4]);
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(
            WfmFile::open(Path::new("/definitely/not/here_Ch1.wfm")),
            Err(WfmFileError::BadFilePath(_))
        ));
    }
}
