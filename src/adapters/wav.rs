//! WAV encoding and decoding for synthesized audio.

use std::io::{Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::Synthesis;

/// Format of every file the pipeline writes: mono, 32-bit float
pub fn output_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    }
}

/// Encode mono samples as a WAV stream
pub fn write_wav<W: Write + Seek>(writer: W, synthesis: &Synthesis) -> Result<(), hound::Error> {
    let mut writer = WavWriter::new(writer, output_spec(synthesis.sample_rate))?;
    for &sample in &synthesis.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()
}

/// Decode a WAV file into mono float samples.
///
/// Integer formats are scaled to `[-1, 1]`; multi-channel audio is averaged
/// down to one channel.
pub fn read_mono(path: &Path) -> Result<Synthesis, hound::Error> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let channels = usize::from(spec.channels.max(1));
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(Synthesis::new(samples, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::BufWriter;
    use tempfile::TempDir;

    #[test]
    fn test_float_file_reads_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.wav");
        let clip = Synthesis::new(vec![0.0, 0.5, -0.5, 0.25], 16000);

        write_wav(BufWriter::new(File::create(&path).unwrap()), &clip).unwrap();
        assert_eq!(read_mono(&path).unwrap(), clip);
    }

    #[test]
    fn test_int_stereo_is_scaled_and_downmixed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for sample in [16384i16, 0, -16384, -16384] {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();

        let clip = read_mono(&path).unwrap();
        assert_eq!(clip.sample_rate, 8000);
        assert_eq!(clip.samples, vec![0.25, -0.5]);
    }
}
