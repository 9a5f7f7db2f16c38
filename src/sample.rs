//! Process-lifetime cache of mono PCM sample data loaded from WAV files.
//!
//! Populated lazily the first time a patch references a filename, and
//! shared by `Arc` across every voice and oscillator that plays the
//! same file. Never touched from inside `Engine::process` — loading
//! happens at construction time only (§5).

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use crate::oscillator::SampleData;

static CACHE: Lazy<Mutex<HashMap<String, SampleData>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Loads `path` into a shared mono `f32` PCM buffer, downmixing
/// multi-channel files by averaging channels. Returns the cached copy
/// on repeat loads of the same path.
pub fn load(path: impl AsRef<Path>) -> anyhow::Result<SampleData> {
    let key = path.as_ref().to_string_lossy().into_owned();

    let mut cache = CACHE.lock().expect("sample cache mutex poisoned");
    if let Some(existing) = cache.get(&key) {
        return Ok(existing.clone());
    }

    let mut reader = hound::WavReader::open(path.as_ref())?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let mono: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => downmix(reader.samples::<f32>().filter_map(Result::ok), channels),
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            downmix(
                reader
                    .samples::<i32>()
                    .filter_map(Result::ok)
                    .map(move |s| s as f32 / max),
                channels,
            )
        }
    };

    let data: SampleData = Arc::new(mono);
    cache.insert(key, data.clone());
    Ok(data)
}

fn downmix(samples: impl Iterator<Item = f32>, channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.collect();
    }
    let mut out = Vec::new();
    let mut frame = Vec::with_capacity(channels);
    for s in samples {
        frame.push(s);
        if frame.len() == channels {
            out.push(frame.iter().sum::<f32>() / channels as f32);
            frame.clear();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_wav(path: &Path, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn loads_and_caches_mono_wav() {
        let dir = std::env::temp_dir();
        let path = dir.join("jack_midi_synth_test_mono.wav");
        write_test_wav(&path, 1, &[0, i16::MAX, i16::MIN, 0]);

        let a = load(&path).unwrap();
        let b = load(&path).unwrap();
        assert!(Arc::ptr_eq(&a, &b), "repeat loads should hit the cache");
        assert_eq!(a.len(), 4);
        assert!((a[1] - 1.0).abs() < 1e-3);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn downmixes_stereo_to_mono() {
        let dir = std::env::temp_dir();
        let path = dir.join("jack_midi_synth_test_stereo.wav");
        // Two stereo frames: (L=1.0,R=-1.0), (L=0.5,R=0.5)
        write_test_wav(&path, 2, &[i16::MAX, i16::MIN, i16::MAX / 2, i16::MAX / 2]);

        let mono = load(&path).unwrap();
        assert_eq!(mono.len(), 2);
        assert!(mono[0].abs() < 1e-2);
        assert!((mono[1] - 0.5).abs() < 1e-2);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = load("/nonexistent/path/does_not_exist.wav");
        assert!(result.is_err());
    }
}
