//! Native `cpal` audio host: device/host selection, a carry buffer that
//! decouples the engine's fixed block size from whatever size the
//! driver actually requests, and sample-format conversion on the way out.

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, HostId, Sample, SampleFormat, SizedSample, StreamConfig, SupportedBufferSize,
};
use dasp_sample::FromSample;

const JACK_HOST_BUFFER: usize = 128;
const ALSA_HOST_BUFFER: usize = 256;
const DEFAULT_HOST_BUFFER: usize = 256;
const ENGINE_BLOCK_SIZE: usize = 256;
const TARGET_CHANNELS: u16 = 2;
const PREFERRED_SAMPLE_RATE: u32 = 48_000;

/// Something that can render one mono block at a time. The host
/// duplicates it across both output channels.
pub trait AudioRenderer: Send + 'static {
    fn process_block(&mut self, output: &mut [f32]);
}

#[derive(Debug, Clone)]
pub struct HostInfo {
    pub id: HostId,
    pub name: String,
    pub has_default_device: bool,
}

#[derive(Debug, Clone)]
pub struct AudioHostConfig {
    pub sample_rate: f32,
    pub channels: u16,
    pub buffer_size: usize,
    pub device_name: String,
    pub host_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct AudioHostOptions {
    pub preferred_host: Option<String>,
    pub buffer_size: Option<usize>,
}

pub struct AudioHost {
    _stream: cpal::Stream,
    config: AudioHostConfig,
}

struct CarryBuffer<R: AudioRenderer> {
    renderer: R,
    engine_block_size: usize,
    carry: Vec<f32>,
    carry_available: usize,
    carry_index: usize,
    call_count: usize,
}

impl<R: AudioRenderer> CarryBuffer<R> {
    fn new(renderer: R, engine_block_size: usize) -> Self {
        let engine_block_size = engine_block_size.max(1);
        Self {
            renderer,
            engine_block_size,
            carry: vec![0.0; engine_block_size],
            carry_available: 0,
            carry_index: 0,
            call_count: 0,
        }
    }
}

unsafe impl<R: AudioRenderer> Send for CarryBuffer<R> {}

impl AudioHost {
    pub fn list_hosts() -> Vec<HostInfo> {
        cpal::available_hosts()
            .into_iter()
            .filter_map(|host_id| {
                let host = cpal::host_from_id(host_id).ok()?;
                Some(HostInfo {
                    id: host_id,
                    name: host_id.name().to_string(),
                    has_default_device: host.default_output_device().is_some(),
                })
            })
            .collect()
    }

    pub fn with_options<R, F>(factory: F, options: AudioHostOptions) -> anyhow::Result<Self>
    where
        R: AudioRenderer,
        F: FnOnce(f32, usize) -> R,
    {
        let (device, config, sample_format, host_name, buffer_range, block_size_hint) =
            select_output_device(options.preferred_host.as_deref(), options.buffer_size)?;

        println!("=== AUDIO CONFIGURATION ===");
        if let Some((min, max)) = buffer_range {
            println!("Device buffer size range: {}..={} frames", min, max);
        }

        let sample_rate = config.sample_rate.0 as f32;
        let device_name = device
            .name()
            .unwrap_or_else(|_| "Unknown device".to_string());
        println!("Sample rate: {} Hz", sample_rate);
        println!("Channels: {}", config.channels);

        let engine_block_size = options.buffer_size.unwrap_or(ENGINE_BLOCK_SIZE).max(1);
        if engine_block_size != block_size_hint {
            println!(
                "Engine block size fixed at {} frames (host target: {})",
                engine_block_size, block_size_hint
            );
        }

        let renderer = factory(sample_rate, engine_block_size);
        let host_config = AudioHostConfig {
            sample_rate,
            channels: config.channels,
            buffer_size: engine_block_size,
            device_name: device_name.clone(),
            host_name: host_name.clone(),
        };

        let buffer = CarryBuffer::new(renderer, engine_block_size);

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32, R>(device, config, buffer)?,
            SampleFormat::I16 => build_stream::<i16, R>(device, config, buffer)?,
            SampleFormat::U16 => build_stream::<u16, R>(device, config, buffer)?,
            other => anyhow::bail!("unsupported sample format: {:?}", other),
        };

        stream.play().context("failed to start stream")?;

        println!("\n=== NOW PLAYING ===");
        println!(
            "Host: '{}', Device: '{}', Sample Rate: {} Hz, Block: {}",
            host_name, device_name, sample_rate, engine_block_size
        );

        Ok(Self {
            _stream: stream,
            config: host_config,
        })
    }

    pub fn config(&self) -> &AudioHostConfig {
        &self.config
    }
}

fn select_output_device(
    preferred_host: Option<&str>,
    custom_buffer_size: Option<usize>,
) -> anyhow::Result<(
    cpal::Device,
    StreamConfig,
    SampleFormat,
    String,
    Option<(u32, u32)>,
    usize,
)> {
    let mut last_error: Option<anyhow::Error> = None;
    let available_hosts = cpal::available_hosts();

    println!("=== AVAILABLE AUDIO HOSTS ===");
    for host_id in &available_hosts {
        let marker = if Some(host_id.name()) == preferred_host {
            " (preferred)"
        } else {
            ""
        };
        println!("  - {}{}", host_id.name(), marker);
    }
    println!();

    let mut host_priority = Vec::new();
    if let Some(preferred) = preferred_host {
        if let Some(&host_id) = available_hosts.iter().find(|&h| h.name() == preferred) {
            host_priority.push(host_id);
        }
    }
    for host_id in available_hosts {
        if !host_priority.contains(&host_id) {
            host_priority.push(host_id);
        }
    }

    for host_id in host_priority {
        let host = cpal::host_from_id(host_id)?;
        let host_name = host_id.name().to_string();

        let Some(device) = host.default_output_device() else {
            last_error = Some(anyhow::anyhow!(
                "host {} has no default output device",
                host_name
            ));
            continue;
        };

        let supported_configs = match device.supported_output_configs() {
            Ok(configs) => configs.collect::<Vec<_>>(),
            Err(err) => {
                last_error = Some(anyhow::anyhow!(
                    "failed to enumerate output configs for host {}: {}",
                    host_name,
                    err
                ));
                Vec::new()
            }
        };

        for supported in supported_configs.iter().cloned() {
            if supported.channels() != TARGET_CHANNELS {
                continue;
            }
            if let Some((config, sample_format, range, block_size)) =
                try_config(supported, &host_name, custom_buffer_size)
            {
                return Ok((device, config, sample_format, host_name, range, block_size));
            }
        }

        if let Ok(supported) = device.default_output_config() {
            if let Some((config, sample_format, range, block_size)) =
                try_config(supported, &host_name, custom_buffer_size)
            {
                return Ok((device, config, sample_format, host_name, range, block_size));
            }
        }

        last_error = Some(anyhow::anyhow!(
            "no usable output config for host {}",
            host_name
        ));
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("no usable output device found")))
}

fn try_config(
    supported: cpal::SupportedStreamConfigRange,
    host_name: &str,
    custom_buffer_size: Option<usize>,
) -> Option<(StreamConfig, SampleFormat, Option<(u32, u32)>, usize)> {
    let sample_format = supported.sample_format();
    if !matches!(
        sample_format,
        SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
    ) {
        return None;
    }

    let rate = if supported.min_sample_rate().0 <= PREFERRED_SAMPLE_RATE
        && supported.max_sample_rate().0 >= PREFERRED_SAMPLE_RATE
    {
        PREFERRED_SAMPLE_RATE
    } else {
        supported.max_sample_rate().0
    };

    let supported_config = supported.with_sample_rate(cpal::SampleRate(rate));
    let (buffer_size, range, block_size) = choose_buffer_size(
        supported_config.buffer_size().clone(),
        host_name,
        custom_buffer_size,
    );
    let mut config = supported_config.config();
    config.buffer_size = buffer_size;

    println!(
        "Using sample rate: {} Hz (format: {:?}, channels: {})",
        rate, sample_format, config.channels
    );

    Some((config, sample_format, range, block_size))
}

fn choose_buffer_size(
    supported: SupportedBufferSize,
    host_name: &str,
    custom_buffer_size: Option<usize>,
) -> (BufferSize, Option<(u32, u32)>, usize) {
    let preferred_buffer_size = custom_buffer_size.unwrap_or(match host_name {
        "JACK" => JACK_HOST_BUFFER,
        "ALSA" => ALSA_HOST_BUFFER,
        _ => DEFAULT_HOST_BUFFER,
    });

    match supported {
        SupportedBufferSize::Range { min, max } => {
            if host_name == "JACK" && custom_buffer_size.is_none() {
                return (BufferSize::Default, Some((min, max)), preferred_buffer_size);
            }
            let desired = preferred_buffer_size as u32;
            let clamped = desired.clamp(min, max);
            (BufferSize::Fixed(clamped), Some((min, max)), clamped as usize)
        }
        SupportedBufferSize::Unknown => (
            BufferSize::Fixed(preferred_buffer_size as u32),
            None,
            preferred_buffer_size,
        ),
    }
}

fn build_stream<T, R>(
    device: cpal::Device,
    config: StreamConfig,
    mut buffer: CarryBuffer<R>,
) -> anyhow::Result<cpal::Stream>
where
    T: Sample + SizedSample + FromSample<f32>,
    R: AudioRenderer,
{
    let channels = config.channels as usize;
    let mut error_reported = false;

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [T], _| {
                if let Err(err) = process_callback(data, channels, &mut buffer) {
                    if !error_reported {
                        eprintln!("Audio callback error: {}", err);
                        error_reported = true;
                    }
                }
            },
            move |err| eprintln!("Stream error: {}", err),
            None,
        )
        .context("failed to build stream")?;

    Ok(stream)
}

fn process_callback<T, R>(
    output: &mut [T],
    channels: usize,
    buffer: &mut CarryBuffer<R>,
) -> Result<(), &'static str>
where
    T: Sample + FromSample<f32>,
    R: AudioRenderer,
{
    buffer.call_count += 1;
    if channels == 0 {
        return Err("no output channels available");
    }
    if output.len() % channels != 0 {
        return Err("output buffer length not divisible by channel count");
    }

    let total_frames = output.len() / channels;
    let mut frames_written = 0;

    while frames_written < total_frames {
        if buffer.carry_available == 0 {
            buffer.carry.fill(0.0);
            buffer.renderer.process_block(&mut buffer.carry);
            buffer.carry_index = 0;
            buffer.carry_available = buffer.engine_block_size;
            continue;
        }

        let frames_to_copy = (total_frames - frames_written).min(buffer.carry_available);
        for i in 0..frames_to_copy {
            let value = buffer.carry[buffer.carry_index + i];
            let output_pos = (frames_written + i) * channels;
            for ch in 0..channels {
                output[output_pos + ch] = T::from_sample::<f32>(value);
            }
        }

        frames_written += frames_to_copy;
        buffer.carry_index += frames_to_copy;
        buffer.carry_available -= frames_to_copy;
    }

    Ok(())
}
