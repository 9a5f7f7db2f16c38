//! Native audio host entry point: runs the built-in arpeggio demo
//! through whichever `cpal` host/device the user selects.

use std::env;
use std::time::Duration;

use jack_midi_synth::demo::ArpeggioPlayer;
use jack_midi_synth::host::{AudioHost, AudioHostOptions};

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|arg| arg == "--list-hosts") {
        println!("=== AVAILABLE AUDIO HOSTS ===\n");
        let hosts = AudioHost::list_hosts();
        if hosts.is_empty() {
            println!("No audio hosts found!");
            return Ok(());
        }
        for host in hosts {
            let device_status = if host.has_default_device {
                "has default device"
            } else {
                "no default device"
            };
            println!("  - {} ({}, id: {:?})", host.name, device_status, host.id);
        }
        println!(
            "\nUsage: {} [--host <host_name>] [--buffer-size <frames>]",
            args[0]
        );
        return Ok(());
    }

    let mut preferred_host_name: Option<String> = None;
    let mut requested_buffer_size: Option<usize> = None;

    let mut index = 1;
    while index < args.len() {
        match args[index].as_str() {
            "--host" => {
                if index + 1 >= args.len() {
                    return Err(anyhow::anyhow!("Expected value after --host"));
                }
                preferred_host_name = Some(args[index + 1].clone());
                index += 2;
            }
            "--buffer-size" => {
                if index + 1 >= args.len() {
                    return Err(anyhow::anyhow!(
                        "Expected value after --buffer-size (e.g. 256)"
                    ));
                }
                let value = args[index + 1].parse::<usize>().map_err(|err| {
                    anyhow::anyhow!("Invalid buffer size '{}': {}", args[index + 1], err)
                })?;
                if value == 0 {
                    return Err(anyhow::anyhow!("Buffer size must be greater than zero"));
                }
                requested_buffer_size = Some(value);
                index += 2;
            }
            _ => index += 1,
        }
    }

    if let Some(host) = preferred_host_name.as_deref() {
        println!("=== REQUESTING HOST: {} ===\n", host);
    }

    println!("=== STARTING SYNTH DEMO ===");

    let options = AudioHostOptions {
        preferred_host: preferred_host_name,
        buffer_size: requested_buffer_size,
    };

    let host = AudioHost::with_options(
        |sample_rate, block_size| {
            println!(
                "Engine created: sample_rate={} Hz, block_size={}",
                sample_rate, block_size
            );
            ArpeggioPlayer::new(sample_rate, block_size)
        },
        options,
    )?;

    let host_config = host.config();
    println!(
        "\nEngine configured: sample_rate={} Hz, channels={}, block_size={} (host: {}, device: {})",
        host_config.sample_rate,
        host_config.channels,
        host_config.buffer_size,
        host_config.host_name,
        host_config.device_name
    );

    println!("\nPlaying a minor arpeggio. Press Ctrl+C to stop.\n");

    loop {
        std::thread::sleep(Duration::from_secs(1));
    }
}
