use anyhow::Context;
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Returns the output device called `device_name`, or the host's default output device.
pub fn get_or_default_output(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());

    let Some(target) = device_name else {
        return host
            .default_output_device()
            .context("No default output device");
    };

    let mut output_devices = host
        .output_devices()
        .context("Failed to enumerate output devices")?;
    output_devices
        .find(|device| device.name().is_ok_and(|name| name == target))
        .with_context(|| format!("No output device named '{target}'"))
}

/// One line of the `--list-devices` output.
pub fn describe_output(name: &str, channels: u16, sample_rate: u32, is_default: bool) -> String {
    let mut line = format!(" * {}({}ch, {}hz)", name, channels, sample_rate);
    if is_default {
        line.push_str(" [default]");
    }
    line
}

/// Lists every output device with its default configuration, one per line.
pub fn get_available_outputs() -> anyhow::Result<String> {
    for host in cpal::available_hosts() {
        tracing::debug!("Available host: {:?}", host);
    }

    let host = get_host();
    let default_device = host
        .default_output_device()
        .and_then(|device| device.name().ok());

    let mut device_names: Vec<String> = Vec::new();
    let output_devices = host
        .output_devices()
        .context("Failed to enumerate output devices")?;
    for out_device in output_devices {
        let Ok(d_name) = out_device.name() else {
            continue;
        };
        let Ok(d_cfg) = out_device.default_output_config() else {
            tracing::debug!("Skipping {} without a default output config.", d_name);
            continue;
        };
        let is_default = default_device.as_deref() == Some(d_name.as_str());
        device_names.push(describe_output(
            &d_name,
            d_cfg.channels(),
            d_cfg.sample_rate().0,
            is_default,
        ));
    }
    Ok(device_names.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_output_marks_default() {
        assert_eq!(
            describe_output("Speakers", 2, 48000, true),
            " * Speakers(2ch, 48000hz) [default]"
        );
        assert_eq!(
            describe_output("HDMI", 8, 44100, false),
            " * HDMI(8ch, 44100hz)"
        );
    }
}
