use candle_core::Device;

/// Metal when built with the `metal` feature and a GPU is present, otherwise
/// the CPU. `APP_DEVICE=cpu` forces the CPU.
pub fn select_device() -> Device {
    let forced_cpu = std::env::var("APP_DEVICE").is_ok_and(|v| v.eq_ignore_ascii_case("cpu"));
    #[cfg(feature = "metal")]
    {
        if !forced_cpu {
            match Device::new_metal(0) {
                Ok(dev) => {
                    tracing::info!(device = "metal", "model device selected");
                    return dev;
                }
                Err(e) => tracing::warn!(error = %e, "Metal unavailable, using CPU"),
            }
        }
    }
    tracing::info!(device = "cpu", forced = forced_cpu, "model device selected");
    Device::Cpu
}
