use tspes::config::ExtractorConfig;
use tspes::format::ts::{extract_file, AssemblerResult};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::builder().try_init().ok();

    // Defaults, then tspes_config.toml, then TSPES_* environment variables
    let config = ExtractorConfig::load()?;
    println!(
        "Extracting PID {} from {} (limit: {})",
        config.pid,
        config.input_path.display(),
        config
            .max_packets
            .map_or_else(|| "none".to_string(), |n| n.to_string())
    );

    let stats = extract_file(&config).await?;

    println!("\nFrames read:        {}", stats.frames_read);
    println!("Frames for PID:     {}", stats.frames_for_pid);
    println!("Bytes resynced:     {}", stats.resync_bytes);
    println!("Units written:      {}", stats.units_written);
    println!("Bytes written:      {}", stats.bytes_written);
    println!(
        "Packets lost:       {}",
        stats.count(AssemblerResult::StreamPacketLost)
    );
    println!(
        "Buffer overflows:   {}",
        stats.count(AssemblerResult::BufferOverflow)
    );
    println!("Output written to {}", config.output_path.display());

    Ok(())
}
