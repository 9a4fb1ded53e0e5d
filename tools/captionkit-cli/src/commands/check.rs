//! Check system capabilities.

use std::process::Stdio;

use captionkit_common::config::{config_file_path, AppConfig};
use captionkit_render_engine::FontBook;
use tokio::process::Command;

async fn tool_version(binary: &str) -> Option<String> {
    let output = Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = stdout.lines().next().map(|line| line.trim().to_string());
    version
}

pub async fn run(config: &AppConfig, write_config: bool) -> anyhow::Result<()> {
    println!("CaptionKit System Check");
    println!("{}", "=".repeat(50));

    let config_path = config_file_path();
    if write_config && !config_path.exists() {
        config.save()?;
        println!("[OK] Config: wrote defaults to {}", config_path.display());
    } else if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[INFO] Config: defaults ({} not found)", config_path.display());
    }

    let mut all_required_ok = true;
    for binary in ["ffmpeg", "ffprobe"] {
        match tool_version(binary).await {
            Some(version) => println!("[OK] {binary}: {version}"),
            None => {
                println!("[MISSING] {binary}: install FFmpeg and make sure it is in PATH");
                all_required_ok = false;
            }
        }
    }

    match FontBook::load(&config.fonts) {
        Ok(fonts) if fonts.is_empty() => {
            println!("[WARN] Fonts: none configured; exports will not draw caption text");
        }
        Ok(fonts) => {
            println!("[OK] Fonts: {} face(s)", fonts.len());
            for family in fonts.families() {
                println!("     {family}");
            }
            if fonts.resolve(fonts.default_family(), 400, false).map(|f| f.family.as_str())
                != Some(fonts.default_family())
            {
                println!(
                    "[WARN] Default family '{}' is not loaded",
                    fonts.default_family()
                );
            }
        }
        Err(e) => {
            println!("[ERROR] Fonts: {e}");
            all_required_ok = false;
        }
    }

    match super::load_templates(config) {
        Ok(templates) => println!("[OK] Templates: {}", templates.len()),
        Err(e) => {
            println!("[ERROR] Templates: {e}");
            all_required_ok = false;
        }
    }

    println!(
        "[INFO] Export defaults: {} {} @ {}fps, seek timeout {}ms",
        config.export.aspect,
        config.export.video_codec,
        config.export.fps,
        config.export.seek_timeout_ms
    );

    println!();
    if all_required_ok {
        println!("All required capabilities are available. CaptionKit is ready.");
    } else {
        println!("Some required capabilities are missing. See above for fixes.");
    }

    Ok(())
}
