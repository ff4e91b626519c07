//! Heightmap previews written beside the geo files

use crate::terrain::Terrain;
use anyhow::{Context, Result, bail};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

/// Write a 16-bit grayscale PNG of a square heightmap
///
/// Heights are shifted into the unsigned range; cutouts are black.
pub fn write_heightmap_png(terrain: &Terrain, path: &Path) -> Result<()> {
    let Some(side) = terrain.side() else {
        bail!("heightmap with {} points is not square", terrain.len());
    };

    let mut pixels = Vec::with_capacity(terrain.len() * 2);
    for point in &terrain.points {
        let value = if point.is_cutout() {
            0
        } else {
            (i32::from(point.height) - i32::from(i16::MIN)) as u16
        };
        pixels.extend_from_slice(&value.to_be_bytes());
    }

    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), side, side);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Sixteen);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&pixels)?;
    Ok(())
}

/// Run `optimizer` (program plus arguments) on `path`
pub fn optimize(optimizer: &str, path: &Path) -> Result<()> {
    let mut parts = optimizer.split_whitespace();
    let Some(program) = parts.next() else {
        bail!("empty optimizer command");
    };
    let status = Command::new(program)
        .args(parts)
        .arg(path)
        .status()
        .with_context(|| format!("Failed to run {program}"))?;
    if !status.success() {
        bail!("{program} exited with {status}");
    }
    Ok(())
}

/// Background writer for heightmap images
///
/// Runs on its own thread so image encoding overlaps mesh extraction.
pub struct ImageExporter {
    sender: Sender<(String, Terrain)>,
    handle: JoinHandle<usize>,
}

impl ImageExporter {
    pub fn spawn(dir: PathBuf, optimizer: Option<String>) -> Self {
        let (sender, receiver) = mpsc::channel::<(String, Terrain)>();
        let handle = thread::spawn(move || {
            let mut written = 0;
            for (level, terrain) in receiver {
                let path = dir.join(format!("{level}.png"));
                if let Err(e) = write_heightmap_png(&terrain, &path) {
                    tracing::warn!(level = %level, "heightmap image not written: {e:#}");
                    continue;
                }
                written += 1;
                if let Some(optimizer) = &optimizer
                    && let Err(e) = optimize(optimizer, &path)
                {
                    tracing::warn!(image = ?path, "optimizer failed: {e:#}");
                }
            }
            written
        });
        Self { sender, handle }
    }

    pub fn submit(&self, level: &str, terrain: Terrain) {
        if self.sender.send((level.to_string(), terrain)).is_err() {
            tracing::warn!(level, "image writer stopped");
        }
    }

    /// Wait for queued images; returns how many were written
    pub fn finish(self) -> usize {
        drop(self.sender);
        self.handle.join().unwrap_or_else(|_| {
            tracing::error!("image writer panicked");
            0
        })
    }
}
