//! Entry point for plyview.

mod args;

use anyhow::{Context, Result};
use asset::{LoadOptions, MeshData, load_mesh_from_path, write_sample_pair};
use clap::Parser;
use corelib::NormalizationTransform;

use crate::args::Args;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if let Some(prefix) = &args.write_sample {
        let [ascii, binary] = write_sample_pair(&MeshData::cube(), prefix)
            .with_context(|| format!("Failed to write sample files with prefix '{prefix}'"))?;
        log::info!("Sample written: {} and {}", ascii.display(), binary.display());
        if args.path.is_none() {
            return Ok(());
        }
    }

    let Some(path) = &args.path else {
        anyhow::bail!("No PLY file given");
    };

    let mesh = load_mesh_from_path(path, LoadOptions { preload: args.preload })
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let bounds = mesh.bounds();
    let normalization = NormalizationTransform::from_bounds(&bounds, args.scale_mode());
    log::info!(
        "Loaded {}: {} vertices, {} triangles, normals: {}",
        path.display(),
        mesh.vertex_count(),
        mesh.triangle_count(),
        if mesh.normals.is_some() { "yes" } else { "no" }
    );
    log::info!("Bounding box: {bounds}");
    log::info!("Center: {}", bounds.center());
    log::info!("Normalization: {normalization}");

    if args.stats_only {
        return Ok(());
    }

    let config = args.viewer_config();
    log::info!(
        "Starting viewer. Backend: {:?}, window_size={}x{}, mode={:?}",
        config.backends,
        config.width,
        config.height,
        config.draw_mode
    );
    platform::run_viewer(config, &mesh, normalization)?;

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}
