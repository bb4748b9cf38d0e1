//! Command line arguments.

use std::path::PathBuf;

use clap::Parser;
use corelib::ScaleMode;
use platform::ViewerConfig;
use renderer::DrawMode;

/// GPU API passed to wgpu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum GpuBackend {
    #[default]
    Auto,
    #[value(alias = "vk")]
    Vulkan,
    #[value(alias = "d3d12")]
    Dx12,
    #[value(alias = "mtl")]
    Metal,
    #[value(alias = "opengl", alias = "gles")]
    Gl,
}

impl From<GpuBackend> for wgpu::Backends {
    fn from(b: GpuBackend) -> Self {
        match b {
            GpuBackend::Auto => wgpu::Backends::all(),
            GpuBackend::Vulkan => wgpu::Backends::VULKAN,
            GpuBackend::Dx12 => wgpu::Backends::DX12,
            GpuBackend::Metal => wgpu::Backends::METAL,
            GpuBackend::Gl => wgpu::Backends::GL,
        }
    }
}

/// View a PLY mesh, normalized into the unit cube and spinning.
#[derive(Parser, Debug)]
#[command(name = "plyview", version, about)]
pub struct Args {
    /// PLY file to view.
    #[arg(required_unless_present = "write_sample")]
    pub path: Option<PathBuf>,

    /// Read the whole file into memory before parsing.
    #[arg(long)]
    pub preload: bool,

    /// Scale all axes by the largest extent instead of per axis.
    #[arg(long)]
    pub uniform_scale: bool,

    #[arg(long, default_value = "auto", value_enum)]
    pub gpu_backend: GpuBackend,

    #[arg(long, default_value = "1024")]
    pub width: u32,

    #[arg(long, default_value = "760")]
    pub height: u32,

    /// Start with filled triangles instead of wireframe.
    #[arg(long)]
    pub fill: bool,

    /// Exit after this many frames.
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// Load and print statistics without opening a window.
    #[arg(long)]
    pub stats_only: bool,

    /// Write a sample cube as PREFIX-ascii.ply and PREFIX-binary.ply, then exit.
    #[arg(long, value_name = "PREFIX")]
    pub write_sample: Option<String>,
}

impl Args {
    pub fn scale_mode(&self) -> ScaleMode {
        if self.uniform_scale {
            ScaleMode::Uniform
        } else {
            ScaleMode::PerAxis
        }
    }

    pub fn viewer_config(&self) -> ViewerConfig {
        let title = match &self.path {
            Some(path) => format!("plyview - {}", path.display()),
            None => "plyview".to_string(),
        };
        ViewerConfig {
            title,
            width: self.width.max(1),
            height: self.height.max(1),
            backends: self.gpu_backend.into(),
            draw_mode: if self.fill {
                DrawMode::Fill
            } else {
                DrawMode::Wireframe
            },
            max_frames: self.max_frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["plyview", "bunny.ply"]).unwrap();
        assert_eq!(args.path, Some(PathBuf::from("bunny.ply")));
        assert_eq!(args.scale_mode(), ScaleMode::PerAxis);
        let cfg = args.viewer_config();
        assert_eq!((cfg.width, cfg.height), (1024, 760));
        assert_eq!(cfg.draw_mode, DrawMode::Wireframe);
        assert_eq!(cfg.backends, wgpu::Backends::all());
        assert_eq!(cfg.max_frames, None);
    }

    #[test]
    fn path_required_without_sample() {
        assert!(Args::try_parse_from(["plyview"]).is_err());
        let args = Args::try_parse_from(["plyview", "--write-sample", "cube"]).unwrap();
        assert!(args.path.is_none());
        assert_eq!(args.write_sample.as_deref(), Some("cube"));
    }

    #[test]
    fn backend_aliases() {
        let args = Args::try_parse_from(["plyview", "m.ply", "--gpu-backend", "vk"]).unwrap();
        assert_eq!(args.gpu_backend, GpuBackend::Vulkan);
        let args = Args::try_parse_from(["plyview", "m.ply", "--gpu-backend", "gl"]).unwrap();
        assert_eq!(wgpu::Backends::from(args.gpu_backend), wgpu::Backends::GL);
        assert!(Args::try_parse_from(["plyview", "m.ply", "--gpu-backend", "glide"]).is_err());
    }

    #[test]
    fn viewer_flags() {
        let args = Args::try_parse_from([
            "plyview",
            "m.ply",
            "--fill",
            "--uniform-scale",
            "--max-frames",
            "10",
            "--width",
            "640",
            "--height",
            "480",
        ])
        .unwrap();
        assert_eq!(args.scale_mode(), ScaleMode::Uniform);
        let cfg = args.viewer_config();
        assert_eq!(cfg.draw_mode, DrawMode::Fill);
        assert_eq!(cfg.max_frames, Some(10));
        assert_eq!((cfg.width, cfg.height), (640, 480));
        assert!(cfg.title.contains("m.ply"));
    }
}
