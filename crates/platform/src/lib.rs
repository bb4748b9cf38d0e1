//! Platform layer: window, event loop and per-frame input polling.
//!
//! Keys: `1` filled, `2` wireframe, `Escape` quits.

pub mod input;

use std::sync::Arc;

use anyhow::{Result, anyhow};
use asset::MeshData;
use corelib::NormalizationTransform;
use renderer::{DrawMode, GpuState, RenderSettings};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::KeyCode,
    window::{Window, WindowId},
};

pub use input::InputState;

/// Window and renderer options for one viewer run.
#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub backends: wgpu::Backends,
    pub draw_mode: DrawMode,
    /// Exit after this many presented frames.
    pub max_frames: Option<u64>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "plyview".to_string(),
            width: 1024,
            height: 760,
            backends: wgpu::Backends::all(),
            draw_mode: DrawMode::Wireframe,
            max_frames: None,
        }
    }
}

/// Open a window and draw `mesh` until closed. Blocks the calling thread.
pub fn run_viewer(
    config: ViewerConfig,
    mesh: &MeshData,
    normalization: NormalizationTransform,
) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|e| anyhow!("Failed to create event loop: {e}"))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut viewer = Viewer {
        config,
        mesh,
        normalization,
        window: None,
        gpu: None,
        input: InputState::new(),
        frames: 0,
        error: None,
    };
    event_loop
        .run_app(&mut viewer)
        .map_err(|e| anyhow!("Event loop error: {e:?}"))?;

    match viewer.error {
        Some(err) => Err(err),
        None => {
            log::info!("Viewer closed after {} frames", viewer.frames);
            Ok(())
        }
    }
}

struct Viewer<'a> {
    config: ViewerConfig,
    mesh: &'a MeshData,
    normalization: NormalizationTransform,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    input: InputState,
    frames: u64,
    /// First fatal error; the loop exits once set.
    error: Option<anyhow::Error>,
}

impl Viewer<'_> {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.width.max(1),
                self.config.height.max(1),
            ));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .map_err(|e| anyhow!("Failed to create window: {e}"))?,
        );
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        let settings = RenderSettings {
            backends: self.config.backends,
            draw_mode: self.config.draw_mode,
            ..Default::default()
        };
        let gpu = pollster::block_on(GpuState::new(
            window.clone(),
            self.mesh,
            &self.normalization,
            settings,
        ))?;

        window.request_redraw();
        self.window = Some(window);
        self.gpu = Some(gpu);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        if self.error.is_none() {
            self.error = Some(err);
        }
        event_loop.exit();
    }

    /// Act on this frame's input edges. Returns `false` once quitting.
    fn poll_input(&mut self, event_loop: &ActiveEventLoop) -> bool {
        let input = &self.input;
        if input.is_key_down(KeyCode::Escape) {
            log::info!("Escape pressed. Exiting.");
            event_loop.exit();
            return false;
        }
        if let Some(gpu) = self.gpu.as_mut() {
            if input.is_key_down(KeyCode::Digit1) {
                gpu.set_draw_mode(DrawMode::Fill);
            }
            if input.is_key_down(KeyCode::Digit2) {
                gpu.set_draw_mode(DrawMode::Wireframe);
            }
        }
        if input.left_down {
            log::info!("Mouse left down at {:?}", input.position);
        }
        if input.left_up {
            log::info!("Mouse left up at {:?}", input.position);
        }
        true
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let running = self.poll_input(event_loop);
        self.input.reset_change_events();
        if !running {
            return;
        }

        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        match gpu.render() {
            Ok(()) => self.frames += 1,
            Err(e) if GpuState::is_surface_lost(&e) => {
                log::warn!("Surface lost/outdated, recreating");
                gpu.recreate_surface();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                self.fail(event_loop, anyhow!("GPU out of memory"));
                return;
            }
            Err(e) => log::warn!("Frame skipped: {e:?}"),
        }

        if let Some(max) = self.config.max_frames
            && self.frames >= max
        {
            log::info!("Reached max frames limit ({max}), exiting");
            event_loop.exit();
        }
    }
}

impl ApplicationHandler for Viewer<'_> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e.context("Viewer initialization failed"));
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if self.input.handle_window_event(&event) {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if size.width > 0 && size.height > 0 {
                    if let Some(gpu) = self.gpu.as_mut() {
                        gpu.resize(size.width, size.height);
                    }
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}
