//! Renderer: wgpu init + depth + one normalized, spinning mesh.
//! wgpu = 26.x, winit = 0.30.x

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use asset::MeshData;
use bytemuck::{Pod, Zeroable};
use corelib::{Mat3, Mat4, NormalizationTransform, Spin, Vec4, transform::fit_projection};
use wgpu::{
    util::DeviceExt,
    BindGroup, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType, BlendState, Buffer,
    BufferBindingType, BufferUsages, ColorTargetState, ColorWrites, CommandEncoderDescriptor,
    CompositeAlphaMode, DepthBiasState, DepthStencilState, Device, DeviceDescriptor, Extent3d,
    Features, FragmentState, Instance, InstanceDescriptor, Limits, LoadOp, Operations,
    PipelineLayout, PipelineLayoutDescriptor, PolygonMode, PowerPreference, PresentMode, Queue,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor,
    ShaderModule, ShaderModuleDescriptor, ShaderSource, ShaderStages, StoreOp, Surface,
    SurfaceConfiguration, SurfaceError, TextureDescriptor, TextureDimension, TextureFormat,
    TextureUsages, TextureView, TextureViewDescriptor, VertexBufferLayout, VertexState,
    VertexStepMode,
};
use winit::{dpi::PhysicalSize, window::Window};

/// Vertex: position + normal (zero when the mesh has none).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
}
impl Vertex {
    pub const LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
    };
}

/// Mesh UBO (16-byte aligned).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct MeshUniform {
    mvp: [[f32; 4]; 4],
    /// Inverse-transpose of the model matrix (upper 3x3).
    normal_matrix: [[f32; 4]; 4],
    tint: [f32; 4],
    /// x: 1.0 when normals are present.
    params: [f32; 4],
}

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.2,
    g: 0.3,
    b: 0.3,
    a: 1.0,
};
/// Radius of the sphere enclosing the [-1, 1] cube.
const VIEW_RADIUS: f32 = 1.732_050_8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DrawMode {
    Fill,
    #[default]
    Wireframe,
}

/// Per-run render options.
#[derive(Clone, Copy, Debug)]
pub struct RenderSettings {
    pub backends: wgpu::Backends,
    pub draw_mode: DrawMode,
    pub spin: Spin,
    pub vsync: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            draw_mode: DrawMode::default(),
            spin: Spin::default(),
            vsync: true,
        }
    }
}

pub struct GpuState {
    // Surface
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,

    // Device/queue
    device: Device,
    queue: Queue,

    // Pipelines & geometry
    fill_pipeline: RenderPipeline,
    /// `None` when the adapter lacks `POLYGON_MODE_LINE`.
    line_pipeline: Option<RenderPipeline>,
    draw_mode: DrawMode,
    vertex_buf: Buffer,
    index_buf: Buffer,
    index_count: u32,

    // Per-frame uniform
    uniform_bg: BindGroup,
    uniform_buf: Buffer,
    normalization: Mat4,
    spin: Spin,
    has_normals: bool,
    start: Instant,

    // Depth
    depth_view: TextureView,

    // Size cache
    width: u32,
    height: u32,
}

impl GpuState {
    /// Create GPU state bound to an Arc<Window> and upload `mesh` once.
    pub async fn new(
        window: Arc<Window>,
        mesh: &MeshData,
        normalization: &NormalizationTransform,
        settings: RenderSettings,
    ) -> Result<Self> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        // Instance & surface
        let instance = Instance::new(&InstanceDescriptor {
            backends: settings.backends,
            ..Default::default()
        });
        let surface: Surface<'static> = instance
            .create_surface(window.clone())
            .map_err(|e| anyhow!("create_surface failed: {e}"))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| anyhow!("No suitable GPU adapter: {e}"))?;
        let info = adapter.get_info();
        log::info!(
            "GPU adapter: {} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        let line_supported = adapter.features().contains(Features::POLYGON_MODE_LINE);
        if !line_supported {
            log::warn!("Adapter lacks POLYGON_MODE_LINE; wireframe will fall back to fill");
        }
        let required_features = if line_supported {
            Features::POLYGON_MODE_LINE
        } else {
            Features::empty()
        };

        // Large scans outgrow the webgl2 default of 256 MiB per buffer.
        let adapter_limits = adapter.limits();
        check_buffer_sizes(mesh, adapter_limits.max_buffer_size)?;
        let required_limits = Limits {
            max_buffer_size: adapter_limits.max_buffer_size,
            ..Limits::downlevel_webgl2_defaults().using_resolution(adapter_limits.clone())
        };

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("plyview Device"),
                required_features,
                required_limits,
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| anyhow!("request_device failed: {e}"))?;

        // Surface format (prefer sRGB)
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("Surface reports no supported formats")?;

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: if settings.vsync {
                PresentMode::AutoVsync
            } else {
                PresentMode::AutoNoVsync
            },
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_view = create_depth_view(&device, &surface_config);

        // ==== Shaders ====
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Mesh WGSL"),
            source: ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
        });

        // ==== Uniform BGL/BG ====
        let uniform_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Mesh BGL"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX_FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<MeshUniform>() as u64,
                    ),
                },
                count: None,
            }],
        });
        let uniform_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh UBO"),
            contents: bytemuck::bytes_of(&MeshUniform::zeroed()),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });
        let uniform_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Mesh BG"),
            layout: &uniform_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buf.as_entire_binding(),
            }],
        });

        // ==== Pipelines ====
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Mesh PipelineLayout"),
            bind_group_layouts: &[&uniform_bgl],
            push_constant_ranges: &[],
        });
        let fill_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            surface_format,
            PolygonMode::Fill,
        );
        let line_pipeline = line_supported.then(|| {
            create_pipeline(
                &device,
                &pipeline_layout,
                &shader,
                surface_format,
                PolygonMode::Line,
            )
        });

        // ==== Geometry ====
        let vertices = build_vertices(mesh);
        let vertex_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh VB"),
            contents: bytemuck::cast_slice(&vertices),
            usage: BufferUsages::VERTEX,
        });
        let index_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh IB"),
            contents: bytemuck::cast_slice(&mesh.faces.indices),
            usage: BufferUsages::INDEX,
        });
        let index_count = u32::try_from(mesh.faces.indices.len())
            .context("Index buffer exceeds u32::MAX entries")?;
        log::info!(
            "Uploaded {} vertices / {} triangles to the GPU",
            vertices.len(),
            index_count / 3
        );

        let mut state = Self {
            surface,
            surface_config,
            device,
            queue,
            fill_pipeline,
            line_pipeline,
            draw_mode: DrawMode::Fill,
            vertex_buf,
            index_buf,
            index_count,
            uniform_bg,
            uniform_buf,
            normalization: normalization.matrix(2.0),
            spin: settings.spin,
            has_normals: mesh.normals.is_some(),
            start: Instant::now(),
            depth_view,
            width,
            height,
        };
        state.set_draw_mode(settings.draw_mode);
        Ok(state)
    }

    /// Switch between filled and wireframe drawing.
    pub fn set_draw_mode(&mut self, mode: DrawMode) {
        let effective = if mode == DrawMode::Wireframe && self.line_pipeline.is_none() {
            DrawMode::Fill
        } else {
            mode
        };
        if effective != self.draw_mode {
            log::info!("Draw mode: {:?}", effective);
            self.draw_mode = effective;
        }
    }

    pub fn draw_mode(&self) -> DrawMode {
        self.draw_mode
    }

    /// Resize: reconfigure surface & recreate depth view.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, &self.surface_config);
    }

    /// Render one frame: update uniforms + clear + draw mesh.
    pub fn render(&mut self) -> Result<(), SurfaceError> {
        let t = self.start.elapsed().as_secs_f32();
        let aspect = self.width as f32 / self.height as f32;
        let rotation = self.spin.matrix_at(t);
        let uniform = MeshUniform {
            mvp: mvp(aspect, rotation, self.normalization).to_cols_array_2d(),
            normal_matrix: normal_matrix(rotation * self.normalization).to_cols_array_2d(),
            tint: tint_at(t).to_array(),
            params: [if self.has_normals { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        };
        self.queue
            .write_buffer(&self.uniform_buf, 0, bytemuck::bytes_of(&uniform));

        let frame = self.surface.get_current_texture()?;
        let view = frame.texture.create_view(&Default::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("MainEncoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("MainPass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(CLEAR_COLOR),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            let pipeline = match (self.draw_mode, &self.line_pipeline) {
                (DrawMode::Wireframe, Some(line)) => line,
                _ => &self.fill_pipeline,
            };
            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &self.uniform_bg, &[]);
            rpass.set_vertex_buffer(0, self.vertex_buf.slice(..));
            rpass.set_index_buffer(self.index_buf.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(0..self.index_count, 0, 0..1);
        }

        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    pub fn is_surface_lost(err: &SurfaceError) -> bool {
        matches!(err, SurfaceError::Lost | SurfaceError::Outdated)
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.width, self.height);
    }
}

fn create_pipeline(
    device: &Device,
    layout: &PipelineLayout,
    shader: &ShaderModule,
    format: TextureFormat,
    polygon_mode: PolygonMode,
) -> RenderPipeline {
    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some(match polygon_mode {
            PolygonMode::Line => "Mesh Pipeline (line)",
            _ => "Mesh Pipeline (fill)",
        }),
        layout: Some(layout),
        vertex: VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[Vertex::LAYOUT],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(ColorTargetState {
                format,
                blend: Some(BlendState::REPLACE),
                write_mask: ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        // PLY files do not agree on winding, so both sides are drawn.
        primitive: wgpu::PrimitiveState {
            cull_mode: None,
            polygon_mode,
            ..Default::default()
        },
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Create a depth texture view matching the surface config.
fn create_depth_view(device: &Device, sc: &SurfaceConfiguration) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}

/// Fail before upload if either mesh buffer exceeds `max_buffer_size`.
pub fn check_buffer_sizes(mesh: &MeshData, max_buffer_size: u64) -> Result<()> {
    let vertex_bytes = (mesh.vertex_count() * std::mem::size_of::<Vertex>()) as u64;
    let index_bytes = (mesh.faces.indices.len() * std::mem::size_of::<u32>()) as u64;
    for (what, bytes) in [("vertex", vertex_bytes), ("index", index_bytes)] {
        if bytes > max_buffer_size {
            anyhow::bail!(
                "Mesh {what} buffer needs {bytes} bytes, GPU allows at most {max_buffer_size}"
            );
        }
    }
    Ok(())
}

/// Interleave positions with normals (zeros when absent).
pub fn build_vertices(mesh: &MeshData) -> Vec<Vertex> {
    let normals = mesh.normals.as_deref();
    mesh.positions
        .chunks_exact(3)
        .enumerate()
        .map(|(i, p)| Vertex {
            pos: [p[0], p[1], p[2]],
            normal: normals
                .and_then(|n| n.get(i * 3..i * 3 + 3))
                .map(|n| [n[0], n[1], n[2]])
                .unwrap_or([0.0; 3]),
        })
        .collect()
}

/// Projection * spin * normalization.
pub fn mvp(aspect: f32, rotation: Mat4, normalization: Mat4) -> Mat4 {
    fit_projection(aspect, VIEW_RADIUS) * rotation * normalization
}

/// Normal transform for `model`: inverse-transpose of its linear part, so
/// per-axis scaling does not skew shading.
pub fn normal_matrix(model: Mat4) -> Mat4 {
    Mat4::from_mat3(Mat3::from_mat4(model).inverse().transpose())
}

/// Green pulse: `sin(2t) / 2 + 0.5`.
pub fn tint_at(seconds: f32) -> Vec4 {
    let green = (seconds * 2.0).sin() / 2.0 + 0.5;
    Vec4::new(0.0, green, 0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::{BoundingBox, ScaleMode, vec3};

    #[test]
    fn uniform_is_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<MeshUniform>() % 16, 0);
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
    }

    #[test]
    fn vertices_interleave_normals() {
        let cube = MeshData::cube();
        let verts = build_vertices(&cube);
        assert_eq!(verts.len(), 24);
        assert_eq!(verts[0].pos, [cube.positions[0], cube.positions[1], cube.positions[2]]);
        assert_eq!(verts[0].normal, [-1.0, 0.0, 0.0]);
    }

    #[test]
    fn missing_normals_become_zero() {
        let mesh = MeshData::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0], None, vec![0, 1, 2]);
        let verts = build_vertices(&mesh);
        assert_eq!(verts.len(), 3);
        assert!(verts.iter().all(|v| v.normal == [0.0; 3]));
        assert_eq!(verts[2].pos, [7.0, 8.0, 9.0]);
    }

    #[test]
    fn normalized_mesh_stays_in_clip_volume() {
        let bb = BoundingBox::new(vec3(100.0, -3.0, 7.0), vec3(140.0, 5.0, 9.0));
        let n = NormalizationTransform::from_bounds(&bb, ScaleMode::PerAxis).matrix(2.0);
        for t in [0.0f32, 0.7, 2.1, 5.5] {
            let m = mvp(16.0 / 9.0, Spin::default().matrix_at(t), n);
            for corner in [bb.min, bb.max, vec3(bb.min.x, bb.max.y, bb.min.z)] {
                let c = m.project_point3(corner);
                assert!(c.x.abs() <= 1.0 + 1e-4, "x={}", c.x);
                assert!(c.y.abs() <= 1.0 + 1e-4, "y={}", c.y);
                assert!((-1e-4..=1.0 + 1e-4).contains(&c.z), "z={}", c.z);
            }
        }
    }

    #[test]
    fn normals_stay_perpendicular_under_stretch() {
        // A 45-degree plane in xy; stretching x by 4 must tilt its normal.
        let bb = BoundingBox::new(vec3(0.0, 0.0, 0.0), vec3(0.5, 2.0, 1.0));
        let n = NormalizationTransform::from_bounds(&bb, ScaleMode::PerAxis).matrix(2.0);
        let model = Spin::default().matrix_at(1.3) * n;
        let tangent = vec3(1.0, -1.0, 0.0);
        let normal = vec3(1.0, 1.0, 0.0).normalize();

        let t = model.transform_vector3(tangent);
        let m = normal_matrix(model).transform_vector3(normal);
        assert!(t.dot(m).abs() < 1e-4, "dot={}", t.dot(m));

        // Rotation alone would not be perpendicular here.
        let r = Spin::default().matrix_at(1.3).transform_vector3(normal);
        assert!(t.dot(r).abs() > 1e-2);
    }

    #[test]
    fn normal_matrix_of_pure_rotation_is_the_rotation() {
        let rot = Spin::default().matrix_at(0.8);
        let m = normal_matrix(rot).to_cols_array();
        let r = rot.to_cols_array();
        assert!(m.iter().zip(r.iter()).all(|(a, b)| (a - b).abs() < 1e-5));
    }

    #[test]
    fn oversized_buffers_are_an_error() {
        let cube = MeshData::cube();
        // 24 vertices * 24 bytes, 36 indices * 4 bytes.
        assert!(check_buffer_sizes(&cube, 576).is_ok());

        let err = check_buffer_sizes(&cube, 575).unwrap_err();
        assert!(err.to_string().contains("vertex buffer"), "{err}");

        // 72 vertex bytes, 120 index bytes.
        let tri = MeshData::new(vec![0.0; 9], None, [0, 1, 2].repeat(10));
        assert!(check_buffer_sizes(&tri, 120).is_ok());
        let err = check_buffer_sizes(&tri, 100).unwrap_err();
        assert!(err.to_string().contains("index buffer"), "{err}");
    }

    #[test]
    fn tint_pulses_between_zero_and_one() {
        assert!((tint_at(0.0).y - 0.5).abs() < 1e-6);
        for i in 0..100 {
            let g = tint_at(i as f32 * 0.1).y;
            assert!((0.0..=1.0).contains(&g));
        }
    }
}
