//! Headless wgpu implementation of [`RenderEngine`]
//!
//! Every drawable surface is an offscreen colour texture with a matching depth
//! texture. Draws are collected during the frame and encoded into a single
//! render pass in `end_frame`. The rendered image can be read back with
//! [`WgpuEngine::read_pixels`].
//!
//! WebGPU has no point size control, so points are always one pixel wide.

use std::{collections::HashMap, iter};

use cgmath::Matrix4;
use wgpu::{
    BindGroup, BindGroupLayout, Buffer, CompareFunction, DepthBiasState, DepthStencilState,
    Device, Face, FragmentState, FrontFace, MultisampleState, PipelineCompilationOptions,
    PipelineLayoutDescriptor, PolygonMode, PrimitiveState, PrimitiveTopology, Queue,
    RenderPipeline, RenderPipelineDescriptor, ShaderModule, StencilState, TextureFormat,
    VertexAttribute, VertexBufferLayout, VertexFormat, VertexState, VertexStepMode,
};

use super::engine::{AttributeUpload, DrawSubmission, FrameSetup, RenderEngine, SurfaceId, Topology};
use crate::{
    error::{Result, TartanError},
    gfx::geometry::AttributeId,
    math::matrix_to_array,
};

/// Remaps OpenGL clip-space depth (-1..1) to wgpu depth (0..1)
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Colour format of every offscreen surface
pub const COLOR_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
/// Depth format of every offscreen surface
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

const POSITION_SLOT: u32 = 0;
const COLOR_SLOT: u32 = 1;
const MIN_VERTEX_BUFFER_BYTES: u64 = 16;

/// Per-draw uniform block, matches `DrawUniform` in unlit.wgsl
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct DrawUniform {
    mvp: [[f32; 4]; 4],
    color: [f32; 4],
    params: [f32; 4],
}

struct OffscreenTarget {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl OffscreenTarget {
    fn new(device: &Device, width: u32, height: u32) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Tartan Color Target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Tartan Depth Target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        Self {
            color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            color,
            width,
            height,
        }
    }
}

struct GpuAttribute {
    buffer: Buffer,
    /// Bytes of valid data, at most the buffer size
    bytes: u64,
    item_size: usize,
    version: u64,
}

impl GpuAttribute {
    fn count(&self) -> u64 {
        self.bytes / 4 / self.item_size as u64
    }
}

struct UniformSlot {
    buffer: Buffer,
    bind_group: BindGroup,
}

struct PendingDraw {
    topology: Topology,
    position: AttributeId,
    color: Option<AttributeId>,
    vertex_count: u32,
    uniform: usize,
}

struct PendingFrame {
    setup: FrameSetup,
    draws: Vec<PendingDraw>,
}

/// Offscreen renderer backed by a wgpu device
pub struct WgpuEngine {
    device: Device,
    queue: Queue,
    uniform_layout: BindGroupLayout,
    pipelines: HashMap<Topology, RenderPipeline>,
    surfaces: HashMap<SurfaceId, OffscreenTarget>,
    attributes: HashMap<AttributeId, GpuAttribute>,
    uniforms: Vec<UniformSlot>,
    frame: Option<PendingFrame>,
    next_surface: u64,
}

impl WgpuEngine {
    /// Request a headless adapter and device, blocking until ready
    pub fn new() -> Result<Self> {
        pollster::block_on(Self::new_async())
    }

    pub async fn new_async() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;
        log::debug!("Using adapter {:?}", adapter.get_info().name);

        // Surfaces as large as the adapter can back, not the 2048 downlevel cap
        let required_limits = wgpu::Limits {
            max_texture_dimension_2d: adapter.limits().max_texture_dimension_2d,
            ..wgpu::Limits::downlevel_defaults()
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Tartan Device"),
                required_features: wgpu::Features::empty(),
                required_limits,
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        Ok(Self::from_device(device, queue))
    }

    /// Build an engine on an existing device
    pub fn from_device(device: Device, queue: Queue) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("unlit"),
            source: wgpu::ShaderSource::Wgsl(include_str!("unlit.wgsl").into()),
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipelines = [Topology::Triangles, Topology::LineStrip, Topology::Points]
            .into_iter()
            .map(|topology| {
                let pipeline = create_pipeline(&device, &shader, &uniform_layout, topology);
                (topology, pipeline)
            })
            .collect();

        Self {
            device,
            queue,
            uniform_layout,
            pipelines,
            surfaces: HashMap::new(),
            attributes: HashMap::new(),
            uniforms: Vec::new(),
            frame: None,
            next_surface: 0,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Version of the last uploaded contents of an attribute
    pub fn resident_version(&self, attribute: AttributeId) -> Option<u64> {
        self.attributes.get(&attribute).map(|gpu| gpu.version)
    }

    /// Largest surface side this device can allocate, in pixels
    pub fn max_surface_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Number of attributes with a device buffer
    pub fn resident_count(&self) -> usize {
        self.attributes.len()
    }

    /// Read a surface back as tightly packed RGBA8 rows, top row first
    pub fn read_pixels(&self, surface: SurfaceId) -> Result<Vec<u8>> {
        let target = self.target(surface)?;
        let unpadded_row = target.width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_row = unpadded_row.div_ceil(align) * align;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Tartan Readback Buffer"),
            size: padded_row as u64 * target.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Tartan Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(target.height),
                },
            },
            wgpu::Extent3d {
                width: target.width,
                height: target.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| TartanError::engine(e.to_string()))?;

        futures::executor::block_on(rx)
            .map_err(|_| TartanError::engine("readback channel closed"))??;

        let pixels = {
            let mapped = slice.get_mapped_range();
            mapped
                .chunks(padded_row as usize)
                .flat_map(|row| &row[..unpadded_row as usize])
                .copied()
                .collect()
        };
        staging.unmap();
        Ok(pixels)
    }

    fn target(&self, surface: SurfaceId) -> Result<&OffscreenTarget> {
        self.surfaces
            .get(&surface)
            .ok_or_else(|| TartanError::engine(format!("unknown surface {:?}", surface)))
    }

    fn ensure_uniform_slots(&mut self, count: usize) {
        while self.uniforms.len() < count {
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Draw Uniform Buffer"),
                size: std::mem::size_of::<DrawUniform>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Draw Uniform Bind Group"),
                layout: &self.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            self.uniforms.push(UniformSlot { buffer, bind_group });
        }
    }
}

impl RenderEngine for WgpuEngine {
    fn create_surface(&mut self, width: u32, height: u32) -> Result<SurfaceId> {
        validate_size(width, height, self.max_surface_dimension())?;

        self.next_surface += 1;
        let surface = SurfaceId(self.next_surface);
        self.surfaces
            .insert(surface, OffscreenTarget::new(&self.device, width, height));
        log::debug!("Created offscreen target {:?} ({}x{})", surface, width, height);
        Ok(surface)
    }

    fn resize_surface(&mut self, surface: SurfaceId, width: u32, height: u32) -> Result<()> {
        validate_size(width, height, self.max_surface_dimension())?;
        self.target(surface)?;

        self.surfaces
            .insert(surface, OffscreenTarget::new(&self.device, width, height));
        log::debug!("Resized offscreen target {:?} to {}x{}", surface, width, height);
        Ok(())
    }

    fn is_resident(&self, attribute: AttributeId) -> bool {
        self.attributes.contains_key(&attribute)
    }

    fn upload_attribute(&mut self, upload: &AttributeUpload<'_>) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(upload.data);
        let size = bytes.len() as u64;
        let max_size = self.device.limits().max_buffer_size;
        if size > max_size {
            return Err(TartanError::engine(format!(
                "attribute '{}' needs {} bytes, device buffers hold at most {}",
                upload.name, size, max_size
            )));
        }

        let reusable = self
            .attributes
            .get(&upload.id)
            .is_some_and(|gpu| gpu.buffer.size() >= size);

        if !reusable {
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(upload.name),
                size: size.max(MIN_VERTEX_BUFFER_BYTES),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            log::trace!("Allocated {} byte buffer for '{}'", buffer.size(), upload.name);
            self.attributes.insert(
                upload.id,
                GpuAttribute {
                    buffer,
                    bytes: 0,
                    item_size: upload.item_size,
                    version: upload.version,
                },
            );
        }

        let Some(gpu) = self.attributes.get_mut(&upload.id) else {
            return Err(TartanError::engine("attribute buffer missing after allocation"));
        };
        if !bytes.is_empty() {
            self.queue.write_buffer(&gpu.buffer, 0, bytes);
        }
        gpu.bytes = size;
        gpu.item_size = upload.item_size;
        gpu.version = upload.version;
        Ok(())
    }

    fn release_attribute(&mut self, attribute: AttributeId) -> bool {
        match self.attributes.remove(&attribute) {
            Some(gpu) => {
                log::trace!("Freed {} byte buffer of {:?}", gpu.buffer.size(), attribute);
                gpu.buffer.destroy();
                true
            }
            None => false,
        }
    }

    fn begin_frame(&mut self, frame: &FrameSetup) -> Result<()> {
        self.target(frame.surface)?;
        if self.frame.is_some() {
            log::warn!("Discarding an unfinished frame");
        }
        self.frame = Some(PendingFrame {
            setup: frame.clone(),
            draws: Vec::new(),
        });
        Ok(())
    }

    fn draw(&mut self, draw: &DrawSubmission) -> Result<()> {
        let (index, view_projection) = match &self.frame {
            Some(frame) => (
                frame.draws.len(),
                OPENGL_TO_WGPU_MATRIX * frame.setup.projection * frame.setup.view,
            ),
            None => return Err(TartanError::engine("draw outside of a frame")),
        };

        let position = draw
            .attribute("position")
            .and_then(|binding| self.attributes.get(&binding.id).map(|gpu| (binding.id, gpu)));
        let Some((position_id, position)) = position else {
            return Err(TartanError::engine(format!(
                "draw of {:?} has no uploaded position attribute",
                draw.node
            )));
        };
        if position.item_size != 3 || position.count() < draw.vertex_count as u64 {
            return Err(TartanError::engine(format!(
                "position attribute of {:?} cannot supply {} vertices",
                draw.node, draw.vertex_count
            )));
        }

        let color = if draw.vertex_colors {
            draw.attribute("color").and_then(|binding| {
                self.attributes
                    .get(&binding.id)
                    .filter(|gpu| gpu.item_size == 3 && gpu.count() >= draw.vertex_count as u64)
                    .map(|_| binding.id)
            })
        } else {
            None
        };
        if draw.vertex_colors && color.is_none() {
            log::debug!("{:?} requested vertex colours without a usable color attribute", draw.node);
        }

        let uniform = DrawUniform {
            mvp: matrix_to_array(view_projection * draw.model),
            color: draw.color,
            params: [if color.is_some() { 1.0 } else { 0.0 }, draw.point_size, 0.0, 0.0],
        };
        self.ensure_uniform_slots(index + 1);
        self.queue
            .write_buffer(&self.uniforms[index].buffer, 0, bytemuck::bytes_of(&uniform));

        if let Some(frame) = self.frame.as_mut() {
            frame.draws.push(PendingDraw {
                topology: draw.topology,
                position: position_id,
                color,
                vertex_count: draw.vertex_count,
                uniform: index,
            });
        }
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        let Some(frame) = self.frame.take() else {
            return Err(TartanError::engine("end_frame without begin_frame"));
        };
        let target = self.target(frame.setup.surface)?;
        let [r, g, b, a] = frame.setup.clear_color.map(f64::from);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Tartan Frame Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Tartan Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for draw in frame.draws.iter().filter(|draw| draw.vertex_count > 0) {
                let (Some(pipeline), Some(position)) = (
                    self.pipelines.get(&draw.topology),
                    self.attributes.get(&draw.position),
                ) else {
                    continue;
                };
                // Without vertex colours the position stream fills the colour
                // slot and the shader ignores it
                let color = draw
                    .color
                    .and_then(|id| self.attributes.get(&id))
                    .unwrap_or(position);

                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &self.uniforms[draw.uniform].bind_group, &[]);
                pass.set_vertex_buffer(POSITION_SLOT, position.buffer.slice(..position.bytes));
                pass.set_vertex_buffer(COLOR_SLOT, color.buffer.slice(..color.bytes));
                pass.draw(0..draw.vertex_count, 0..1);
            }
        }

        self.queue.submit(iter::once(encoder.finish()));
        log::trace!(
            "Submitted {} draw(s) to {:?}",
            frame.draws.len(),
            frame.setup.surface
        );
        Ok(())
    }

    fn abort_frame(&mut self) {
        if let Some(frame) = self.frame.take() {
            log::debug!(
                "Aborted frame on {:?} with {} pending draw(s)",
                frame.setup.surface,
                frame.draws.len()
            );
        }
    }
}

fn validate_size(width: u32, height: u32, max: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(TartanError::invalid(format!(
            "surface size must be positive, got {}x{}",
            width, height
        )));
    }
    if width > max || height > max {
        return Err(TartanError::engine(format!(
            "surface size {}x{} exceeds the device limit of {} pixels per side",
            width, height, max
        )));
    }
    Ok(())
}

fn vertex_layout(slot: u32) -> VertexBufferLayout<'static> {
    static POSITION: [VertexAttribute; 1] = [VertexAttribute {
        format: VertexFormat::Float32x3,
        offset: 0,
        shader_location: POSITION_SLOT,
    }];
    static COLOR: [VertexAttribute; 1] = [VertexAttribute {
        format: VertexFormat::Float32x3,
        offset: 0,
        shader_location: COLOR_SLOT,
    }];

    VertexBufferLayout {
        array_stride: 3 * std::mem::size_of::<f32>() as u64,
        step_mode: VertexStepMode::Vertex,
        attributes: if slot == POSITION_SLOT { &POSITION } else { &COLOR },
    }
}

fn create_pipeline(
    device: &Device,
    shader: &ShaderModule,
    uniform_layout: &BindGroupLayout,
    topology: Topology,
) -> RenderPipeline {
    let (primitive_topology, cull_mode) = match topology {
        Topology::Triangles => (PrimitiveTopology::TriangleList, Some(Face::Back)),
        Topology::LineStrip => (PrimitiveTopology::LineStrip, None),
        Topology::Points => (PrimitiveTopology::PointList, None),
    };
    let label = format!("Unlit {:?}", topology);

    let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some(&format!("{} Layout", label)),
        bind_group_layouts: &[uniform_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some(&label),
        layout: Some(&layout),
        vertex: VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[vertex_layout(POSITION_SLOT), vertex_layout(COLOR_SLOT)],
            compilation_options: PipelineCompilationOptions::default(),
        },
        fragment: Some(FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: COLOR_FORMAT,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: PipelineCompilationOptions::default(),
        }),
        primitive: PrimitiveState {
            topology: primitive_topology,
            strip_index_format: None,
            front_face: FrontFace::Ccw,
            cull_mode,
            polygon_mode: PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{SquareMatrix, Vector4};

    #[test]
    fn test_depth_remap() {
        let near = OPENGL_TO_WGPU_MATRIX * Vector4::new(0.0, 0.0, -1.0, 1.0);
        let far = OPENGL_TO_WGPU_MATRIX * Vector4::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(near.z / near.w, 0.0);
        assert_eq!(far.z / far.w, 1.0);
        assert!(OPENGL_TO_WGPU_MATRIX.invert().is_some());
    }

    #[test]
    fn test_surface_size_limits() {
        assert!(matches!(
            validate_size(0, 10, 4096),
            Err(TartanError::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_size(2560, 1440, 2048),
            Err(TartanError::Engine(_))
        ));
        assert!(validate_size(2048, 2048, 2048).is_ok());
    }

    #[test]
    fn test_oversized_surface_is_an_error() {
        // Needs an adapter; machines without one skip the check
        let Ok(mut engine) = WgpuEngine::new() else {
            return;
        };
        let max = engine.max_surface_dimension();
        let surface = engine.create_surface(300, 150).unwrap();

        assert!(matches!(
            engine.resize_surface(surface, max + 1, 1440),
            Err(TartanError::Engine(_))
        ));
        assert!(matches!(
            engine.create_surface(1, max + 1),
            Err(TartanError::Engine(_))
        ));
        engine.resize_surface(surface, max.min(2560), 1440_u32.min(max)).unwrap();
    }

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<DrawUniform>(), 96);
    }

    #[test]
    fn test_vertex_layouts_use_distinct_locations() {
        let position = vertex_layout(POSITION_SLOT);
        let color = vertex_layout(COLOR_SLOT);
        assert_eq!(position.attributes[0].shader_location, 0);
        assert_eq!(color.attributes[0].shader_location, 1);
        assert_eq!(position.array_stride, 12);
    }
}
