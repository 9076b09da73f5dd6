use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::{
    BufferHandle, GpuDevice, ShaderHandle, TextureDesc, TextureFormat, TextureHandle,
    TextureRegion, WgpuInit,
};
use crate::paint::Color;
use crate::render::{BATCH_SHADER_WGSL, QuadVertex};

/// Texture bindings declared by the batch program.
pub const WGPU_TEXTURE_SLOTS: u32 = 16;

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct CameraUniform {
    view_projection: [[f32; 4]; 4],
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: [u32; 2],
    format: TextureFormat,
}

struct GpuBuffer {
    buffer: wgpu::Buffer,
    capacity: u64,
}

/// Headless [`GpuDevice`] over wgpu.
///
/// Draws land in an offscreen color target which can be read back with
/// [`read_target`](Self::read_target). Every `draw_indexed` is recorded and
/// submitted on its own so that the shared vertex buffer can be rewritten
/// between flushes.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,

    target: wgpu::Texture,
    target_view: wgpu::TextureView,
    target_size: [u32; 2],

    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    default_pipeline: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
    camera_ubo: wgpu::Buffer,
    unbound_view: wgpu::TextureView,

    textures: Vec<Option<GpuTexture>>,
    buffers: Vec<Option<GpuBuffer>>,
    pipelines: Vec<Option<wgpu::RenderPipeline>>,

    bindings: [Option<TextureHandle>; WGPU_TEXTURE_SLOTS as usize],
    shader: Option<ShaderHandle>,
    pending_clear: Option<wgpu::Color>,
}

impl WgpuDevice {
    /// Creates a device rendering into an offscreen target.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(init: WgpuInit) -> Result<Self> {
        let WgpuInit {
            target_size,
            power_preference,
            force_fallback_adapter,
            required_limits,
        } = init;
        anyhow::ensure!(
            target_size[0] > 0 && target_size[1] > 0,
            "render target has zero size"
        );

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let available = adapter.limits().max_sampled_textures_per_shader_stage;
        anyhow::ensure!(
            available >= WGPU_TEXTURE_SLOTS,
            "adapter supports {available} sampled textures per stage, batch program needs {WGPU_TEXTURE_SLOTS}"
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("sprig device"),
                required_features: wgpu::Features::empty(),
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let (target, target_view) = create_target(&device, target_size);
        let bind_group_layout = create_bind_group_layout(&device);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sprig batch pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sprig batch shader"),
            source: wgpu::ShaderSource::Wgsl(BATCH_SHADER_WGSL.into()),
        });
        let default_pipeline =
            create_pipeline(&device, &pipeline_layout, "sprig batch pipeline", &module, &module);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sprig batch sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let camera_ubo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sprig camera ubo"),
            contents: bytemuck::bytes_of(&CameraUniform {
                view_projection: glam::Mat4::IDENTITY.to_cols_array_2d(),
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let unbound = device.create_texture_with_data(
            &queue,
            &wgpu::TextureDescriptor {
                label: Some("sprig unbound slot"),
                size: wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[255, 255, 255, 255],
        );
        let unbound_view = unbound.create_view(&wgpu::TextureViewDescriptor::default());

        log::info!(
            "wgpu device ready: {} ({:?}), target {}x{}",
            adapter.get_info().name,
            adapter.get_info().backend,
            target_size[0],
            target_size[1]
        );

        Ok(Self {
            device,
            queue,
            target,
            target_view,
            target_size,
            bind_group_layout,
            pipeline_layout,
            default_pipeline,
            sampler,
            camera_ubo,
            unbound_view,
            textures: Vec::new(),
            buffers: Vec::new(),
            pipelines: Vec::new(),
            bindings: [None; WGPU_TEXTURE_SLOTS as usize],
            shader: None,
            pending_clear: None,
        })
    }

    /// Blocking variant of [`new`](Self::new) for tools without an executor.
    pub fn new_blocking(init: WgpuInit) -> Result<Self> {
        pollster::block_on(Self::new(init))
    }

    pub fn target_size(&self) -> [u32; 2] {
        self.target_size
    }

    /// Clears the target before the next draw (or readback).
    pub fn clear(&mut self, color: Color) {
        self.pending_clear = Some(wgpu::Color {
            r: color.r as f64,
            g: color.g as f64,
            b: color.b as f64,
            a: color.a as f64,
        });
    }

    /// Copies the offscreen target into an image (rows top-down).
    pub fn read_target(&mut self) -> Result<image::RgbaImage> {
        let [width, height] = self.target_size;
        let unpadded = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sprig target readback"),
            size: padded as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("sprig readback encoder"),
            });

        if let Some(clear) = self.pending_clear.take() {
            let _rpass = begin_target_pass(&mut encoder, &self.target_view, wgpu::LoadOp::Clear(clear));
        }

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .context("device poll failed during readback")?;
        rx.recv()
            .context("readback callback dropped")?
            .context("failed to map readback buffer")?;

        let mut pixels = Vec::with_capacity((unpadded * height) as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks(padded as usize) {
                pixels.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        readback.unmap();

        image::RgbaImage::from_raw(width, height, pixels)
            .context("readback size does not match target")
    }

    fn texture(&self, handle: TextureHandle) -> &GpuTexture {
        self.textures
            .get(handle.raw() as usize)
            .and_then(Option::as_ref)
            .unwrap_or_else(|| panic!("unknown or released texture {handle:?}"))
    }

    fn buffer(&self, handle: BufferHandle) -> &GpuBuffer {
        self.buffers
            .get(handle.raw() as usize)
            .and_then(Option::as_ref)
            .unwrap_or_else(|| panic!("unknown buffer {handle:?}"))
    }

    fn push_buffer(&mut self, buffer: GpuBuffer) -> BufferHandle {
        self.buffers.push(Some(buffer));
        BufferHandle::from_raw(self.buffers.len() as u32 - 1)
    }
}

impl GpuDevice for WgpuDevice {
    fn max_texture_slots(&self) -> u32 {
        WGPU_TEXTURE_SLOTS
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> TextureHandle {
        desc.validate();

        let format = match desc.format {
            TextureFormat::Rgba8Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        };
        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: 1,
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        if let Some(pixels) = desc.pixels {
            write_texels(&self.queue, &texture, TextureRegion::new(0, 0, desc.width, desc.height), pixels);
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.textures.push(Some(GpuTexture {
            texture,
            view,
            size: [desc.width, desc.height],
            format: desc.format,
        }));
        TextureHandle::from_raw(self.textures.len() as u32 - 1)
    }

    fn upload_subregion(&mut self, texture: TextureHandle, region: TextureRegion, data: &[u8]) {
        let tex = self.texture(texture);
        region.validate(tex.size, tex.format, data);
        write_texels(&self.queue, &tex.texture, region, data);
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        if let Some(slot) = self.textures.get_mut(texture.raw() as usize) {
            if let Some(tex) = slot.take() {
                tex.texture.destroy();
            }
        }
        for binding in &mut self.bindings {
            if *binding == Some(texture) {
                *binding = None;
            }
        }
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        if let Some(slot) = self.buffers.get_mut(buffer.raw() as usize) {
            if let Some(buf) = slot.take() {
                buf.buffer.destroy();
            }
        }
    }

    fn create_vertex_buffer(&mut self, capacity: u64) -> BufferHandle {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sprig batch vbo"),
            size: capacity,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.push_buffer(GpuBuffer { buffer, capacity })
    }

    fn create_index_buffer(&mut self, indices: &[u32]) -> BufferHandle {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sprig batch ibo"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let capacity = std::mem::size_of_val(indices) as u64;
        self.push_buffer(GpuBuffer { buffer, capacity })
    }

    fn upload(&mut self, buffer: BufferHandle, data: &[u8]) {
        let buf = self.buffer(buffer);
        assert!(
            data.len() as u64 <= buf.capacity,
            "upload of {} bytes overflows buffer capacity {}",
            data.len(),
            buf.capacity
        );
        self.queue.write_buffer(&buf.buffer, 0, data);
    }

    fn create_shader(&mut self, label: &str, vertex_src: &str, fragment_src: &str) -> ShaderHandle {
        let vs = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(vertex_src.into()),
        });
        let fs = if vertex_src == fragment_src {
            vs.clone()
        } else {
            self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(fragment_src.into()),
            })
        };

        let pipeline = create_pipeline(&self.device, &self.pipeline_layout, label, &vs, &fs);
        self.pipelines.push(Some(pipeline));
        ShaderHandle::from_raw(self.pipelines.len() as u32 - 1)
    }

    fn release_shader(&mut self, shader: ShaderHandle) {
        if let Some(slot) = self.pipelines.get_mut(shader.raw() as usize) {
            *slot = None;
        }
        if self.shader == Some(shader) {
            self.shader = None;
        }
    }

    fn bind_shader(&mut self, shader: Option<ShaderHandle>) {
        self.shader = shader;
    }

    fn set_view_projection(&mut self, matrix: [[f32; 4]; 4]) {
        let u = CameraUniform { view_projection: matrix };
        self.queue.write_buffer(&self.camera_ubo, 0, bytemuck::bytes_of(&u));
    }

    fn bind_texture(&mut self, texture: TextureHandle, slot: u32) {
        assert!(
            slot < WGPU_TEXTURE_SLOTS,
            "slot {slot} out of range (device has {WGPU_TEXTURE_SLOTS})"
        );
        let _ = self.texture(texture);
        self.bindings[slot as usize] = Some(texture);
    }

    fn draw_indexed(&mut self, vertices: BufferHandle, indices: BufferHandle, index_count: u32) {
        let load = match self.pending_clear.take() {
            Some(clear) => wgpu::LoadOp::Clear(clear),
            None => wgpu::LoadOp::Load,
        };

        let views: Vec<&wgpu::TextureView> = self
            .bindings
            .iter()
            .map(|binding| match binding {
                Some(handle) => &self.texture(*handle).view,
                None => &self.unbound_view,
            })
            .collect();

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: self.camera_ubo.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
        ];
        entries.extend(views.iter().enumerate().map(|(slot, view)| wgpu::BindGroupEntry {
            binding: 2 + slot as u32,
            resource: wgpu::BindingResource::TextureView(view),
        }));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprig batch bind group"),
            layout: &self.bind_group_layout,
            entries: &entries,
        });

        let pipeline = self
            .shader
            .and_then(|s| self.pipelines.get(s.raw() as usize))
            .and_then(Option::as_ref)
            .unwrap_or(&self.default_pipeline);

        let vbo = &self.buffer(vertices).buffer;
        let ibo = &self.buffer(indices).buffer;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("sprig batch encoder"),
            });
        {
            let mut rpass = begin_target_pass(&mut encoder, &self.target_view, load);
            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &bind_group, &[]);
            rpass.set_vertex_buffer(0, vbo.slice(..));
            rpass.set_index_buffer(ibo.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(0..index_count, 0, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

// ── helpers ───────────────────────────────────────────────────────────────

fn write_texels(queue: &wgpu::Queue, texture: &wgpu::Texture, region: TextureRegion, data: &[u8]) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x: region.x, y: region.y, z: 0 },
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(region.width * 4),
            rows_per_image: Some(region.height),
        },
        wgpu::Extent3d {
            width: region.width,
            height: region.height,
            depth_or_array_layers: 1,
        },
    );
}

fn begin_target_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("sprig batch pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    })
}

fn create_target(device: &wgpu::Device, size: [u32; 2]) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("sprig offscreen target"),
        size: wgpu::Extent3d {
            width: size[0],
            height: size[1],
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn create_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let mut entries = vec![
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<CameraUniform>() as u64),
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        },
    ];
    entries.extend((0..WGPU_TEXTURE_SLOTS).map(|slot| wgpu::BindGroupLayoutEntry {
        binding: 2 + slot,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }));

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("sprig batch bgl"),
        entries: &entries,
    })
}

fn premul_alpha_blend() -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: component,
        alpha: component,
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    label: &str,
    vs: &wgpu::ShaderModule,
    fs: &wgpu::ShaderModule,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: vs,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[QuadVertex::layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module: fs,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: TARGET_FORMAT,
                blend: Some(premul_alpha_blend()),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}
