//! `wgpu` implementation of the rendering boundary.

use std::{future::Future, num::NonZeroU64};

use asset::{FlatVertexBuffers, TextureData, TextureSource};
use corelib::{
    BufferHandle, FrameError, InitializationError, ProgramHandle, RenderBackend, TextureHandle,
    Uniforms,
};
use wgpu::{
    BindGroup, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType,
    BlendState, Buffer, BufferBindingType, BufferUsages, ColorTargetState, ColorWrites,
    CommandEncoderDescriptor, DepthBiasState, DepthStencilState, ErrorFilter, Extent3d,
    FragmentState, LoadOp, Operations, PipelineLayoutDescriptor, RenderPassColorAttachment,
    RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor, SamplerBindingType,
    ShaderModuleDescriptor, ShaderSource, ShaderStages, StoreOp, SurfaceError, TextureDescriptor,
    TextureDimension, TextureFormat, TextureSampleType, TextureUsages, TextureViewDimension,
    VertexBufferLayout, VertexState, VertexStepMode, util::DeviceExt,
};

use crate::{
    context::{DEPTH_FORMAT, GpuContext},
    uniform::SceneUniform,
};

const POSITION_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: (3 * std::mem::size_of::<f32>()) as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &wgpu::vertex_attr_array![0 => Float32x3],
};

const TEXCOORD_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: (2 * std::mem::size_of::<f32>()) as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &wgpu::vertex_attr_array![1 => Float32x2],
};

const NORMAL_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: (3 * std::mem::size_of::<f32>()) as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &wgpu::vertex_attr_array![2 => Float32x3],
};

const CLEAR_COLOR: wgpu::Color = wgpu::Color::WHITE;

struct GpuProgram {
    pipeline: RenderPipeline,
    uniform: SceneUniform,
    uniform_buf: Buffer,
    uniform_bg: BindGroup,
    texture: Option<TextureHandle>,
}

struct GpuBuffers {
    positions: Buffer,
    texcoords: Buffer,
    normals: Buffer,
    vertex_count: u32,
}

struct GpuTexture {
    #[allow(dead_code)]
    texture: wgpu::Texture,
    bind_group: BindGroup,
}

/// Owns the GPU context and every resource created through it. Handles are
/// indices into the resource lists; released slots are `None`.
pub struct WgpuBackend {
    ctx: GpuContext,
    uniform_bgl: BindGroupLayout,
    texture_bgl: BindGroupLayout,
    programs: Vec<Option<GpuProgram>>,
    buffer_sets: Vec<Option<GpuBuffers>>,
    textures: Vec<Option<GpuTexture>>,
    bound: Option<(ProgramHandle, BufferHandle)>,
}

/// Drop the resource in `index`, then shrink away trailing empty slots so a
/// retried setup reuses them.
fn release_slot<T>(slots: &mut Vec<Option<T>>, index: usize) -> bool {
    let released = slots.get_mut(index).and_then(Option::take).is_some();
    while matches!(slots.last(), Some(None)) {
        slots.pop();
    }
    released
}

fn check_texture_extent(
    width: u32,
    height: u32,
    limits: &wgpu::Limits,
) -> Result<(), InitializationError> {
    let max = limits.max_texture_dimension_2d;
    if width == 0 || height == 0 {
        return Err(InitializationError::Texture(format!(
            "texture has no texels ({width}x{height})"
        )));
    }
    if width > max || height > max {
        return Err(InitializationError::Texture(format!(
            "{width}x{height} texture exceeds the device limit of {max}x{max}"
        )));
    }
    Ok(())
}

fn check_buffer_size(
    label: &str,
    floats: usize,
    limits: &wgpu::Limits,
) -> Result<(), InitializationError> {
    let bytes = (floats as u64).saturating_mul(std::mem::size_of::<f32>() as u64);
    if bytes > limits.max_buffer_size {
        return Err(InitializationError::Buffers(format!(
            "{label} needs {bytes} bytes, device allows {}",
            limits.max_buffer_size
        )));
    }
    Ok(())
}

impl WgpuBackend {
    pub fn new(ctx: GpuContext) -> Self {
        let uniform_bgl = ctx
            .device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("Scene BGL"),
                entries: &[BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::VERTEX_FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(
                            std::mem::size_of::<SceneUniform>() as u64
                        ),
                    },
                    count: None,
                }],
            });

        let texture_bgl = ctx
            .device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("Texture BGL"),
                entries: &[
                    BindGroupLayoutEntry {
                        binding: 0,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Texture {
                            sample_type: TextureSampleType::Float { filterable: true },
                            view_dimension: TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    BindGroupLayoutEntry {
                        binding: 1,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Sampler(SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        Self {
            ctx,
            uniform_bgl,
            texture_bgl,
            programs: Vec::new(),
            buffer_sets: Vec::new(),
            textures: Vec::new(),
            bound: None,
        }
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    pub fn is_surface_lost(err: &FrameError) -> bool {
        matches!(err, FrameError::SurfaceLost)
    }

    pub fn recreate_surface(&mut self) {
        self.ctx.recreate_surface();
    }

    fn program(&self, handle: ProgramHandle) -> Result<&GpuProgram, FrameError> {
        self.programs
            .get(handle.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| FrameError::UnknownHandle(format!("program {}", handle.0)))
    }

    fn buffer_set(&self, handle: BufferHandle) -> Result<&GpuBuffers, FrameError> {
        self.buffer_sets
            .get(handle.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| FrameError::UnknownHandle(format!("buffer set {}", handle.0)))
    }

    async fn upload_texture(
        &mut self,
        data: &TextureData,
    ) -> Result<TextureHandle, InitializationError> {
        let device = &self.ctx.device;
        check_texture_extent(data.width, data.height, &device.limits())?;
        device.push_error_scope(ErrorFilter::Validation);

        let size = Extent3d {
            width: data.width,
            height: data.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&TextureDescriptor {
            label: Some("Mesh Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            // Sampled as a normal perturbation, so no sRGB decode.
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &data.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(data.bytes_per_pixel() * data.width),
                rows_per_image: Some(data.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Mesh Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Texture BG"),
            layout: &self.texture_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        if let Some(err) = device.pop_error_scope().await {
            log::error!("Texture upload failed: {err}");
            return Err(InitializationError::Texture(err.to_string()));
        }

        let handle = TextureHandle(self.textures.len() as u32);
        self.textures.push(Some(GpuTexture {
            texture,
            bind_group,
        }));
        Ok(handle)
    }
}

impl RenderBackend for WgpuBackend {
    fn create_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramHandle, InitializationError> {
        let device = &self.ctx.device;
        device.push_error_scope(ErrorFilter::Validation);

        let vertex = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Mesh VS"),
            source: ShaderSource::Wgsl(vertex_source.into()),
        });
        let fragment = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Mesh FS"),
            source: ShaderSource::Wgsl(fragment_source.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Mesh PipelineLayout"),
            bind_group_layouts: &[&self.uniform_bgl, &self.texture_bgl],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Mesh Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &vertex,
                entry_point: Some("vs_main"),
                buffers: &[POSITION_LAYOUT, TEXCOORD_LAYOUT, NORMAL_LAYOUT],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &fragment,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: self.ctx.surface_format(),
                    blend: Some(BlendState::REPLACE),
                    write_mask: ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: Some(wgpu::Face::Back),
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
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            log::error!("Shader program failed to build: {err}");
            return Err(InitializationError::Program(err.to_string()));
        }

        let uniform = SceneUniform::default();
        let uniform_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene UBO"),
            contents: bytemuck::bytes_of(&uniform),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });
        let uniform_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene BG"),
            layout: &self.uniform_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buf.as_entire_binding(),
            }],
        });

        let handle = ProgramHandle(self.programs.len() as u32);
        self.programs.push(Some(GpuProgram {
            pipeline,
            uniform,
            uniform_buf,
            uniform_bg,
            texture: None,
        }));
        log::info!("Created shader program {}", handle.0);
        Ok(handle)
    }

    fn create_buffers(
        &mut self,
        buffers: &FlatVertexBuffers,
    ) -> Result<BufferHandle, InitializationError> {
        if buffers.is_empty() {
            return Err(InitializationError::Buffers(
                "mesh has no face corners to draw".into(),
            ));
        }
        let vertex_count = u32::try_from(buffers.vertex_count()).map_err(|_| {
            InitializationError::Buffers(format!("more than {} vertices", u32::MAX))
        })?;

        let device = &self.ctx.device;
        let limits = device.limits();
        check_buffer_size("position buffer", buffers.positions().len(), &limits)?;
        check_buffer_size("normal buffer", buffers.normals().len(), &limits)?;
        device.push_error_scope(ErrorFilter::Validation);

        let upload = |label: &str, data: &[f32]| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(data),
                usage: BufferUsages::VERTEX,
            })
        };
        let set = GpuBuffers {
            positions: upload("Position VB", buffers.positions()),
            texcoords: upload("Texcoord VB", buffers.texcoords()),
            normals: upload("Normal VB", buffers.normals()),
            vertex_count,
        };

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            log::error!("Vertex buffer upload failed: {err}");
            return Err(InitializationError::Buffers(err.to_string()));
        }

        let handle = BufferHandle(self.buffer_sets.len() as u32);
        self.buffer_sets.push(Some(set));
        log::info!("Uploaded buffer set {} ({} vertices)", handle.0, vertex_count);
        Ok(handle)
    }

    fn load_texture(
        &mut self,
        source: &TextureSource,
    ) -> impl Future<Output = Result<TextureHandle, InitializationError>> {
        async move {
            let data = source
                .decode()
                .map_err(|e| InitializationError::Texture(format!("{e:#}")))?;
            let handle = self.upload_texture(&data).await?;
            log::info!(
                "Texture {} ready ({}x{})",
                handle.0,
                data.width,
                data.height
            );
            Ok(handle)
        }
    }

    fn bind_texture(
        &mut self,
        program: ProgramHandle,
        texture: TextureHandle,
    ) -> Result<(), InitializationError> {
        if !self
            .textures
            .get(texture.0 as usize)
            .is_some_and(Option::is_some)
        {
            return Err(InitializationError::Texture(format!(
                "unknown texture handle {}",
                texture.0
            )));
        }
        let program = self
            .programs
            .get_mut(program.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| InitializationError::Program(format!("unknown program {}", program.0)))?;
        program.texture = Some(texture);
        Ok(())
    }

    fn release_program(&mut self, program: ProgramHandle) {
        if release_slot(&mut self.programs, program.0 as usize) {
            log::debug!("Released shader program {}", program.0);
        }
    }

    fn release_buffers(&mut self, buffers: BufferHandle) {
        if self.bound.is_some_and(|(_, b)| b == buffers) {
            self.bound = None;
        }
        if release_slot(&mut self.buffer_sets, buffers.0 as usize) {
            log::debug!("Released buffer set {}", buffers.0);
        }
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        if release_slot(&mut self.textures, texture.0 as usize) {
            log::debug!("Released texture {}", texture.0);
        }
    }

    fn bind_buffers_and_attributes(
        &mut self,
        program: ProgramHandle,
        buffers: BufferHandle,
    ) -> Result<(), FrameError> {
        self.program(program)?;
        self.buffer_set(buffers)?;
        self.bound = Some((program, buffers));
        Ok(())
    }

    fn set_uniforms(
        &mut self,
        program: ProgramHandle,
        uniforms: &Uniforms,
    ) -> Result<(), FrameError> {
        let gpu_program = self
            .programs
            .get_mut(program.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| FrameError::UnknownHandle(format!("program {}", program.0)))?;

        let mut block = gpu_program.uniform;
        block.apply_all(uniforms)?;
        gpu_program.uniform = block;
        self.ctx
            .queue
            .write_buffer(&gpu_program.uniform_buf, 0, bytemuck::bytes_of(&block));
        Ok(())
    }

    fn draw(&mut self, buffers: BufferHandle) -> Result<(), FrameError> {
        let (program_handle, bound_buffers) = self
            .bound
            .ok_or_else(|| FrameError::Backend("draw called before binding buffers".into()))?;
        if bound_buffers != buffers {
            return Err(FrameError::Backend(format!(
                "buffer set {} is not bound",
                buffers.0
            )));
        }

        let program = self.program(program_handle)?;
        let set = self.buffer_set(buffers)?;
        let texture = program
            .texture
            .and_then(|t| self.textures.get(t.0 as usize))
            .and_then(Option::as_ref)
            .ok_or_else(|| FrameError::Backend("no texture bound to program".into()))?;

        let frame = match self.ctx.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Lost | SurfaceError::Outdated) => return Err(FrameError::SurfaceLost),
            Err(SurfaceError::Timeout) => {
                log::warn!("Surface acquire timed out, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(FrameError::Backend(e.to_string())),
        };
        let view = frame.texture.create_view(&Default::default());

        let mut encoder = self
            .ctx
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
                    view: &self.ctx.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            rpass.set_pipeline(&program.pipeline);
            rpass.set_bind_group(0, &program.uniform_bg, &[]);
            rpass.set_bind_group(1, &texture.bind_group, &[]);
            rpass.set_vertex_buffer(0, set.positions.slice(..));
            rpass.set_vertex_buffer(1, set.texcoords.slice(..));
            rpass.set_vertex_buffer(2, set.normals.slice(..));
            rpass.draw(0..set.vertex_count, 0..1);
        }

        self.ctx.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn aspect_ratio(&self) -> f32 {
        self.ctx.aspect_ratio()
    }

    fn resize(&mut self, width: u32, height: u32) {
        log::info!("Resizing render target to {}x{}", width, height);
        self.ctx.resize(width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_texture_is_rejected_before_upload() {
        let limits = wgpu::Limits::downlevel_defaults();
        let max = limits.max_texture_dimension_2d;

        assert!(check_texture_extent(max, max, &limits).is_ok());
        let err = check_texture_extent(max + 1, 16, &limits).unwrap_err();
        assert!(matches!(err, InitializationError::Texture(_)));
        assert!(err.to_string().contains(&format!("{}x16", max + 1)), "{err}");
        assert!(matches!(
            check_texture_extent(0, 4, &limits),
            Err(InitializationError::Texture(_))
        ));
    }

    #[test]
    fn oversized_vertex_buffer_is_rejected() {
        let limits = wgpu::Limits {
            max_buffer_size: 1024,
            ..wgpu::Limits::downlevel_defaults()
        };
        assert!(check_buffer_size("position buffer", 256, &limits).is_ok());
        assert!(matches!(
            check_buffer_size("position buffer", 257, &limits),
            Err(InitializationError::Buffers(_))
        ));
    }

    #[test]
    fn released_slots_are_emptied_and_trimmed() {
        let mut slots = vec![Some(1), Some(2), Some(3)];
        assert!(release_slot(&mut slots, 1));
        assert_eq!(slots, vec![Some(1), None, Some(3)]);

        assert!(release_slot(&mut slots, 2));
        assert_eq!(slots, vec![Some(1)]);

        assert!(!release_slot(&mut slots, 1));
        assert!(!release_slot(&mut slots, 7));
        assert_eq!(slots, vec![Some(1)]);
    }
}
