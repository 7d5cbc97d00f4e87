//! Draws the latest image of a window onto its surface with wgpu.

use std::rc::Rc;

use anyhow::anyhow;
use wgpu::*;
use winit::{dpi::PhysicalSize, event_loop::EventLoopWindowTarget, window::WindowBuilder};

use crate::image::Resolution;

/// The wgpu device all windows render with.
pub struct Gpu {
    instance: Instance,
    adapter: Adapter,
    device: Device,
    queue: Queue,
}

impl Gpu {
    pub async fn open() -> anyhow::Result<Self> {
        // GL is left out, it panics on some drivers.
        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&RequestAdapterOptions::default())
            .await
            .ok_or_else(|| anyhow!("no graphics adapter found"))?;
        let info = adapter.get_info();
        log::info!("rendering with {} ({:?})", info.name, info.backend);

        let limits = Limits::downlevel_defaults().using_resolution(adapter.limits());
        let descriptor = DeviceDescriptor {
            label: Some("handsign"),
            features: Features::empty(),
            limits,
        };
        let (device, queue) = adapter.request_device(&descriptor, None).await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }
}

/// A fixed-size window showing one image.
pub struct Window {
    pub(crate) win: Rc<winit::window::Window>,
    resolution: Resolution,
}

impl Window {
    pub fn open<T>(
        target: &EventLoopWindowTarget<T>,
        title: &str,
        resolution: Resolution,
    ) -> anyhow::Result<Self> {
        let win = WindowBuilder::new()
            .with_title(title)
            .with_inner_size(physical_size(resolution))
            .with_resizable(false)
            .build(target)?;
        Ok(Self {
            win: Rc::new(win),
            resolution,
        })
    }
}

fn physical_size(res: Resolution) -> PhysicalSize<u32> {
    PhysicalSize::new(res.width(), res.height())
}

/// The image texture of a window, with the bind group that samples it.
struct Frame {
    texture: Texture,
    size: Extent3d,
    bind_group: BindGroup,
}

impl Frame {
    const FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;

    fn new(gpu: &Gpu, layout: &BindGroupLayout, size: Extent3d) -> Self {
        let texture = gpu.device.create_texture(&TextureDescriptor {
            label: Some("frame"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: Self::FORMAT,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&TextureViewDescriptor::default());
        let sampler = gpu.device.create_sampler(&SamplerDescriptor::default());
        let bind_group = gpu.device.create_bind_group(&BindGroupDescriptor {
            label: Some("frame"),
            layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(&view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&sampler),
                },
            ],
        });

        Self {
            texture,
            size,
            bind_group,
        }
    }

    fn upload(&self, gpu: &Gpu, rgba: &[u8]) {
        gpu.queue.write_texture(
            self.texture.as_image_copy(),
            rgba,
            ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(self.size.width * 4),
                rows_per_image: None,
            },
            self.size,
        );
    }
}

fn frame_bind_group_layout(device: &Device) -> BindGroupLayout {
    let fragment = |binding, ty| BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty,
        count: None,
    };
    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("frame"),
        entries: &[
            fragment(
                0,
                BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: false },
                    view_dimension: TextureViewDimension::D2,
                    multisampled: false,
                },
            ),
            fragment(1, BindingType::Sampler(SamplerBindingType::NonFiltering)),
        ],
    })
}

/// Builds a pipeline drawing one viewport-filling triangle textured with the frame.
fn frame_pipeline(
    device: &Device,
    layout: &BindGroupLayout,
    surface_format: TextureFormat,
) -> RenderPipeline {
    let shader = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("frame"),
        source: ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("frame"),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("frame"),
        layout: Some(&pipeline_layout),
        vertex: VertexState {
            module: &shader,
            entry_point: "vert",
            buffers: &[],
        },
        fragment: Some(FragmentState {
            module: &shader,
            entry_point: "frag",
            targets: &[Some(surface_format.into())],
        }),
        primitive: PrimitiveState::default(),
        depth_stencil: None,
        multisample: MultisampleState::default(),
        multiview: None,
    })
}

/// Renders one window.
pub struct Renderer {
    gpu: Rc<Gpu>,
    surface: Surface,
    surface_format: TextureFormat,
    pipeline: RenderPipeline,
    layout: BindGroupLayout,
    frame: Frame,

    // Dropped after `surface`.
    window: Window,
}

impl Renderer {
    pub fn new(window: Window, gpu: Rc<Gpu>) -> anyhow::Result<Self> {
        // Safety: `window` is stored next to the surface and dropped after it.
        let surface = unsafe { gpu.instance.create_surface(&*window.win)? };
        let formats = surface.get_capabilities(&gpu.adapter).formats;
        let surface_format = formats
            .iter()
            .find(|format| format.is_srgb())
            .or(formats.first())
            .copied()
            .ok_or_else(|| anyhow!("window surface supports no texture format"))?;

        let layout = frame_bind_group_layout(&gpu.device);
        let pipeline = frame_pipeline(&gpu.device, &layout, surface_format);
        let frame = Frame::new(&gpu, &layout, Extent3d::default());

        let renderer = Self {
            gpu,
            surface,
            surface_format,
            pipeline,
            layout,
            frame,
            window,
        };
        renderer.configure_surface();
        Ok(renderer)
    }

    pub fn window(&self) -> &winit::window::Window {
        &self.window.win
    }

    /// Replaces the displayed image with `rgba`, resizing the window if `res` changed.
    pub fn update_texture(&mut self, res: Resolution, rgba: &[u8]) {
        let size = Extent3d {
            width: res.width(),
            height: res.height(),
            depth_or_array_layers: 1,
        };
        if self.frame.size != size {
            log::trace!("new {res} frame texture");
            self.frame = Frame::new(&self.gpu, &self.layout, size);
        }
        self.frame.upload(&self.gpu, rgba);

        if self.window.resolution != res {
            self.window.resolution = res;
            self.window.win.set_inner_size(physical_size(res));
            self.configure_surface();
        }
    }

    pub fn redraw(&mut self) -> anyhow::Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(e @ (SurfaceError::Lost | SurfaceError::Outdated)) => {
                log::debug!("reconfiguring surface: {e}");
                self.configure_surface();
                self.surface.get_current_texture()?
            }
            Err(e) => return Err(e.into()),
        };
        let target = output
            .texture
            .create_view(&TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&CommandEncoderDescriptor::default());
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("frame"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &target,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color::BLACK),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.frame.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.gpu.queue.submit([encoder.finish()]);
        output.present();
        Ok(())
    }

    fn configure_surface(&self) {
        let res = self.window.resolution;
        log::debug!("configuring {res} surface ({:?})", self.surface_format);
        self.surface.configure(
            &self.gpu.device,
            &SurfaceConfiguration {
                usage: TextureUsages::RENDER_ATTACHMENT,
                format: self.surface_format,
                width: res.width(),
                height: res.height(),
                present_mode: PresentMode::Fifo,
                alpha_mode: CompositeAlphaMode::Auto,
                view_formats: Vec::new(),
            },
        );
    }
}
