use crate::config::Config;
use crate::star::StarMesh;
use anyhow::{Result, anyhow};
use buffer::VertexBuffer;
use context::Context;
use pipeline::StarPipeline;
use shader::ShaderProgram;
use std::sync::Arc;
use swapchain::Swapchain;
use sync::ImageSync;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk;
use vulkanalia::vk::KhrSwapchainExtension;
use winit::window::Window;

mod buffer;
mod context;
mod pipeline;
mod shader;
mod swapchain;
mod sync;

const MAX_FRAMES_IN_FLIGHT: usize = 2;

pub struct Renderer {
    context: Context,
    swapchain: Swapchain,
    /// `None` when the shaders failed to load; frames are then only cleared.
    program: Option<ShaderProgram>,
    pipeline: Option<StarPipeline>,
    vertex_buffer: VertexBuffer,
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    image_available: Vec<vk::Semaphore>,
    in_flight_fences: Vec<vk::Fence>,
    image_sync: ImageSync,
    clear_color: [f32; 4],
    frame: usize,
    resized: bool,
}

impl Renderer {
    pub fn new(window: Arc<Window>, config: &Config, mesh: StarMesh) -> Result<Self> {
        // SAFETY: every Vulkan object below is created from this context and
        // destroyed in `Drop` before the context itself.
        unsafe {
            let mut context = Context::create(&window, config.wireframe)?;

            let swapchain = match Swapchain::create(&window, &context) {
                Ok(swapchain) => swapchain,
                Err(error) => {
                    context.destroy();
                    return Err(error);
                }
            };

            let mut renderer = Self {
                context,
                swapchain,
                program: None,
                pipeline: None,
                vertex_buffer: VertexBuffer::empty(),
                command_pool: vk::CommandPool::null(),
                command_buffers: Vec::new(),
                image_available: Vec::new(),
                in_flight_fences: Vec::new(),
                image_sync: ImageSync::default(),
                clear_color: config.clear_color,
                frame: 0,
                resized: false,
            };

            // From here on `Drop` cleans up whatever was created.
            renderer.vertex_buffer = VertexBuffer::upload(&renderer.context, mesh)?;
            renderer.program = match ShaderProgram::load(&config.vertex_shader, &config.fragment_shader) {
                Ok(program) => Some(program),
                Err(error) => {
                    tracing::warn!("Continuing without a shader program: {}", error);
                    None
                }
            };
            renderer.create_pipeline();
            renderer.create_command_pool()?;
            renderer.create_command_buffers()?;
            renderer.create_sync_objects()?;

            Ok(renderer)
        }
    }

    pub fn resized(&mut self) {
        self.resized = true;
    }

    pub fn render(&mut self, window: &Window) -> Result<()> {
        if super::is_minimized(window.inner_size()) {
            return Ok(());
        }
        unsafe { self.draw_frame(window) }
    }

    unsafe fn draw_frame(&mut self, window: &Window) -> Result<()> {
        let device = &self.context.device;
        let in_flight_fence = self.in_flight_fences[self.frame];

        device.wait_for_fences(&[in_flight_fence], true, u64::MAX)?;

        let result = device.acquire_next_image_khr(
            self.swapchain.swapchain,
            u64::MAX,
            self.image_available[self.frame],
            vk::Fence::null(),
        );

        let image_index = match result {
            Ok((image_index, _)) => image_index as usize,
            Err(vk::ErrorCode::OUT_OF_DATE_KHR) => return self.recreate_swapchain(window),
            Err(e) => return Err(anyhow!(e)),
        };

        if let Some(previous) = self.image_sync.claim(image_index, in_flight_fence) {
            device.wait_for_fences(&[previous], true, u64::MAX)?;
        }

        let wait_semaphores = &[self.image_available[self.frame]];
        let wait_stages = &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = &[self.command_buffers[image_index]];
        let signal_semaphores = &[self.image_sync.render_finished(image_index)];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(wait_semaphores)
            .wait_dst_stage_mask(wait_stages)
            .command_buffers(command_buffers)
            .signal_semaphores(signal_semaphores);

        device.reset_fences(&[in_flight_fence])?;
        device.queue_submit(self.context.graphics_queue, &[submit_info], in_flight_fence)?;

        let swapchains = &[self.swapchain.swapchain];
        let image_indices = &[image_index as u32];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(signal_semaphores)
            .swapchains(swapchains)
            .image_indices(image_indices);

        let result = device.queue_present_khr(self.context.present_queue, &present_info);
        let changed = result == Ok(vk::SuccessCode::SUBOPTIMAL_KHR)
            || result == Err(vk::ErrorCode::OUT_OF_DATE_KHR);

        if self.resized || changed {
            self.resized = false;
            self.recreate_swapchain(window)?;
        } else if let Err(e) = result {
            return Err(anyhow!(e));
        }

        self.frame = (self.frame + 1) % MAX_FRAMES_IN_FLIGHT;

        Ok(())
    }

    /// Rebuilds everything sized to the framebuffer, which resets the
    /// viewport to the whole window.
    unsafe fn recreate_swapchain(&mut self, window: &Window) -> Result<()> {
        self.context.device.device_wait_idle()?;
        self.destroy_swapchain();

        self.swapchain = Swapchain::create(window, &self.context)?;
        self.create_pipeline();
        self.create_command_buffers()?;
        self.create_image_sync()?;

        Ok(())
    }

    /// Best effort: a failed pipeline is logged and frames keep being cleared.
    unsafe fn create_pipeline(&mut self) {
        let Some(program) = self.program.as_ref() else {
            return;
        };

        self.pipeline = match StarPipeline::create(
            &self.context.device,
            program,
            self.swapchain.render_pass,
            self.swapchain.extent,
            self.context.wireframe,
        ) {
            Ok(pipeline) => Some(pipeline),
            Err(error) => {
                tracing::error!("Failed to link shader program: {:#}", error);
                None
            }
        };
    }

    unsafe fn create_command_pool(&mut self) -> Result<()> {
        let info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::empty())
            .queue_family_index(self.context.indices.graphics);

        self.command_pool = self.context.device.create_command_pool(&info, None)?;
        Ok(())
    }

    /// The draw never changes, so each swapchain image gets its commands
    /// recorded once.
    unsafe fn create_command_buffers(&mut self) -> Result<()> {
        let device = &self.context.device;
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(self.swapchain.framebuffers.len() as u32);

        self.command_buffers = device.allocate_command_buffers(&allocate_info)?;

        for (i, command_buffer) in self.command_buffers.iter().enumerate() {
            let begin_info = vk::CommandBufferBeginInfo::builder();
            device.begin_command_buffer(*command_buffer, &begin_info)?;

            let render_area = vk::Rect2D::builder()
                .offset(vk::Offset2D::default())
                .extent(self.swapchain.extent);

            let clear_values = &[vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            }];

            let info = vk::RenderPassBeginInfo::builder()
                .render_pass(self.swapchain.render_pass)
                .framebuffer(self.swapchain.framebuffers[i])
                .render_area(render_area)
                .clear_values(clear_values);

            device.cmd_begin_render_pass(*command_buffer, &info, vk::SubpassContents::INLINE);
            if let Some(pipeline) = self.pipeline.as_ref() {
                device.cmd_bind_pipeline(
                    *command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    pipeline.pipeline,
                );
                device.cmd_bind_vertex_buffers(*command_buffer, 0, &[self.vertex_buffer.buffer], &[0]);
                device.cmd_draw(*command_buffer, self.vertex_buffer.vertex_count(), 1, 0, 0);
            }
            device.cmd_end_render_pass(*command_buffer);

            device.end_command_buffer(*command_buffer)?;
        }

        Ok(())
    }

    unsafe fn create_sync_objects(&mut self) -> Result<()> {
        let device = &self.context.device;
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            self.image_available
                .push(device.create_semaphore(&semaphore_info, None)?);
            self.in_flight_fences
                .push(device.create_fence(&fence_info, None)?);
        }

        self.create_image_sync()
    }

    /// Presentation waits per swapchain image, so its semaphores follow the
    /// image count rather than the frames in flight.
    unsafe fn create_image_sync(&mut self) -> Result<()> {
        let device = &self.context.device;
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        self.image_sync.create(self.swapchain.images.len(), || {
            device.create_semaphore(&semaphore_info, None)
        })?;
        Ok(())
    }

    unsafe fn destroy_swapchain(&mut self) {
        let device = &self.context.device;
        if !self.command_buffers.is_empty() {
            device.free_command_buffers(self.command_pool, &self.command_buffers);
            self.command_buffers.clear();
        }
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.destroy(device);
        }
        self.image_sync.destroy(device);
        self.swapchain.destroy(device);
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        unsafe {
            if let Err(error) = self.context.device.device_wait_idle() {
                tracing::warn!("Failed to wait for device idle: {}", error);
            }

            self.destroy_swapchain();

            let device = &self.context.device;
            self.in_flight_fences
                .iter()
                .for_each(|f| device.destroy_fence(*f, None));
            self.image_available
                .iter()
                .for_each(|s| device.destroy_semaphore(*s, None));
            if !self.command_pool.is_null() {
                device.destroy_command_pool(self.command_pool, None);
            }
            self.vertex_buffer.destroy(device);

            self.context.destroy();
        }
    }
}

/// Creates one handle per input, storing each as it is made. On failure the
/// handles created so far stay in `out` for the caller to destroy.
fn create_each<I, T, E>(
    out: &mut Vec<T>,
    inputs: impl IntoIterator<Item = I>,
    mut create: impl FnMut(I) -> Result<T, E>,
) -> Result<(), E> {
    for input in inputs {
        out.push(create(input)?);
    }
    Ok(())
}
