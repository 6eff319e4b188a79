use super::context::{Context, SwapchainSupport};
use super::create_each;
use anyhow::Result;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk;
use vulkanalia::vk::KhrSwapchainExtension;
use winit::window::Window;

/// Swapchain images plus the render pass and framebuffers that target them.
/// Rebuilt whenever the window size changes.
pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub render_pass: vk::RenderPass,
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl Swapchain {
    pub unsafe fn create(window: &Window, context: &Context) -> Result<Self> {
        let device = &context.device;
        let indices = context.indices;
        let support = SwapchainSupport::get(&context.instance, context.surface, context.physical_device)?;

        let surface_format = surface_format(&support.formats);
        let present_mode = present_mode(&support.present_modes);
        let extent = extent(window, support.capabilities);

        let mut image_count = support.capabilities.min_image_count + 1;
        if support.capabilities.max_image_count != 0
            && image_count > support.capabilities.max_image_count
        {
            image_count = support.capabilities.max_image_count;
        }

        let mut queue_family_indices = vec![];
        let image_sharing_mode = if indices.graphics != indices.present {
            queue_family_indices.push(indices.graphics);
            queue_family_indices.push(indices.present);
            vk::SharingMode::CONCURRENT
        } else {
            vk::SharingMode::EXCLUSIVE
        };

        let info = vk::SwapchainCreateInfoKHR::builder()
            .surface(context.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(image_sharing_mode)
            .queue_family_indices(&queue_family_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain = device.create_swapchain_khr(&info, None)?;
        let images = match device.get_swapchain_images_khr(swapchain) {
            Ok(images) => images,
            Err(error) => {
                device.destroy_swapchain_khr(swapchain, None);
                return Err(error.into());
            }
        };

        let mut target = Self {
            swapchain,
            extent,
            images,
            image_views: Vec::new(),
            render_pass: vk::RenderPass::null(),
            framebuffers: Vec::new(),
        };
        // Handles are stored as they are created, so `destroy` can undo a
        // partial build.
        if let Err(error) = target.create_targets(device, surface_format.format) {
            target.destroy(device);
            return Err(error);
        }

        tracing::debug!(
            "Created swapchain: {} images, {}x{}, {:?}.",
            target.images.len(),
            extent.width,
            extent.height,
            present_mode
        );

        Ok(target)
    }

    unsafe fn create_targets(&mut self, device: &Device, format: vk::Format) -> Result<()> {
        create_each(&mut self.image_views, &self.images, |i| {
            create_image_view(device, *i, format)
        })?;

        self.render_pass = create_render_pass(device, format)?;

        let render_pass = self.render_pass;
        let extent = self.extent;
        create_each(&mut self.framebuffers, &self.image_views, |i| {
            let attachments = &[*i];
            let info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            device.create_framebuffer(&info, None)
        })?;

        Ok(())
    }

    pub unsafe fn destroy(&mut self, device: &Device) {
        self.framebuffers
            .iter()
            .for_each(|f| device.destroy_framebuffer(*f, None));
        device.destroy_render_pass(self.render_pass, None);
        self.image_views
            .iter()
            .for_each(|v| device.destroy_image_view(*v, None));
        device.destroy_swapchain_khr(self.swapchain, None);

        self.framebuffers.clear();
        self.image_views.clear();
        self.render_pass = vk::RenderPass::null();
        self.swapchain = vk::SwapchainKHR::null();
    }
}

fn surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .cloned()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or_else(|| formats[0])
}

fn present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    present_modes
        .iter()
        .cloned()
        .find(|m| *m == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Full framebuffer size, clamped to what the surface allows.
fn extent(window: &Window, capabilities: vk::SurfaceCapabilitiesKHR) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        let size = window.inner_size();
        let min = capabilities.min_image_extent;
        let max = capabilities.max_image_extent;
        vk::Extent2D::builder()
            .width(size.width.clamp(min.width, max.width))
            .height(size.height.clamp(min.height, max.height))
            .build()
    }
}

unsafe fn create_image_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
) -> Result<vk::ImageView, vk::ErrorCode> {
    let components = vk::ComponentMapping::builder()
        .r(vk::ComponentSwizzle::IDENTITY)
        .g(vk::ComponentSwizzle::IDENTITY)
        .b(vk::ComponentSwizzle::IDENTITY)
        .a(vk::ComponentSwizzle::IDENTITY);

    let subresource_range = vk::ImageSubresourceRange::builder()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1);

    let info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::_2D)
        .format(format)
        .components(components)
        .subresource_range(subresource_range);

    device.create_image_view(&info, None)
}

unsafe fn create_render_pass(device: &Device, format: vk::Format) -> Result<vk::RenderPass> {
    let color_attachment = vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

    let color_attachment_ref = vk::AttachmentReference::builder()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

    let color_attachments = &[color_attachment_ref];
    let subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(color_attachments);

    let dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE);

    let attachments = &[color_attachment];
    let subpasses = &[subpass];
    let dependencies = &[dependency];
    let info = vk::RenderPassCreateInfo::builder()
        .attachments(attachments)
        .subpasses(subpasses)
        .dependencies(dependencies);

    Ok(device.create_render_pass(&info, None)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    #[test]
    fn prefers_srgb_surface_format() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(surface_format(&formats).format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn falls_back_to_first_surface_format() {
        let formats = [format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR)];
        assert_eq!(surface_format(&formats).format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn prefers_mailbox_then_fifo() {
        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX];
        assert_eq!(present_mode(&modes), vk::PresentModeKHR::MAILBOX);
        assert_eq!(present_mode(&[vk::PresentModeKHR::IMMEDIATE]), vk::PresentModeKHR::FIFO);
    }
}
