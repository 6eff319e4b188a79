use super::buffer;
use super::shader::{self, ShaderKind, ShaderProgram};
use anyhow::Result;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk;

/// Triangle-fan pipeline for the star. The viewport is baked in, so it is
/// rebuilt together with the swapchain.
pub struct StarPipeline {
    pub pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl StarPipeline {
    pub unsafe fn create(
        device: &Device,
        program: &ShaderProgram,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
        wireframe: bool,
    ) -> Result<Self> {
        let vert_module =
            shader::create_shader_module(device, program.code(ShaderKind::Vertex), ShaderKind::Vertex)?;
        let frag_module = match shader::create_shader_module(
            device,
            program.code(ShaderKind::Fragment),
            ShaderKind::Fragment,
        ) {
            Ok(module) => module,
            Err(error) => {
                device.destroy_shader_module(vert_module, None);
                return Err(error.into());
            }
        };

        let result = Self::link(device, vert_module, frag_module, render_pass, extent, wireframe);

        // Modules are only needed while the pipeline is built.
        device.destroy_shader_module(vert_module, None);
        device.destroy_shader_module(frag_module, None);

        result
    }

    unsafe fn link(
        device: &Device,
        vert_module: vk::ShaderModule,
        frag_module: vk::ShaderModule,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
        wireframe: bool,
    ) -> Result<Self> {
        let vert_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(ShaderKind::Vertex.stage_flags())
            .module(vert_module)
            .name(b"main\0");
        let frag_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(ShaderKind::Fragment.stage_flags())
            .module(frag_module)
            .name(b"main\0");

        let binding_descriptions = &[buffer::binding_description()];
        let attribute_descriptions = buffer::attribute_descriptions();
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(binding_descriptions)
            .vertex_attribute_descriptions(&attribute_descriptions);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_FAN)
            .primitive_restart_enable(false);

        let viewport = vk::Viewport::builder()
            .x(0.0)
            .y(0.0)
            .width(extent.width as f32)
            .height(extent.height as f32)
            .min_depth(0.0)
            .max_depth(1.0);

        let scissor = vk::Rect2D::builder()
            .offset(vk::Offset2D { x: 0, y: 0 })
            .extent(extent);

        let viewports = &[viewport];
        let scissors = &[scissor];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(viewports)
            .scissors(scissors);

        let polygon_mode = if wireframe {
            vk::PolygonMode::LINE
        } else {
            vk::PolygonMode::FILL
        };
        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(polygon_mode)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::_1);

        let attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::all())
            .blend_enable(false);

        let attachments = &[attachment];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(attachments)
            .blend_constants([0.0, 0.0, 0.0, 0.0]);

        let layout_info = vk::PipelineLayoutCreateInfo::builder();
        let layout = device.create_pipeline_layout(&layout_info, None)?;

        let stages = &[vert_stage, frag_stage];
        let info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipeline = match device.create_graphics_pipelines(vk::PipelineCache::null(), &[info], None) {
            Ok((pipelines, _)) => pipelines[0],
            Err(error) => {
                device.destroy_pipeline_layout(layout, None);
                return Err(error.into());
            }
        };

        Ok(Self { pipeline, layout })
    }

    pub unsafe fn destroy(&mut self, device: &Device) {
        device.destroy_pipeline(self.pipeline, None);
        device.destroy_pipeline_layout(self.layout, None);
    }
}
