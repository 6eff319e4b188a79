use super::context::Context;
use crate::star::{StarMesh, Vertex};
use anyhow::Result;
use std::mem::size_of;
use std::ptr::copy_nonoverlapping as memcpy;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk;

/// GPU copy of the star, uploaded once.
pub struct VertexBuffer {
    pub buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    vertex_count: u32,
}

impl VertexBuffer {
    pub fn empty() -> Self {
        Self {
            buffer: vk::Buffer::null(),
            memory: vk::DeviceMemory::null(),
            vertex_count: 0,
        }
    }

    /// Copies `mesh` into host-visible memory. The host-side mesh is dropped
    /// on return.
    pub unsafe fn upload(context: &Context, mesh: StarMesh) -> Result<Self> {
        let device = &context.device;
        let bytes = mesh.as_bytes();
        let size = bytes.len() as vk::DeviceSize;

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(vk::BufferUsageFlags::VERTEX_BUFFER)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = device.create_buffer(&buffer_info, None)?;

        let requirements = device.get_buffer_memory_requirements(buffer);
        let memory_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(context.memory_type_index(
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                requirements,
            )?);
        let memory = device.allocate_memory(&memory_info, None)?;
        device.bind_buffer_memory(buffer, memory, 0)?;

        let dst = device.map_memory(memory, 0, size, vk::MemoryMapFlags::empty())?;
        memcpy(bytes.as_ptr(), dst.cast::<u8>(), bytes.len());
        device.unmap_memory(memory);

        let vertex_count = mesh.vertex_count() as u32;
        tracing::debug!("Uploaded {} star vertices ({} bytes).", vertex_count, size);

        Ok(Self {
            buffer,
            memory,
            vertex_count,
        })
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub unsafe fn destroy(&mut self, device: &Device) {
        device.destroy_buffer(self.buffer, None);
        device.free_memory(self.memory, None);
    }
}

/// Binding 0, one tightly packed `vec3` per vertex.
pub fn binding_description() -> vk::VertexInputBindingDescription {
    vk::VertexInputBindingDescription::builder()
        .binding(0)
        .stride(size_of::<Vertex>() as u32)
        .input_rate(vk::VertexInputRate::VERTEX)
        .build()
}

pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 1] {
    let position = vk::VertexInputAttributeDescription::builder()
        .binding(0)
        .location(0)
        .format(vk::Format::R32G32B32_SFLOAT)
        .offset(0)
        .build();
    [position]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_three_packed_floats() {
        let binding = binding_description();
        assert_eq!(binding.stride, 12);
        assert_eq!(binding.binding, 0);

        let [position] = attribute_descriptions();
        assert_eq!(position.location, 0);
        assert_eq!(position.offset, 0);
        assert_eq!(position.format, vk::Format::R32G32B32_SFLOAT);
    }
}
