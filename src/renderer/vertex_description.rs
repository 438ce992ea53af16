use ash::vk;

/// How a vertex type is laid out in the vertex buffer, for pipeline vertex input state
pub trait VertexDescription: super::GPUWrite {
    fn binding_descriptions() -> Vec<vk::VertexInputBindingDescription>;
    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription>;
}
