use std::fmt;
use std::mem::size_of;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use crate::gpu::{BufferTarget, RenderContext};

const FLOAT_BYTES: u32 = size_of::<f32>() as u32;

/// One float attribute read from interleaved vertex data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexAttribute {
    /// Shader `layout (location = N)` slot.
    pub slot: u32,
    /// Number of floats (1-4).
    pub components: u32,
    pub stride_bytes: u32,
    pub offset_bytes: u32,
}

impl VertexAttribute {
    pub fn new(slot: u32, components: u32, stride_bytes: u32, offset_bytes: u32) -> Self {
        Self {
            slot,
            components,
            stride_bytes,
            offset_bytes,
        }
    }

    fn end_bytes(&self) -> u32 {
        self.offset_bytes + self.components * FLOAT_BYTES
    }
}

/// Ordered attribute descriptions for one vertex buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    pub fn new(attributes: Vec<VertexAttribute>) -> Self {
        Self { attributes }
    }

    /// Tightly packed f32 attributes in consecutive slots starting at 0.
    ///
    /// `interleaved(&[3, 3, 2])` describes position, normal, uv with a
    /// 32-byte stride.
    pub fn interleaved(components: &[u32]) -> Self {
        let stride = components.iter().sum::<u32>() * FLOAT_BYTES;
        let mut offset = 0;
        let attributes = components
            .iter()
            .zip(0u32..)
            .map(|(&count, slot)| {
                let attribute = VertexAttribute::new(slot, count, stride, offset);
                offset += count * FLOAT_BYTES;
                attribute
            })
            .collect();
        Self { attributes }
    }

    /// Appends an attribute, keeping builder-style chaining.
    pub fn with(mut self, attribute: VertexAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Checks that `vertex_bytes` splits into whole vertices for every
    /// attribute and that no attribute reaches past its stride.
    pub fn validate(&self, vertex_bytes: usize) -> Result<(), LayoutError> {
        if self.attributes.is_empty() {
            return Err(LayoutError::EmptyLayout);
        }
        for attribute in &self.attributes {
            if attribute.stride_bytes == 0 || vertex_bytes % attribute.stride_bytes as usize != 0 {
                return Err(LayoutError::StrideMismatch {
                    slot: attribute.slot,
                    len: vertex_bytes,
                    stride: attribute.stride_bytes,
                });
            }
            if attribute.end_bytes() > attribute.stride_bytes {
                return Err(LayoutError::AttributeOverflow {
                    slot: attribute.slot,
                    end: attribute.end_bytes(),
                    stride: attribute.stride_bytes,
                });
            }
        }
        Ok(())
    }
}

/// Objects created for one mesh.
///
/// No `Drop` impl: the host decides when the data is no longer needed and
/// calls [`MeshBuffers::release`]. The value is neither `Clone` nor `Copy`,
/// so the names can only be released once.
pub struct MeshBuffers<C: RenderContext> {
    pub vertex_array: C::VertexArray,
    pub vertex_buffer: C::Buffer,
    /// Present only for indexed meshes.
    pub index_buffer: Option<C::Buffer>,
}

impl<C: RenderContext> fmt::Debug for MeshBuffers<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshBuffers")
            .field("vertex_array", &self.vertex_array)
            .field("vertex_buffer", &self.vertex_buffer)
            .field("index_buffer", &self.index_buffer)
            .finish()
    }
}

impl<C: RenderContext> MeshBuffers<C> {
    /// Deletes the vertex array and its buffers together.
    ///
    /// ```compile_fail
    /// use glkit::{HeadlessContext, VertexLayout, VertexLayoutBuilder};
    ///
    /// let ctx = HeadlessContext::new();
    /// let mesh = VertexLayoutBuilder::new(&ctx)
    ///     .build_unindexed(&[0.0; 3], &VertexLayout::interleaved(&[3]))
    ///     .unwrap();
    /// mesh.release(&ctx);
    /// mesh.release(&ctx);
    /// ```
    pub fn release(self, ctx: &C) {
        ctx.delete_vertex_array(self.vertex_array);
        ctx.delete_buffer(self.vertex_buffer);
        if let Some(index_buffer) = self.index_buffer {
            ctx.delete_buffer(index_buffer);
        }
    }
}

/// Allocates and fills vertex arrays from raw float data.
///
/// Every build call creates fresh objects; nothing is cached.
pub struct VertexLayoutBuilder<'ctx, C: RenderContext> {
    ctx: &'ctx C,
    validate: bool,
}

impl<'ctx, C: RenderContext> VertexLayoutBuilder<'ctx, C> {
    pub fn new(ctx: &'ctx C) -> Self {
        Self {
            ctx,
            validate: false,
        }
    }

    /// Enables [`VertexLayout::validate`] before any object is allocated.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Uploads `vertices` and `indices` into a new vertex array with an
    /// element buffer.
    pub fn build_indexed(
        &self,
        vertices: &[f32],
        indices: &[u32],
        layout: &VertexLayout,
    ) -> Result<MeshBuffers<C>, LayoutError> {
        self.build(vertices, Some(indices), layout)
    }

    /// Uploads `vertices` into a new vertex array for `draw_arrays`.
    pub fn build_unindexed(
        &self,
        vertices: &[f32],
        layout: &VertexLayout,
    ) -> Result<MeshBuffers<C>, LayoutError> {
        self.build(vertices, None, layout)
    }

    fn build(
        &self,
        vertices: &[f32],
        indices: Option<&[u32]>,
        layout: &VertexLayout,
    ) -> Result<MeshBuffers<C>, LayoutError> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        if self.validate {
            layout.validate(vertex_bytes.len())?;
        }

        let ctx = self.ctx;
        let vertex_array = ctx.create_vertex_array()?;
        let vertex_buffer = match ctx.create_buffer() {
            Ok(buffer) => buffer,
            Err(err) => {
                ctx.delete_vertex_array(vertex_array);
                return Err(err.into());
            }
        };
        let index_buffer = match indices.map(|_| ctx.create_buffer()).transpose() {
            Ok(buffer) => buffer,
            Err(err) => {
                ctx.delete_buffer(vertex_buffer);
                ctx.delete_vertex_array(vertex_array);
                return Err(err.into());
            }
        };

        ctx.bind_vertex_array(Some(vertex_array));
        ctx.bind_buffer(BufferTarget::Array, Some(vertex_buffer));
        ctx.buffer_data(BufferTarget::Array, vertex_bytes);
        if let (Some(buffer), Some(indices)) = (index_buffer, indices) {
            ctx.bind_buffer(BufferTarget::ElementArray, Some(buffer));
            ctx.buffer_data(BufferTarget::ElementArray, bytemuck::cast_slice(indices));
        }
        for attribute in layout.attributes() {
            ctx.vertex_attrib_pointer(attribute);
            ctx.enable_vertex_attrib_array(attribute.slot);
        }
        ctx.bind_vertex_array(None);
        ctx.bind_buffer(BufferTarget::Array, None);

        debug!(
            "built vertex array with {} floats, {} indices, {} attributes",
            vertices.len(),
            indices.map_or(0, <[u32]>::len),
            layout.attributes().len()
        );

        Ok(MeshBuffers {
            vertex_array,
            vertex_buffer,
            index_buffer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessContext;

    const TRIANGLE: [f32; 15] = [
        // positions      // uv
        -0.5, -0.5, 0.0, 0.0, 0.0, //
        0.5, -0.5, 0.0, 1.0, 0.0, //
        0.0, 0.5, 0.0, 0.5, 1.0,
    ];

    #[test]
    fn interleaved_layout_computes_offsets() {
        let layout = VertexLayout::interleaved(&[3, 3, 2]);
        assert_eq!(
            layout.attributes(),
            &[
                VertexAttribute::new(0, 3, 32, 0),
                VertexAttribute::new(1, 3, 32, 12),
                VertexAttribute::new(2, 2, 32, 24),
            ]
        );
    }

    #[test]
    fn indexed_build_uploads_and_configures_slots() {
        let ctx = HeadlessContext::new();
        let layout = VertexLayout::interleaved(&[3, 2]);
        let mesh = VertexLayoutBuilder::new(&ctx)
            .build_indexed(&TRIANGLE, &[0, 1, 2], &layout)
            .unwrap();

        let index_buffer = mesh.index_buffer.unwrap();
        assert_eq!(ctx.element_buffer(mesh.vertex_array), Some(index_buffer));
        assert_eq!(ctx.vertex_attributes(mesh.vertex_array), layout.attributes());
        assert_eq!(ctx.attribute_buffer(mesh.vertex_array, 1), Some(mesh.vertex_buffer));
        assert_eq!(
            ctx.buffer_contents(mesh.vertex_buffer).unwrap(),
            bytemuck::cast_slice::<f32, u8>(&TRIANGLE)
        );
        assert_eq!(ctx.buffer_contents(index_buffer).unwrap().len(), 12);
        assert_eq!(ctx.bound_vertex_array(), None);
    }

    #[test]
    fn unindexed_build_has_no_element_buffer() {
        let ctx = HeadlessContext::new();
        let mesh = VertexLayoutBuilder::new(&ctx)
            .build_unindexed(&TRIANGLE, &VertexLayout::interleaved(&[3, 2]))
            .unwrap();
        assert!(mesh.index_buffer.is_none());
        assert_eq!(ctx.element_buffer(mesh.vertex_array), None);
        assert_eq!(ctx.live_objects().buffers, 1);
    }

    #[test]
    fn every_build_allocates_new_objects() {
        let ctx = HeadlessContext::new();
        let builder = VertexLayoutBuilder::new(&ctx);
        let layout = VertexLayout::interleaved(&[3, 2]);
        let first = builder.build_unindexed(&TRIANGLE, &layout).unwrap();
        let second = builder.build_unindexed(&TRIANGLE, &layout).unwrap();
        assert_ne!(first.vertex_array, second.vertex_array);
        assert_ne!(first.vertex_buffer, second.vertex_buffer);

        first.release(&ctx);
        assert_eq!(ctx.live_objects().vertex_arrays, 1);
        assert_eq!(ctx.live_objects().buffers, 1);
        second.release(&ctx);
        assert_eq!(ctx.live_objects().total(), 0);
    }

    #[test]
    fn release_deletes_index_buffer_too() {
        let ctx = HeadlessContext::new();
        let mesh = VertexLayoutBuilder::new(&ctx)
            .build_indexed(&TRIANGLE, &[0, 1, 2], &VertexLayout::interleaved(&[3, 2]))
            .unwrap();
        assert_eq!(ctx.live_objects().buffers, 2);
        mesh.release(&ctx);
        assert_eq!(ctx.live_objects().total(), 0);
    }

    #[test]
    fn mismatched_layout_is_accepted_without_validation() {
        let ctx = HeadlessContext::new();
        let layout = VertexLayout::interleaved(&[3, 3, 2]);
        let mesh = VertexLayoutBuilder::new(&ctx).build_unindexed(&TRIANGLE, &layout);
        assert!(mesh.is_ok());
    }

    #[test]
    fn validation_rejects_mismatches_before_allocating() {
        let ctx = HeadlessContext::new();
        let builder = VertexLayoutBuilder::new(&ctx).with_validation(true);

        let err = builder
            .build_unindexed(&TRIANGLE, &VertexLayout::interleaved(&[3, 3, 2]))
            .unwrap_err();
        assert!(matches!(err, LayoutError::StrideMismatch { slot: 0, len: 60, stride: 32 }));

        let overflowing = VertexLayout::default().with(VertexAttribute::new(0, 4, 20, 8));
        let err = builder.build_unindexed(&TRIANGLE, &overflowing).unwrap_err();
        assert!(matches!(err, LayoutError::AttributeOverflow { end: 24, .. }));

        let err = builder.build_unindexed(&TRIANGLE, &VertexLayout::default()).unwrap_err();
        assert!(matches!(err, LayoutError::EmptyLayout));
        assert_eq!(ctx.live_objects().total(), 0);
    }
}
