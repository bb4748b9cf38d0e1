//! CPU-side mesh buffers produced by the loaders.

use corelib::{BoundingBox, CoreError, CoreResult};

use crate::ply::PlyHeaderSummary;

/// Flat element data of a [`MeshAttributeBuffer`].
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeData {
    F32(Vec<f32>),
    U32(Vec<u32>),
}

impl AttributeData {
    pub fn len(&self) -> usize {
        match self {
            AttributeData::F32(v) => v.len(),
            AttributeData::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Named, typed, flat buffer with `stride` components per element.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshAttributeBuffer {
    pub name: String,
    pub stride: usize,
    pub data: AttributeData,
}

impl MeshAttributeBuffer {
    pub fn new(name: impl Into<String>, stride: usize, data: AttributeData) -> Self {
        Self {
            name: name.into(),
            stride,
            data,
        }
    }

    /// Number of elements (not components).
    pub fn count(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.data.len() / self.stride
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            AttributeData::F32(v) => Some(v),
            AttributeData::U32(_) => None,
        }
    }

    pub fn as_u32(&self) -> Option<&[u32]> {
        match &self.data {
            AttributeData::U32(v) => Some(v),
            AttributeData::F32(_) => None,
        }
    }
}

/// Triangle list indices, three per triangle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaceIndexBuffer {
    pub indices: Vec<u32>,
}

impl FaceIndexBuffer {
    pub fn new(indices: Vec<u32>) -> Self {
        Self { indices }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Every index must address one of `vertex_count` vertices.
    pub fn validate(&self, vertex_count: usize) -> CoreResult<()> {
        if self.indices.len() % 3 != 0 {
            return Err(CoreError::parse(format!(
                "index buffer length {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        for (i, &index) in self.indices.iter().enumerate() {
            if index as usize >= vertex_count {
                return Err(CoreError::IndexOutOfRange {
                    face: i / 3,
                    index,
                    vertex_count,
                });
            }
        }
        Ok(())
    }
}

/// Indexed triangle mesh: xyz positions, optional xyz normals, triangles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<f32>,
    pub normals: Option<Vec<f32>>,
    pub faces: FaceIndexBuffer,
    /// Header of the file this mesh came from, if any.
    pub header: Option<PlyHeaderSummary>,
}

impl MeshData {
    pub fn new(positions: Vec<f32>, normals: Option<Vec<f32>>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            normals,
            faces: FaceIndexBuffer::new(indices),
            header: None,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.faces.triangle_count()
    }

    /// Returns `true` if both vertex and index buffers are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.positions.is_empty() && !self.faces.is_empty()
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_positions(&self.positions)
    }

    /// Check buffer shapes and face indices.
    pub fn validate(&self) -> CoreResult<()> {
        if self.positions.len() % 3 != 0 {
            return Err(CoreError::parse("position buffer is not a multiple of 3"));
        }
        if let Some(normals) = &self.normals {
            if normals.len() != self.positions.len() {
                return Err(CoreError::parse(format!(
                    "normal count {} does not match vertex count {}",
                    normals.len() / 3,
                    self.vertex_count()
                )));
            }
        }
        self.faces.validate(self.vertex_count())
    }

    /// 24-vertex cube spanning [-1, 1] with per-face normals, 12 triangles.
    pub fn cube() -> Self {
        // (normal, tangent u, tangent v) for each face; corners are n ± u ± v.
        const FACES: [[[f32; 3]; 3]; 6] = [
            [[-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]],
            [[1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]],
            [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            [[0.0, 1.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            [[0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]],
            [[0.0, 0.0, 1.0], [0.0, -1.0, 0.0], [1.0, 0.0, 0.0]],
        ];

        let mut positions = Vec::with_capacity(24 * 3);
        let mut normals = Vec::with_capacity(24 * 3);
        let mut indices = Vec::with_capacity(36);

        for (f, [n, u, v]) in FACES.iter().enumerate() {
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                for axis in 0..3 {
                    positions.push(n[axis] + su * u[axis] + sv * v[axis]);
                }
                normals.extend_from_slice(n);
            }
            let base = (f * 4) as u32;
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new(positions, Some(normals), indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_data_validity() {
        let data = MeshData::new(vec![0.0; 9], None, vec![0, 1, 2]);
        assert!(data.is_valid());
        assert!(data.validate().is_ok());
        assert!(!MeshData::default().is_valid());
    }

    #[test]
    fn attribute_count_uses_stride() {
        let buf = MeshAttributeBuffer::new("position", 3, AttributeData::F32(vec![0.0; 12]));
        assert_eq!(buf.count(), 4);
        assert!(buf.as_u32().is_none());
        assert_eq!(buf.as_f32().map(|v| v.len()), Some(12));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let data = MeshData::new(vec![0.0; 9], None, vec![0, 1, 3]);
        match data.validate() {
            Err(CoreError::IndexOutOfRange {
                face,
                index,
                vertex_count,
            }) => {
                assert_eq!((face, index, vertex_count), (0, 3, 3));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn mismatched_normals_are_rejected() {
        let data = MeshData::new(vec![0.0; 9], Some(vec![0.0; 6]), vec![0, 1, 2]);
        assert!(matches!(data.validate(), Err(CoreError::Parse(_))));
    }

    #[test]
    fn cube_geometry() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.triangle_count(), 12);
        assert!(cube.validate().is_ok());

        let bb = cube.bounds();
        assert_eq!(bb.min.to_array(), [-1.0, -1.0, -1.0]);
        assert_eq!(bb.max.to_array(), [1.0, 1.0, 1.0]);

        // Every corner lies on the face its normal points to.
        let normals = cube.normals.as_ref().unwrap();
        for (p, n) in cube.positions.chunks(3).zip(normals.chunks(3)) {
            let dot: f32 = p.iter().zip(n).map(|(a, b)| a * b).sum();
            assert_eq!(dot, 1.0);
        }
    }
}
