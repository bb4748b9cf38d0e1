//! Asset loading (meshes).
//! PLY reader with request-and-check attribute extraction, plus a PLY writer
//! for exporting meshes and the built-in sample cube.

pub mod export;
pub mod mesh;
pub mod ply;

pub use export::{write_ply, write_ply_to_path, write_sample_pair};
pub use mesh::{AttributeData, FaceIndexBuffer, MeshAttributeBuffer, MeshData};
pub use ply::{
    LoadOptions, PlyHeaderSummary, PlyReadout, PropertyRequest, load_mesh_from_path,
    load_mesh_from_reader, read_ply, read_ply_from_path,
};
pub use ply_rs_bw::ply::Encoding;
