//! PLY export of [`MeshData`] (positions, optional normals, triangles).
//!
//! ASCII goes through the `ply-rs-bw` writer. Binary bodies are encoded here:
//! that writer emits the element count instead of the list length as the
//! prefix of each binary list.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use corelib::{CoreError, CoreResult};
use ply_rs_bw::{
    ply::{
        Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
        ScalarType,
    },
    writer::Writer,
};

use crate::mesh::MeshData;

/// Write `mesh` to `out`, returning the number of bytes written.
pub fn write_ply<W: Write>(mesh: &MeshData, out: &mut W, encoding: Encoding) -> CoreResult<usize> {
    mesh.validate()?;
    let written = match encoding {
        Encoding::Ascii => {
            let mut ply = build_ply(mesh, encoding);
            Writer::<DefaultElement>::new().write_ply(out, &mut ply)
        }
        Encoding::BinaryLittleEndian => write_binary(mesh, out, false),
        Encoding::BinaryBigEndian => write_binary(mesh, out, true),
    };
    written.map_err(|e| CoreError::Write(e.to_string()))
}

pub fn write_ply_to_path(
    mesh: &MeshData,
    path: impl AsRef<Path>,
    encoding: Encoding,
) -> CoreResult<usize> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| {
        CoreError::Write(format!("cannot create {}: {e}", path.display()))
    })?;
    let mut out = BufWriter::new(file);
    let written = write_ply(mesh, &mut out, encoding)?;
    out.flush()
        .map_err(|e| CoreError::Write(format!("cannot flush {}: {e}", path.display())))?;
    log::info!("Wrote {} bytes to {}", written, path.display());
    Ok(written)
}

/// Write `mesh` as `<prefix>-ascii.ply` and `<prefix>-binary.ply`.
pub fn write_sample_pair(mesh: &MeshData, prefix: &str) -> CoreResult<[PathBuf; 2]> {
    let ascii = PathBuf::from(format!("{prefix}-ascii.ply"));
    let binary = PathBuf::from(format!("{prefix}-binary.ply"));
    write_ply_to_path(mesh, &ascii, Encoding::Ascii)?;
    write_ply_to_path(mesh, &binary, Encoding::BinaryLittleEndian)?;
    Ok([ascii, binary])
}

fn comment() -> String {
    format!("generated by plyview {}", env!("CARGO_PKG_VERSION"))
}

fn vertex_property_names(mesh: &MeshData) -> Vec<&'static str> {
    let mut names = vec!["x", "y", "z"];
    if mesh.normals.is_some() {
        names.extend(["nx", "ny", "nz"]);
    }
    names
}

/// Header and body for `binary_{little,big}_endian`; face lists are
/// `uchar` length + `uint` indices.
fn write_binary<W: Write>(mesh: &MeshData, out: &mut W, big_endian: bool) -> io::Result<usize> {
    let names = vertex_property_names(mesh);
    let format = if big_endian {
        "binary_big_endian"
    } else {
        "binary_little_endian"
    };

    let mut header = format!("ply\nformat {format} 1.0\ncomment {}\n", comment());
    header.push_str(&format!("element vertex {}\n", mesh.vertex_count()));
    for name in &names {
        header.push_str(&format!("property float {name}\n"));
    }
    header.push_str(&format!("element face {}\n", mesh.triangle_count()));
    header.push_str("property list uchar uint vertex_indices\nend_header\n");

    let body_len = mesh.vertex_count() * names.len() * 4 + mesh.triangle_count() * 13;
    let mut bytes = Vec::with_capacity(header.len() + body_len);
    bytes.extend_from_slice(header.as_bytes());

    let f32_bytes = |v: f32| if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
    let u32_bytes = |v: u32| if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };

    for i in 0..mesh.vertex_count() {
        for &v in &mesh.positions[i * 3..i * 3 + 3] {
            bytes.extend_from_slice(&f32_bytes(v));
        }
        if let Some(normals) = &mesh.normals {
            for &v in &normals[i * 3..i * 3 + 3] {
                bytes.extend_from_slice(&f32_bytes(v));
            }
        }
    }
    for tri in mesh.faces.indices.chunks_exact(3) {
        bytes.push(3);
        for &index in tri {
            bytes.extend_from_slice(&u32_bytes(index));
        }
    }

    out.write_all(&bytes)?;
    Ok(bytes.len())
}

fn build_ply(mesh: &MeshData, encoding: Encoding) -> Ply<DefaultElement> {
    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = encoding;
    ply.header.comments.push(comment());

    let float = || PropertyType::Scalar(ScalarType::Float);
    let mut vertex = ElementDef::new("vertex".to_string());
    let names = vertex_property_names(mesh);
    for name in &names {
        vertex.properties.add(PropertyDef::new(name.to_string(), float()));
    }
    vertex.count = mesh.vertex_count();
    ply.header.elements.add(vertex);

    let mut face = ElementDef::new("face".to_string());
    face.properties.add(PropertyDef::new(
        "vertex_indices".to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::UInt),
    ));
    face.count = mesh.triangle_count();
    ply.header.elements.add(face);

    let vertices = (0..mesh.vertex_count())
        .map(|i| {
            let mut element = DefaultElement::new();
            let p = &mesh.positions[i * 3..i * 3 + 3];
            let n = mesh.normals.as_ref().map(|n| &n[i * 3..i * 3 + 3]);
            let values = p.iter().chain(n.into_iter().flatten());
            for (name, &value) in names.iter().zip(values) {
                element.insert(name.to_string(), Property::Float(value));
            }
            element
        })
        .collect();

    let faces = mesh
        .faces
        .indices
        .chunks_exact(3)
        .map(|tri| {
            let mut element = DefaultElement::new();
            element.insert(
                "vertex_indices".to_string(),
                Property::ListUInt(tri.to_vec()),
            );
            element
        })
        .collect();

    ply.payload.insert("vertex".to_string(), vertices);
    ply.payload.insert("face".to_string(), faces);
    ply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ply::load_mesh_from_reader;
    use std::io::Cursor;

    #[test]
    fn ascii_output_has_expected_header() {
        let mut buf = Vec::new();
        write_ply(&MeshData::cube(), &mut buf, Encoding::Ascii).expect("write");
        let text = String::from_utf8(buf).expect("ascii output is utf-8");
        assert!(text.starts_with("ply\n"));
        assert!(text.contains("element vertex 24"));
        assert!(text.contains("property float nx"));
        assert!(text.contains("element face 12"));
        assert!(text.contains("property list uchar uint vertex_indices"));
    }

    #[test]
    fn positions_only_mesh_has_no_normals() {
        let mesh = MeshData::new(
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            None,
            vec![0, 1, 2],
        );
        let mut buf = Vec::new();
        write_ply(&mesh, &mut buf, Encoding::BinaryBigEndian).expect("write");
        let back = load_mesh_from_reader(&mut Cursor::new(buf)).expect("read back");
        assert!(back.normals.is_none());
        assert_eq!(back.positions, mesh.positions);
        assert_eq!(back.faces, mesh.faces);
    }

    #[test]
    fn binary_face_lists_carry_their_own_length() {
        let mesh = MeshData::new(
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0],
            None,
            vec![0, 1, 2, 1, 3, 2],
        );
        let mut buf = Vec::new();
        let written = write_ply(&mesh, &mut buf, Encoding::BinaryLittleEndian).expect("write");
        assert_eq!(written, buf.len());

        let body = &buf[buf.len() - 2 * 13..];
        assert_eq!(body[0], 3);
        assert_eq!(&body[1..5], &0u32.to_le_bytes());
        assert_eq!(body[13], 3);
        assert_eq!(&body[14..18], &1u32.to_le_bytes());

        let back = load_mesh_from_reader(&mut Cursor::new(buf)).expect("read back");
        assert_eq!(back.positions, mesh.positions);
        assert_eq!(back.faces, mesh.faces);
    }

    #[test]
    fn binary_header_names_the_byte_order() {
        for (encoding, format) in [
            (Encoding::BinaryLittleEndian, "format binary_little_endian 1.0"),
            (Encoding::BinaryBigEndian, "format binary_big_endian 1.0"),
        ] {
            let mut buf = Vec::new();
            write_ply(&MeshData::cube(), &mut buf, encoding).expect("write");
            let end = buf
                .windows(11)
                .position(|w| w == b"end_header\n")
                .expect("header terminator");
            let header = std::str::from_utf8(&buf[..end]).expect("header is text");
            assert!(header.starts_with("ply\n"));
            assert!(header.contains(format));
            assert!(header.contains("element vertex 24"));
            assert!(header.contains("property float nz"));
            assert!(header.contains("element face 12"));
        }
    }

    #[test]
    fn invalid_mesh_is_not_written() {
        let mesh = MeshData::new(vec![0.0; 9], None, vec![0, 1, 5]);
        let mut buf = Vec::new();
        let err = write_ply(&mesh, &mut buf, Encoding::Ascii).unwrap_err();
        assert!(matches!(err, CoreError::IndexOutOfRange { .. }));
        assert!(buf.is_empty());
    }
}
