//! PLY loading on top of `ply-rs-bw`.
//!
//! Callers describe what they want as [`PropertyRequest`]s. Requests whose
//! element or properties are missing from the file come back as `None`
//! instead of failing the whole load; malformed input fails with
//! [`CoreError::Parse`] and no partial result.

use std::{
    fmt,
    fs::{self, File},
    io::{self, BufReader, Read},
    path::Path,
    time::Instant,
};

use corelib::{CoreError, CoreResult};
use ply_rs_bw::{
    parser::Parser,
    ply::{DefaultElement, Ply, Property, PropertyType},
};

use crate::mesh::{AttributeData, FaceIndexBuffer, MeshAttributeBuffer, MeshData};

/// Index-list property names seen in the wild.
pub const FACE_LIST_NAMES: [&str; 2] = ["vertex_indices", "vertex_index"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    /// All named scalar properties, converted to f32, `stride = names.len()`.
    Scalars,
    /// First present list property among the names, triangulated, `stride = 3`.
    IndexList,
}

/// One attribute group to pull out of a PLY element.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyRequest {
    /// Name given to the resulting buffer.
    pub name: String,
    pub element: String,
    pub properties: Vec<String>,
    pub kind: RequestKind,
}

impl PropertyRequest {
    pub fn scalars(name: &str, element: &str, properties: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            element: element.to_string(),
            properties: properties.iter().map(|p| p.to_string()).collect(),
            kind: RequestKind::Scalars,
        }
    }

    pub fn index_list(name: &str, element: &str, candidates: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            element: element.to_string(),
            properties: candidates.iter().map(|p| p.to_string()).collect(),
            kind: RequestKind::IndexList,
        }
    }

    pub fn positions() -> Self {
        Self::scalars("position", "vertex", &["x", "y", "z"])
    }

    pub fn normals() -> Self {
        Self::scalars("normal", "vertex", &["nx", "ny", "nz"])
    }

    pub fn faces() -> Self {
        Self::index_list("face", "face", &FACE_LIST_NAMES)
    }
}

/// How the file is fed to the parser. Both paths give identical results;
/// preloading is usually faster for files that fit in memory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub preload: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertySummary {
    pub name: String,
    pub data_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementSummary {
    pub name: String,
    pub count: usize,
    pub properties: Vec<PropertySummary>,
}

/// What the header declared, for diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlyHeaderSummary {
    pub encoding: String,
    pub comments: Vec<String>,
    pub elements: Vec<ElementSummary>,
}

impl PlyHeaderSummary {
    fn from_ply(ply: &Ply<DefaultElement>) -> Self {
        let elements = ply
            .header
            .elements
            .values()
            .map(|e| ElementSummary {
                name: e.name.clone(),
                count: e.count,
                properties: e
                    .properties
                    .values()
                    .map(|p| PropertySummary {
                        name: p.name.clone(),
                        data_type: type_name(&p.data_type),
                    })
                    .collect(),
            })
            .collect();

        Self {
            encoding: format!("{:?}", ply.header.encoding),
            comments: ply.header.comments.clone(),
            elements,
        }
    }

    pub fn element(&self, name: &str) -> Option<&ElementSummary> {
        self.elements.iter().find(|e| e.name == name)
    }

    pub fn log(&self) {
        log::info!("PLY header ({})", self.encoding);
        for c in &self.comments {
            log::info!("  comment: {}", c);
        }
        for e in &self.elements {
            log::info!("  element {} ({})", e.name, e.count);
            for p in &e.properties {
                log::info!("    property {} ({})", p.name, p.data_type);
            }
        }
    }
}

impl fmt::Display for PlyHeaderSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .elements
            .iter()
            .map(|e| format!("{}({})", e.name, e.count))
            .collect();
        write!(f, "{} [{}]", self.encoding, parts.join(", "))
    }
}

fn type_name(t: &PropertyType) -> String {
    match t {
        PropertyType::Scalar(s) => format!("{s:?}").to_lowercase(),
        PropertyType::List(count, item) => {
            format!("list {:?} {:?}", count, item).to_lowercase()
        }
    }
}

/// Parsed header plus one slot per request, in request order.
#[derive(Clone, Debug)]
pub struct PlyReadout {
    pub header: PlyHeaderSummary,
    buffers: Vec<Option<MeshAttributeBuffer>>,
}

impl PlyReadout {
    pub fn get(&self, request: usize) -> Option<&MeshAttributeBuffer> {
        self.buffers.get(request).and_then(Option::as_ref)
    }

    pub fn take(&mut self, request: usize) -> Option<MeshAttributeBuffer> {
        self.buffers.get_mut(request).and_then(Option::take)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

/// Parse a PLY stream and extract `requests`.
pub fn read_ply<R: Read>(reader: &mut R, requests: &[PropertyRequest]) -> CoreResult<PlyReadout> {
    let parser = Parser::<DefaultElement>::new();
    let started = Instant::now();
    let ply = parser
        .read_ply(reader)
        .map_err(|e| CoreError::parse(format!("invalid PLY data: {e}")))?;
    log::info!("Parsed PLY in {:.2?}", started.elapsed());

    let header = PlyHeaderSummary::from_ply(&ply);
    let buffers = requests
        .iter()
        .map(|r| extract(&ply, r))
        .collect::<CoreResult<Vec<_>>>()?;

    Ok(PlyReadout { header, buffers })
}

/// Open `path` (streamed or preloaded) and extract `requests`.
pub fn read_ply_from_path(
    path: impl AsRef<Path>,
    requests: &[PropertyRequest],
    options: LoadOptions,
) -> CoreResult<PlyReadout> {
    let path = path.as_ref();
    let open_err = |source: io::Error| CoreError::FileOpen {
        path: path.to_path_buf(),
        source,
    };

    if options.preload {
        let bytes = fs::read(path).map_err(open_err)?;
        log::debug!("Preloaded {} bytes from {}", bytes.len(), path.display());
        read_ply(&mut io::Cursor::new(bytes), requests)
    } else {
        let file = File::open(path).map_err(open_err)?;
        read_ply(&mut BufReader::new(file), requests)
    }
}

/// Load positions (+ optional normals) and triangles from a PLY file.
pub fn load_mesh_from_path(path: impl AsRef<Path>, options: LoadOptions) -> CoreResult<MeshData> {
    let path = path.as_ref();
    log::info!("Loading PLY mesh from {}", path.display());
    let readout = read_ply_from_path(path, &mesh_requests(), options)?;
    mesh_from_readout(readout)
}

/// Same as [`load_mesh_from_path`] for an in-memory or custom stream.
pub fn load_mesh_from_reader<R: Read>(reader: &mut R) -> CoreResult<MeshData> {
    let readout = read_ply(reader, &mesh_requests())?;
    mesh_from_readout(readout)
}

fn mesh_requests() -> [PropertyRequest; 3] {
    [
        PropertyRequest::positions(),
        PropertyRequest::normals(),
        PropertyRequest::faces(),
    ]
}

fn mesh_from_readout(mut readout: PlyReadout) -> CoreResult<MeshData> {
    readout.header.log();

    let positions = required_f32(readout.take(0), "vertex positions (x, y, z)")?;
    let normals = readout
        .take(1)
        .and_then(|b| match b.data {
            AttributeData::F32(v) => Some(v),
            AttributeData::U32(_) => None,
        });
    let indices = match readout.take(2).map(|b| b.data) {
        Some(AttributeData::U32(v)) if !v.is_empty() => v,
        _ => return Err(CoreError::parse("missing or empty face index list")),
    };

    log::info!("Read {} vertices", positions.len() / 3);
    match &normals {
        Some(n) => log::info!("Read {} vertex normals", n.len() / 3),
        None => log::info!("No vertex normals in file"),
    }
    log::info!("Read {} faces (triangles)", indices.len() / 3);

    let mesh = MeshData {
        positions,
        normals,
        faces: FaceIndexBuffer::new(indices),
        header: Some(readout.header),
    };
    mesh.validate()?;
    Ok(mesh)
}

fn required_f32(buf: Option<MeshAttributeBuffer>, what: &str) -> CoreResult<Vec<f32>> {
    match buf.map(|b| b.data) {
        Some(AttributeData::F32(v)) if !v.is_empty() => Ok(v),
        _ => Err(CoreError::parse(format!("missing or empty {what}"))),
    }
}

fn extract(
    ply: &Ply<DefaultElement>,
    request: &PropertyRequest,
) -> CoreResult<Option<MeshAttributeBuffer>> {
    let Some(def) = ply.header.elements.get(&request.element) else {
        log::warn!(
            "Requested element '{}' not in file; '{}' will be absent",
            request.element,
            request.name
        );
        return Ok(None);
    };
    let empty = Vec::new();
    let items = ply.payload.get(&request.element).unwrap_or(&empty);

    match request.kind {
        RequestKind::Scalars => {
            let missing: Vec<&str> = request
                .properties
                .iter()
                .filter(|p| !def.properties.contains_key(p.as_str()))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                log::warn!(
                    "Element '{}' lacks properties {:?}; '{}' will be absent",
                    request.element,
                    missing,
                    request.name
                );
                return Ok(None);
            }

            let stride = request.properties.len();
            let mut data = Vec::with_capacity(items.len() * stride);
            for (i, item) in items.iter().enumerate() {
                for name in &request.properties {
                    let value = item.get(name.as_str()).and_then(scalar_as_f32).ok_or_else(|| {
                        CoreError::parse(format!(
                            "{} #{}: property '{}' is missing or not a scalar",
                            request.element, i, name
                        ))
                    })?;
                    data.push(value);
                }
            }
            Ok(Some(MeshAttributeBuffer::new(
                request.name.as_str(),
                stride,
                AttributeData::F32(data),
            )))
        }
        RequestKind::IndexList => {
            let Some(list_name) = request
                .properties
                .iter()
                .find(|p| def.properties.contains_key(p.as_str()))
            else {
                log::warn!(
                    "Element '{}' has none of {:?}; '{}' will be absent",
                    request.element,
                    request.properties,
                    request.name
                );
                return Ok(None);
            };

            let mut data = Vec::with_capacity(items.len() * 3);
            for (i, item) in items.iter().enumerate() {
                let polygon = item
                    .get(list_name.as_str())
                    .ok_or_else(|| {
                        CoreError::parse(format!(
                            "{} #{}: property '{}' is missing",
                            request.element, i, list_name
                        ))
                    })
                    .and_then(|p| list_as_u32(p, i))?;
                triangulate(&polygon, i, &mut data)?;
            }
            Ok(Some(MeshAttributeBuffer::new(
                request.name.as_str(),
                3,
                AttributeData::U32(data),
            )))
        }
    }
}

fn scalar_as_f32(p: &Property) -> Option<f32> {
    Some(match *p {
        Property::Char(v) => v as f32,
        Property::UChar(v) => v as f32,
        Property::Short(v) => v as f32,
        Property::UShort(v) => v as f32,
        Property::Int(v) => v as f32,
        Property::UInt(v) => v as f32,
        Property::Float(v) => v,
        Property::Double(v) => v as f32,
        _ => return None,
    })
}

fn list_as_u32(p: &Property, face: usize) -> CoreResult<Vec<u32>> {
    fn convert<T: Copy + TryInto<u32>>(values: &[T], face: usize) -> CoreResult<Vec<u32>> {
        values
            .iter()
            .map(|&v| {
                v.try_into().map_err(|_| {
                    CoreError::parse(format!("face {face}: index is negative or too large"))
                })
            })
            .collect()
    }

    match p {
        Property::ListChar(v) => convert(v, face),
        Property::ListUChar(v) => convert(v, face),
        Property::ListShort(v) => convert(v, face),
        Property::ListUShort(v) => convert(v, face),
        Property::ListInt(v) => convert(v, face),
        Property::ListUInt(v) => Ok(v.clone()),
        _ => Err(CoreError::parse(format!(
            "face {face}: index property is not an integer list"
        ))),
    }
}

/// Triangles pass through; larger polygons become a fan around their first vertex.
fn triangulate(polygon: &[u32], face: usize, out: &mut Vec<u32>) -> CoreResult<()> {
    if polygon.len() < 3 {
        return Err(CoreError::parse(format!(
            "face {face} has {} indices, at least 3 are required",
            polygon.len()
        )));
    }
    for i in 1..polygon.len() - 1 {
        out.extend_from_slice(&[polygon[0], polygon[i], polygon[i + 1]]);
    }
    Ok(())
}
