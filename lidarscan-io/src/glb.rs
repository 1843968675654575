//! Binary glTF 2.0 (GLB) writer
//!
//! Writes a single-node scene with one triangle primitive. Positions,
//! optional normals and colors are stored as float attributes, indices as
//! `u32`. All chunks are little-endian and padded to four bytes.

use crate::format::ModelFormat;
use crate::registry::ModelWriter;
use byteorder::{LittleEndian, WriteBytesExt};
use lidarscan_core::{Bounded, Error, Result, TriangleMesh};
use serde_json::json;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const GLB_MAGIC: u32 = 0x4654_6C67;
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const COMPONENT_FLOAT: u32 = 5126;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;
const MODE_TRIANGLES: u32 = 4;

pub struct GlbWriter;

impl ModelWriter for GlbWriter {
    fn write_model(&self, mesh: &TriangleMesh, path: &Path) -> Result<()> {
        let bytes = encode_glb(mesh)?;
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    fn format(&self) -> ModelFormat {
        ModelFormat::Glb
    }
}

/// Binary payload under construction: views are appended 4-byte aligned
struct BinBuffer {
    data: Vec<u8>,
    views: Vec<serde_json::Value>,
}

impl BinBuffer {
    fn new() -> Self {
        Self { data: Vec::new(), views: Vec::new() }
    }

    fn push_floats(&mut self, values: impl Iterator<Item = f32>, target: u32) -> Result<usize> {
        let offset = self.data.len();
        for v in values {
            self.data.write_f32::<LittleEndian>(v)?;
        }
        Ok(self.finish_view(offset, target))
    }

    fn push_indices(&mut self, values: impl Iterator<Item = u32>) -> Result<usize> {
        let offset = self.data.len();
        for v in values {
            self.data.write_u32::<LittleEndian>(v)?;
        }
        Ok(self.finish_view(offset, TARGET_ELEMENT_ARRAY_BUFFER))
    }

    fn finish_view(&mut self, offset: usize, target: u32) -> usize {
        let length = self.data.len() - offset;
        while self.data.len() % 4 != 0 {
            self.data.push(0);
        }
        self.views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": length,
            "target": target,
        }));
        self.views.len() - 1
    }
}

/// Encode a mesh as an in-memory GLB file
pub fn encode_glb(mesh: &TriangleMesh) -> Result<Vec<u8>> {
    if mesh.is_empty() {
        return Err(Error::InvalidData("cannot encode an empty mesh as glTF".to_string()));
    }
    if !mesh.has_valid_indices() {
        return Err(Error::InvalidData("mesh face references a missing vertex".to_string()));
    }
    if mesh.vertex_count() > u32::MAX as usize {
        return Err(Error::InvalidData("too many vertices for u32 indices".to_string()));
    }

    let mut bin = BinBuffer::new();
    let mut accessors = Vec::new();
    let mut attributes = serde_json::Map::new();

    let (min, max) = mesh
        .bounding_box()
        .ok_or_else(|| Error::InvalidData("mesh has no vertices".to_string()))?;
    let positions = bin.push_floats(
        mesh.vertices.iter().flat_map(|v| [v.x, v.y, v.z]),
        TARGET_ARRAY_BUFFER,
    )?;
    accessors.push(json!({
        "bufferView": positions,
        "componentType": COMPONENT_FLOAT,
        "count": mesh.vertex_count(),
        "type": "VEC3",
        "min": [min.x, min.y, min.z],
        "max": [max.x, max.y, max.z],
    }));
    attributes.insert("POSITION".to_string(), json!(accessors.len() - 1));

    if let Some(normals) = mesh.normals.as_ref().filter(|n| n.len() == mesh.vertex_count()) {
        let view = bin.push_floats(normals.iter().flat_map(|n| [n.x, n.y, n.z]), TARGET_ARRAY_BUFFER)?;
        accessors.push(json!({
            "bufferView": view,
            "componentType": COMPONENT_FLOAT,
            "count": normals.len(),
            "type": "VEC3",
        }));
        attributes.insert("NORMAL".to_string(), json!(accessors.len() - 1));
    }

    if let Some(colors) = mesh.colors.as_ref().filter(|c| c.len() == mesh.vertex_count()) {
        let view = bin.push_floats(
            colors.iter().flat_map(|c| c.map(|v| v as f32 / 255.0)),
            TARGET_ARRAY_BUFFER,
        )?;
        accessors.push(json!({
            "bufferView": view,
            "componentType": COMPONENT_FLOAT,
            "count": colors.len(),
            "type": "VEC3",
        }));
        attributes.insert("COLOR_0".to_string(), json!(accessors.len() - 1));
    }

    let indices = bin.push_indices(mesh.faces.iter().flat_map(|f| f.map(|i| i as u32)))?;
    accessors.push(json!({
        "bufferView": indices,
        "componentType": COMPONENT_UNSIGNED_INT,
        "count": mesh.face_count() * 3,
        "type": "SCALAR",
    }));
    let indices_accessor = accessors.len() - 1;

    let document = json!({
        "asset": { "version": "2.0", "generator": concat!("lidarscan-io ", env!("CARGO_PKG_VERSION")) },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0, "name": "scan" }],
        "meshes": [{
            "name": "scan",
            "primitives": [{
                "attributes": attributes,
                "indices": indices_accessor,
                "mode": MODE_TRIANGLES,
            }],
        }],
        "accessors": accessors,
        "bufferViews": bin.views,
        "buffers": [{ "byteLength": bin.data.len() }],
    });

    let mut json_chunk = serde_json::to_vec(&document)
        .map_err(|e| Error::InvalidData(format!("glTF JSON encoding failed: {e}")))?;
    while json_chunk.len() % 4 != 0 {
        json_chunk.push(b' ');
    }

    let total = 12 + 8 + json_chunk.len() + 8 + bin.data.len();
    let total = u32::try_from(total)
        .map_err(|_| Error::InvalidData("GLB exceeds 4 GiB".to_string()))?;

    let mut out = Vec::with_capacity(total as usize);
    out.write_u32::<LittleEndian>(GLB_MAGIC)?;
    out.write_u32::<LittleEndian>(GLB_VERSION)?;
    out.write_u32::<LittleEndian>(total)?;

    out.write_u32::<LittleEndian>(json_chunk.len() as u32)?;
    out.write_u32::<LittleEndian>(CHUNK_JSON)?;
    out.extend_from_slice(&json_chunk);

    out.write_u32::<LittleEndian>(bin.data.len() as u32)?;
    out.write_u32::<LittleEndian>(CHUNK_BIN)?;
    out.extend_from_slice(&bin.data);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ReadBytesExt;
    use lidarscan_core::Point3f;
    use std::io::Cursor;

    fn parse(bytes: &[u8]) -> (u32, serde_json::Value, Vec<u8>) {
        let mut cursor = Cursor::new(bytes);
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), GLB_MAGIC);
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 2);
        let total = cursor.read_u32::<LittleEndian>().unwrap();

        let json_len = cursor.read_u32::<LittleEndian>().unwrap() as usize;
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), CHUNK_JSON);
        let start = cursor.position() as usize;
        let json: serde_json::Value = serde_json::from_slice(&bytes[start..start + json_len]).unwrap();
        cursor.set_position((start + json_len) as u64);

        let bin_len = cursor.read_u32::<LittleEndian>().unwrap() as usize;
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), CHUNK_BIN);
        let start = cursor.position() as usize;
        (total, json, bytes[start..start + bin_len].to_vec())
    }

    #[test]
    fn test_cuboid_layout() {
        let mesh = TriangleMesh::cuboid(Point3f::origin(), 2.0);
        let bytes = encode_glb(&mesh).unwrap();
        let (total, json, bin) = parse(&bytes);

        assert_eq!(total as usize, bytes.len());
        assert_eq!(bytes.len() % 4, 0);
        assert_eq!(json["accessors"][0]["count"], 8);
        assert_eq!(json["accessors"][0]["min"][0], -1.0);
        assert_eq!(json["accessors"][1]["count"], 36);
        // 8 * 12 bytes of positions + 36 * 4 bytes of indices
        assert_eq!(bin.len(), 96 + 144);
        assert_eq!(json["buffers"][0]["byteLength"], 240);
    }

    #[test]
    fn test_optional_attributes() {
        let mut mesh = TriangleMesh::cuboid(Point3f::origin(), 1.0);
        let normals = mesh.calculate_vertex_normals();
        mesh.set_normals(normals);
        mesh.set_colors(vec![[255, 128, 0]; 8]);

        let (_, json, _) = parse(&encode_glb(&mesh).unwrap());
        let attributes = &json["meshes"][0]["primitives"][0]["attributes"];
        assert_eq!(attributes["NORMAL"], 1);
        assert_eq!(attributes["COLOR_0"], 2);
        assert_eq!(json["meshes"][0]["primitives"][0]["indices"], 3);
    }

    #[test]
    fn test_empty_mesh_is_rejected() {
        assert!(matches!(encode_glb(&TriangleMesh::new()), Err(Error::InvalidData(_))));

        let broken = TriangleMesh::from_vertices_and_faces(vec![Point3f::origin()], vec![[0, 1, 2]]);
        assert!(encode_glb(&broken).is_err());
    }
}
