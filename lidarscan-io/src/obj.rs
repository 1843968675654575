//! Wavefront OBJ writer

use crate::format::ModelFormat;
use crate::registry::ModelWriter;
use lidarscan_core::{Error, Result, TriangleMesh};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct ObjWriter;

impl ObjWriter {
    /// Write OBJ text to any writer
    pub fn write_to<W: Write>(mesh: &TriangleMesh, out: &mut W) -> Result<()> {
        if !mesh.has_valid_indices() {
            return Err(Error::InvalidData("mesh face references a missing vertex".to_string()));
        }

        writeln!(out, "# lidarscan export")?;
        writeln!(out, "# vertices: {} faces: {}", mesh.vertex_count(), mesh.face_count())?;
        writeln!(out, "o scan")?;

        let colors = mesh.colors.as_ref().filter(|c| c.len() == mesh.vertex_count());
        for (i, v) in mesh.vertices.iter().enumerate() {
            match colors {
                Some(colors) => {
                    let [r, g, b] = colors[i];
                    writeln!(
                        out,
                        "v {} {} {} {:.4} {:.4} {:.4}",
                        v.x,
                        v.y,
                        v.z,
                        r as f32 / 255.0,
                        g as f32 / 255.0,
                        b as f32 / 255.0
                    )?;
                }
                None => writeln!(out, "v {} {} {}", v.x, v.y, v.z)?,
            }
        }

        let normals = mesh.normals.as_ref().filter(|n| n.len() == mesh.vertex_count());
        if let Some(normals) = normals {
            for n in normals {
                writeln!(out, "vn {} {} {}", n.x, n.y, n.z)?;
            }
        }

        // OBJ indices are 1-based
        for face in &mesh.faces {
            let [a, b, c] = face.map(|i| i + 1);
            if normals.is_some() {
                writeln!(out, "f {a}//{a} {b}//{b} {c}//{c}")?;
            } else {
                writeln!(out, "f {a} {b} {c}")?;
            }
        }

        Ok(())
    }
}

impl ModelWriter for ObjWriter {
    fn write_model(&self, mesh: &TriangleMesh, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        Self::write_to(mesh, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    fn format(&self) -> ModelFormat {
        ModelFormat::Obj
    }
}
