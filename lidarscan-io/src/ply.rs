//! PLY point cloud writer
//!
//! Used for the optional point cloud sidecar next to an exported model.

use lidarscan_core::{Result, ScanPoint};
use ply_rs::{
    ply::{Addable, DefaultElement, ElementDef, Ply, Property, PropertyDef, PropertyType, ScalarType},
    writer::Writer,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct PlyWriter;

impl PlyWriter {
    /// Write scan points as an ASCII PLY vertex list
    ///
    /// Colors and normals are only emitted when every point carries them.
    pub fn write_point_cloud<P: AsRef<Path>>(points: &[ScanPoint], path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(points, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn write_to<W: Write>(points: &[ScanPoint], out: &mut W) -> Result<()> {
        let has_colors = !points.is_empty() && points.iter().all(|p| p.color.is_some());
        let has_normals = !points.is_empty() && points.iter().all(|p| p.normal.is_some());

        let mut ply = Ply::<DefaultElement>::new();

        let mut vertex_element = ElementDef::new("vertex".to_string());
        vertex_element.count = points.len();
        for name in ["x", "y", "z"] {
            vertex_element.properties.add(float_property(name));
        }
        if has_normals {
            for name in ["nx", "ny", "nz"] {
                vertex_element.properties.add(float_property(name));
            }
        }
        if has_colors {
            for name in ["red", "green", "blue"] {
                vertex_element.properties.add(PropertyDef::new(
                    name.to_string(),
                    PropertyType::Scalar(ScalarType::UChar),
                ));
            }
        }
        vertex_element.properties.add(float_property("confidence"));
        ply.header.elements.add(vertex_element);

        let mut vertices = Vec::with_capacity(points.len());
        for point in points {
            let mut vertex = DefaultElement::new();
            vertex.insert("x".to_string(), Property::Float(point.position.x));
            vertex.insert("y".to_string(), Property::Float(point.position.y));
            vertex.insert("z".to_string(), Property::Float(point.position.z));
            if let (true, Some(n)) = (has_normals, point.normal) {
                vertex.insert("nx".to_string(), Property::Float(n.x));
                vertex.insert("ny".to_string(), Property::Float(n.y));
                vertex.insert("nz".to_string(), Property::Float(n.z));
            }
            if let (true, Some([r, g, b])) = (has_colors, point.color) {
                vertex.insert("red".to_string(), Property::UChar(to_byte(r)));
                vertex.insert("green".to_string(), Property::UChar(to_byte(g)));
                vertex.insert("blue".to_string(), Property::UChar(to_byte(b)));
            }
            vertex.insert("confidence".to_string(), Property::Float(point.confidence));
            vertices.push(vertex);
        }
        ply.payload.insert("vertex".to_string(), vertices);

        let writer_instance = Writer::new();
        writer_instance.write_ply(out, &mut ply)?;

        Ok(())
    }
}

fn float_property(name: &str) -> PropertyDef {
    PropertyDef::new(name.to_string(), PropertyType::Scalar(ScalarType::Float))
}

fn to_byte(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use lidarscan_core::{Point3f, Vector3f};

    fn render(points: &[ScanPoint]) -> String {
        let mut buf = Vec::new();
        PlyWriter::write_to(points, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_positions_and_confidence() {
        let points = vec![
            ScanPoint::new(Point3f::new(1.0, 2.0, 3.0)).with_confidence(0.5),
            ScanPoint::new(Point3f::new(4.0, 5.0, 6.0)),
        ];
        let text = render(&points);
        assert!(text.starts_with("ply"));
        assert!(text.contains("element vertex 2"));
        assert!(text.contains("property float confidence"));
        assert!(!text.contains("property uchar red"));
        assert!(!text.contains("property float nx"));
    }

    #[test]
    fn test_color_and_normals_when_complete() {
        let points = vec![
            ScanPoint::new(Point3f::origin())
                .with_color([1.0, 0.0, 0.0])
                .with_normal(Vector3f::z()),
            ScanPoint::new(Point3f::new(1.0, 0.0, 0.0))
                .with_color([0.0, 1.0, 0.0])
                .with_normal(Vector3f::z()),
        ];
        let text = render(&points);
        assert!(text.contains("property uchar red"));
        assert!(text.contains("property float nx"));
        assert!(text.contains(" 255 0 0 "));
    }

    #[test]
    fn test_partial_colors_are_dropped() {
        let points = vec![
            ScanPoint::new(Point3f::origin()).with_color([1.0, 1.0, 1.0]),
            ScanPoint::new(Point3f::new(1.0, 0.0, 0.0)),
        ];
        assert!(!render(&points).contains("property uchar red"));
    }

    #[test]
    fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.ply");
        PlyWriter::write_point_cloud(&[ScanPoint::new(Point3f::origin())], &path).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("end_header"));
    }
}
