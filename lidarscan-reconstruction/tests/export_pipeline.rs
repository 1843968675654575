use lidarscan_core::{
    AnchorId, CloudSnapshot, Error, MeshAnchor, Point3f, Result, ScanPoint, Transform3D, TriangleMesh,
    UnitQuaternion, Vector3f,
};
use lidarscan_io::{ModelFormat, ModelWriter, WriterRegistry};
use lidarscan_reconstruction::*;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn config_in(dir: &Path) -> ExportConfig {
    ExportConfig {
        output_dir: dir.join("models"),
        ..ExportConfig::default()
    }
}

fn scan_points() -> CloudSnapshot {
    (0..100)
        .map(|i| {
            let t = i as f32 * 0.01;
            ScanPoint::new(Point3f::new(t, 1.0, 2.0)).with_confidence(0.5)
        })
        .collect::<Vec<_>>()
        .into()
}

struct SlowReconstructor;

impl Reconstructor for SlowReconstructor {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn reconstruct(&self, points: &CloudSnapshot, anchors: &[MeshAnchor]) -> Result<TriangleMesh> {
        thread::sleep(Duration::from_millis(200));
        AnchorMeshReconstructor::default().reconstruct(points, anchors)
    }
}

struct BrokenGlbWriter;

impl ModelWriter for BrokenGlbWriter {
    fn write_model(&self, _mesh: &TriangleMesh, path: &Path) -> Result<()> {
        std::fs::write(path, b"partial")?;
        Err(Error::InvalidData("disk full".to_string()))
    }

    fn format(&self) -> ModelFormat {
        ModelFormat::Glb
    }
}

#[test]
fn test_output_directory_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = ExportPipeline::new(config_in(dir.path()));
    let result = pipeline.export(&ExportRequest::new(scan_points(), Vec::new(), ModelFormat::Obj));

    assert!(result.success);
    assert!(result.model_path.starts_with(dir.path().join("models")));
    assert_eq!(result.point_count, 100);
    assert_eq!(pipeline.store().list_models().len(), 1);
}

#[test]
fn test_rotated_anchors_export() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = ExportPipeline::new(config_in(dir.path()));
    let anchors: Vec<_> = (0..4)
        .map(|i| {
            let rotation = UnitQuaternion::from_axis_angle(&Vector3f::y_axis(), i as f32 * 0.5);
            MeshAnchor::new(
                AnchorId::new_v4(),
                Transform3D::from_translation_rotation(Vector3f::new(i as f32, 0.0, 0.0), rotation),
                TriangleMesh::cuboid(Point3f::origin(), 0.2),
            )
        })
        .collect();

    let result = pipeline.export(&ExportRequest::new(scan_points(), anchors, ModelFormat::Glb));
    assert!(result.success);
    assert!(!result.placeholder);
    assert_eq!(result.anchor_count, 4);

    let bytes = std::fs::read(&result.model_path).unwrap();
    assert_eq!(&bytes[..4], b"glTF");
}

#[test]
fn test_writer_failure_leaves_no_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = WriterRegistry::with_defaults();
    registry.register(Box::new(BrokenGlbWriter));
    let pipeline = ExportPipeline::new(config_in(dir.path())).with_registry(registry);

    let anchor = MeshAnchor::new(
        AnchorId::new_v4(),
        Transform3D::identity(),
        TriangleMesh::cuboid(Point3f::origin(), 1.0),
    );
    let result = pipeline.export(&ExportRequest::new(scan_points(), vec![anchor], ModelFormat::Glb));

    assert!(result.success);
    assert!(result.placeholder);
    assert_eq!(result.format, ModelFormat::Obj);
    assert!(result.error_message.as_deref().unwrap_or_default().contains("disk full"));

    let models = pipeline.store().list_models();
    assert_eq!(models, vec![result.model_path.clone()]);
}

#[test]
fn test_cancel_in_flight_export() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(ExportPipeline::new(config_in(dir.path())).with_reconstructor(Box::new(SlowReconstructor)));
    let anchor = MeshAnchor::new(
        AnchorId::new_v4(),
        Transform3D::identity(),
        TriangleMesh::cuboid(Point3f::origin(), 1.0),
    );

    let task = pipeline
        .clone()
        .spawn(ExportRequest::new(scan_points(), vec![anchor], ModelFormat::Glb), CancellationToken::new())
        .unwrap();
    task.cancel();

    assert_eq!(task.wait().unwrap(), ExportOutcome::Cancelled);
    assert!(pipeline.store().list_models().is_empty());
}

#[test]
fn test_poll_until_done() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(ExportPipeline::new(config_in(dir.path())));
    let mut task = pipeline
        .spawn(ExportRequest::new(scan_points(), Vec::new(), ModelFormat::Glb), CancellationToken::new())
        .unwrap();

    let outcome = loop {
        if let Some(outcome) = task.try_result() {
            break outcome.unwrap();
        }
        thread::sleep(Duration::from_millis(5));
    };
    assert!(outcome.result().unwrap().placeholder);
}
