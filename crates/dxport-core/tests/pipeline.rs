//! End-to-end export of parts through the memory session

use std::fs;
use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use dxport_core::{ExportConfig, ExportError, ExportOrchestrator, PartReport};
use dxport_kernel::{
    AppContext, BodyModel, CadSession, ClosePolicy, EdgeModel, FacesAs, MemorySession,
    ModifiedPartResponse, PartModel, SketchModel,
};
use glam::DVec3;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    out: PathBuf,
    config: ExportConfig,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("dxf");
        let config = ExportConfig {
            output_dir: out.clone(),
            ..Default::default()
        };
        Self {
            _dir: dir,
            out,
            config,
        }
    }

    fn export(&self, session: &mut MemorySession, part: &str) -> Result<PartReport, ExportError> {
        let mut orchestrator = ExportOrchestrator::new(session, self.config.clone()).unwrap();
        orchestrator.process_part(Path::new(part))
    }

    fn written(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.out)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn tagged(job: &str, mark: &str) -> PartModel {
    PartModel::new()
        .with_attribute("JobNo", job)
        .with_attribute("Mark", mark)
}

fn zinc_sketch() -> SketchModel {
    SketchModel::new("ZINC")
        .with_segment(DVec3::ZERO, DVec3::new(10.0, 0.0, 0.0))
        .with_segment(DVec3::new(10.0, 0.0, 0.0), DVec3::new(10.0, 5.0, 0.0))
}

fn raised_plate(name: &str) -> BodyModel {
    BodyModel::plate(name, DVec3::new(0.0, 0.0, 1.0), DVec3::new(80.0, 40.0, 1.5))
}

#[test]
fn test_single_body_part_uses_base_name() {
    let h = Harness::new();
    let model = tagged("100", "A").with_body(BodyModel::plate("web", DVec3::ZERO, DVec3::ONE));
    let mut session = MemorySession::new().with_part("100_A.prt", model);

    let report = h.export(&mut session, "100_A.prt").unwrap();

    assert_eq!(report.bodies.len(), 1);
    assert_eq!(report.bodies[0].output, h.out.join("100_A.dxf"));
    assert_eq!(h.written(), vec!["100_A.dxf"]);
}

#[test]
fn test_multi_body_naming() {
    let h = Harness::new();
    let model = tagged("100", "A")
        .with_body(raised_plate("web"))
        .with_body(raised_plate(""))
        .with_body(raised_plate("flange/top"))
        .with_body(raised_plate(""));
    let mut session = MemorySession::new().with_part("100_A.prt", model);

    h.export(&mut session, "100_A.prt").unwrap();

    assert_eq!(
        h.written(),
        vec![
            "100_A-flange_top.dxf",
            "100_A-web.dxf",
            "100_A_1.dxf",
            "100_A_2.dxf"
        ]
    );
}

#[test]
fn test_stale_metadata_falls_back_to_file_name() {
    let h = Harness::new();
    let model = tagged("100", "A")
        .with_body(raised_plate("web"))
        .with_body(raised_plate("flange"));
    let mut session = MemorySession::new().with_part("200_B.prt", model);

    let report = h.export(&mut session, "200_B.prt").unwrap();

    assert!(report.naming_fallback);
    assert_eq!(h.written(), vec!["200_B-flange.dxf", "200_B-web.dxf"]);
}

#[test]
fn test_placeholder_metadata_falls_back_to_file_name() {
    let h = Harness::new();
    let model = tagged("XX ", "A").with_body(raised_plate("web"));
    let mut session = MemorySession::new().with_part("300_C.prt", model);

    let report = h.export(&mut session, "300_C.prt").unwrap();

    assert!(report.naming_fallback);
    assert_eq!(h.written(), vec!["300_C.dxf"]);
}

#[test]
fn test_selection_holds_only_sketches_between_bodies() {
    let h = Harness::new();
    let model = tagged("100", "A")
        .with_attribute("DrawingNo", "D-12")
        .with_sketch(zinc_sketch())
        .with_body(raised_plate("web"))
        .with_body(raised_plate("flange"))
        .with_body(raised_plate("stiffener"));
    let mut session = MemorySession::new().with_part("100_A.prt", model);

    h.export(&mut session, "100_A.prt").unwrap();

    let commits = session.commits();
    assert_eq!(commits.len(), 3);
    for (commit, body) in commits.iter().zip(["web", "flange", "stiffener"]) {
        assert_eq!(commit.sketch_curves, 2);
        assert_eq!(commit.bodies, vec![body.to_string()]);
        assert_eq!(commit.notes.len(), 1);
    }
    assert_eq!(session.remaining_at_destroy(), &[2]);
    assert_eq!(session.exporter_count(), 0);
}

#[test]
fn test_thickness_note_for_raised_plate() {
    let h = Harness::new();
    let model = tagged("100", "A")
        .with_attribute("DrawingNo", "D-12")
        .with_body(raised_plate("web"))
        .with_body(BodyModel::plate("base", DVec3::ZERO, DVec3::new(20.0, 20.0, 0.5)));
    let mut session = MemorySession::new().with_part("100_A.prt", model);

    let report = h.export(&mut session, "100_A.prt").unwrap();

    let web = &report.bodies[0];
    assert_relative_eq!(web.thickness.unwrap(), 0.5);
    assert_eq!(web.note_lines, vec!["DRAWING: D-12", "THICKNESS: 0.500000"]);

    // Seated on the reference plane: no thickness, drawing number only
    let base = &report.bodies[1];
    assert_eq!(base.thickness, None);
    assert_eq!(base.note_lines, vec!["DRAWING: D-12"]);

    let notes: Vec<_> = session.commits().iter().map(|c| c.notes.clone()).collect();
    assert_eq!(notes[0], vec![web.note_lines.clone()]);
    assert_eq!(notes[1], vec![base.note_lines.clone()]);
}

#[test]
fn test_no_note_without_facts() {
    let h = Harness::new();
    let model = tagged("100", "A").with_body(BodyModel::plate("base", DVec3::ZERO, DVec3::ONE));
    let mut session = MemorySession::new().with_part("100_A.prt", model);

    let report = h.export(&mut session, "100_A.prt").unwrap();

    assert!(report.bodies[0].note_lines.is_empty());
    assert!(session.commits()[0].notes.is_empty());
    assert!(
        !session
            .context_history()
            .contains(&AppContext::Drafting)
    );
}

#[test]
fn test_failing_edges_are_skipped() {
    let h = Harness::new();
    let body = BodyModel::new("web")
        .with_edge(EdgeModel::new(
            DVec3::new(0.0, 0.0, 2.0),
            DVec3::new(10.0, 0.0, 2.0),
        ))
        .with_edge(EdgeModel::failing(
            DVec3::new(0.0, 0.0, -50.0),
            DVec3::new(0.0, 0.0, 50.0),
        ))
        .with_edge(EdgeModel::new(
            DVec3::new(0.0, 5.0, 3.0),
            DVec3::new(10.0, 5.0, 3.0),
        ));
    let mut session = MemorySession::new().with_part("100_A.prt", tagged("100", "A").with_body(body));

    let report = h.export(&mut session, "100_A.prt").unwrap();

    let web = &report.bodies[0];
    assert_eq!(web.sampled_edges, 2);
    assert_eq!(web.failed_edges, 1);
    assert_relative_eq!(web.thickness.unwrap(), 1.0);
}

#[test]
fn test_no_samples_means_no_thickness() {
    let h = Harness::new();
    let body = BodyModel::new("web").with_edge(EdgeModel::failing(
        DVec3::new(0.0, 0.0, 1.0),
        DVec3::new(1.0, 0.0, 1.0),
    ));
    let model = tagged("100", "A")
        .with_attribute("DrawingNo", "D-1")
        .with_body(body);
    let mut session = MemorySession::new().with_part("100_A.prt", model);

    let report = h.export(&mut session, "100_A.prt").unwrap();

    let web = &report.bodies[0];
    assert_eq!(web.thickness, None);
    assert_eq!(web.note_lines, vec!["DRAWING: D-1"]);
    assert!(web.output.exists());
}

#[test]
fn test_hidden_and_unmarked_sketches_are_not_staged() {
    let h = Harness::new();
    let model = tagged("100", "A")
        .with_sketch(zinc_sketch())
        .with_sketch(
            SketchModel::new("ZINC-old")
                .blanked()
                .with_segment(DVec3::ZERO, DVec3::Y),
        )
        .with_sketch(SketchModel::new("layout").with_segment(DVec3::ZERO, DVec3::X))
        .with_body(raised_plate("web"));
    let mut session = MemorySession::new().with_part("100_A.prt", model);

    let report = h.export(&mut session, "100_A.prt").unwrap();

    assert_eq!(report.sketches.staged, 1);
    assert_eq!(report.sketches.skipped_hidden, 1);
    assert_eq!(report.sketches.failed, 0);
    assert_eq!(session.commits()[0].sketch_curves, 2);
}

#[test]
fn test_rejected_body_still_commits_the_rest() {
    let h = Harness::new();
    let model = tagged("100", "A")
        .with_attribute("DrawingNo", "D-1")
        .with_sketch(zinc_sketch())
        .with_body(raised_plate("web"))
        .with_body(raised_plate("flange"));
    let mut session = MemorySession::new().with_part("100_A.prt", model);
    session.reject_body("web");

    let report = h.export(&mut session, "100_A.prt").unwrap();

    assert_eq!(report.bodies[0].stage_failures, 1);
    assert_eq!(report.bodies[1].stage_failures, 0);

    let first = &session.commits()[0];
    assert!(first.bodies.is_empty());
    assert_eq!(first.sketch_curves, 2);
    assert_eq!(first.notes.len(), 1);
    assert_eq!(session.commits()[1].bodies, vec!["flange".to_string()]);
}

#[test]
fn test_export_is_repeatable() {
    let h = Harness::new();
    let model = tagged("100", "A")
        .with_attribute("DrawingNo", "D-12")
        .with_sketch(zinc_sketch())
        .with_body(raised_plate("web"))
        .with_body(raised_plate(""));
    let mut session = MemorySession::new().with_part("100_A.prt", model);

    let first = h.export(&mut session, "100_A.prt").unwrap();
    let files = h.written();
    let second = h.export(&mut session, "100_A.prt").unwrap();

    assert_eq!(first, second);
    assert_eq!(h.written(), files);
}

#[test]
fn test_existing_file_is_replaced() {
    let h = Harness::new();
    fs::create_dir_all(&h.out).unwrap();
    let target = h.out.join("100_A.dxf");
    fs::write(&target, "stale").unwrap();

    let model = tagged("100", "A").with_body(raised_plate("web"));
    let mut session = MemorySession::new().with_part("100_A.prt", model);
    h.export(&mut session, "100_A.prt").unwrap();

    let content = fs::read_to_string(&target).unwrap();
    assert_ne!(content, "stale");
    assert!(dxf::Drawing::load_file(&target).is_ok());
}

#[test]
fn test_zero_bodies_writes_nothing() {
    let h = Harness::new();
    let model = tagged("100", "A").with_sketch(zinc_sketch());
    let mut session = MemorySession::new().with_part("100_A.prt", model);

    let report = h.export(&mut session, "100_A.prt").unwrap();

    assert!(report.bodies.is_empty());
    assert!(h.written().is_empty());
    assert!(!session.is_part_open());
}

#[test]
fn test_drafting_failure_restores_modeling_and_closes_part() {
    let h = Harness::new();
    let model = tagged("100", "A")
        .with_attribute("DrawingNo", "D-1")
        .with_body(raised_plate("web"));
    let mut session = MemorySession::new().with_part("100_A.prt", model);
    session.fail_switch_to(AppContext::Drafting);

    let result = h.export(&mut session, "100_A.prt");

    assert!(matches!(
        result,
        Err(ExportError::Context {
            context: AppContext::Drafting,
            ..
        })
    ));
    assert!(session.commits().is_empty());
    assert_eq!(session.remaining_at_destroy(), &[0]);
    assert!(!session.is_part_open());
    assert_eq!(session.current_application(), AppContext::NoPart);
}

#[test]
fn test_commit_failure_aborts_part() {
    let h = Harness::new();
    let model = tagged("100", "A")
        .with_body(raised_plate("web"))
        .with_body(raised_plate("flange"));
    let mut session = MemorySession::new().with_part("100_A.prt", model);
    session.fail_commits();

    let result = h.export(&mut session, "100_A.prt");

    assert!(matches!(result, Err(ExportError::Commit { .. })));
    assert!(h.written().is_empty());
    assert_eq!(session.closed_parts().len(), 1);
    assert_eq!(session.exporter_count(), 0);
}

#[test]
fn test_parts_close_saving_modified_parts() {
    let h = Harness::new();
    let model = tagged("100", "A")
        .with_attribute("DrawingNo", "D-1")
        .with_body(raised_plate("web"));
    let mut session = MemorySession::new().with_part("100_A.prt", model);

    h.export(&mut session, "100_A.prt").unwrap();

    let closed = &session.closed_parts()[0];
    assert!(closed.was_modified);
    assert!(closed.policy.whole_tree);
    assert_eq!(closed.policy.modified, ModifiedPartResponse::SaveModified);
}

#[test]
fn test_configured_close_policy_is_used() {
    let mut h = Harness::new();
    h.config.close_policy = ClosePolicy {
        whole_tree: false,
        modified: ModifiedPartResponse::CloseModified,
    };
    let model = tagged("100", "A").with_body(raised_plate("web"));
    let mut session = MemorySession::new().with_part("100_A.prt", model);

    h.export(&mut session, "100_A.prt").unwrap();

    assert_eq!(session.closed_parts()[0].policy, h.config.close_policy);
}

#[test]
fn test_exporter_settings_applied_once_per_part() {
    let mut h = Harness::new();
    h.config.settings_file = PathBuf::from("profiles/dxfdwg.def");
    let model = tagged("100", "A")
        .with_body(raised_plate("web"))
        .with_body(raised_plate("flange"));
    let mut session = MemorySession::new().with_part("100_A.prt", model);

    h.export(&mut session, "100_A.prt").unwrap();

    let settings = session.exporter_settings();
    assert_eq!(settings.len(), 1);
    let settings = &settings[0];
    assert_eq!(settings.settings_file, PathBuf::from("profiles/dxfdwg.def"));
    assert_eq!(settings.input_file, PathBuf::from("100_A.prt"));
    assert!(settings.selected_objects_only);
    assert!(settings.export_drawing);
    assert!(settings.flatten_assembly);
    assert_eq!(settings.faces_as, FacesAs::PolylineMesh);
}

#[test]
fn test_rejected_sketch_does_not_drop_other_sketches() {
    let h = Harness::new();
    let model = tagged("100", "A")
        .with_sketch(
            SketchModel::new("ZINC bad")
                .with_segment(DVec3::ZERO, DVec3::Y)
                .with_segment(DVec3::Y, DVec3::ONE),
        )
        .with_sketch(
            SketchModel::new("ZINC good")
                .with_segment(DVec3::ZERO, DVec3::X)
                .with_segment(DVec3::X, DVec3::ONE),
        )
        .with_body(raised_plate("web"))
        .with_body(raised_plate("flange"));
    let mut session = MemorySession::new().with_part("100_A.prt", model);
    session.reject_sketch("ZINC bad");

    let report = h.export(&mut session, "100_A.prt").unwrap();

    assert_eq!(report.sketches.staged, 1);
    assert_eq!(report.sketches.failed, 1);
    assert_eq!(report.sketches.curves, 2);
    for commit in session.commits() {
        assert_eq!(commit.sketch_curves, 2);
    }
    assert_eq!(session.remaining_at_destroy(), &[2]);
}

#[test]
fn test_duplicate_body_names_write_separate_files() {
    let h = Harness::new();
    let model = tagged("100", "A")
        .with_body(raised_plate("web"))
        .with_body(raised_plate("web"))
        .with_body(raised_plate("a/b"))
        .with_body(raised_plate("a_b"));
    let mut session = MemorySession::new().with_part("100_A.prt", model);

    let report = h.export(&mut session, "100_A.prt").unwrap();

    let outputs: Vec<_> = report.bodies.iter().map(|b| b.output.clone()).collect();
    assert_eq!(
        outputs,
        vec![
            h.out.join("100_A-web.dxf"),
            h.out.join("100_A_1.dxf"),
            h.out.join("100_A-a_b.dxf"),
            h.out.join("100_A_2.dxf"),
        ]
    );
    assert_eq!(h.written().len(), 4);
    assert_eq!(session.commits().len(), 4);
}

#[test]
fn test_license_released_after_batch() {
    let h = Harness::new();
    let mut session = MemorySession::new()
        .with_part("100_A.prt", tagged("100", "A").with_body(raised_plate("web")))
        .with_part("101_A.prt", tagged("101", "A").with_body(raised_plate("web")));

    let report = {
        let mut orchestrator = ExportOrchestrator::new(&mut session, h.config.clone()).unwrap();
        orchestrator.process_batch(&["100_A.prt", "broken.prt", "101_A.prt"])
    };

    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    assert!(session.licenses().is_empty());
    assert_eq!(h.written(), vec!["100_A.dxf", "101_A.dxf"]);
}

#[test]
fn test_part_loaded_from_ron_file() {
    let h = Harness::new();
    let path = h.out.parent().unwrap().join("100_A.ron");
    tagged("100", "A")
        .with_body(raised_plate("web"))
        .save(&path)
        .unwrap();

    let mut session = MemorySession::new();
    let report = h.export(&mut session, path.to_str().unwrap()).unwrap();

    assert_eq!(report.bodies[0].output, h.out.join("100_A.dxf"));
    assert_eq!(session.name(), "memory");
}
