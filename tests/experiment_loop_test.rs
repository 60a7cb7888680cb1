//! End-to-end tests for the experiment state machine against a stub engine.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use plateflow::config::{
    ExperimentConfig, ExperimentSettings, IncubationSettings, ProtocolSettings,
    ProvenanceSettings, ResourceSettings, WorkflowSettings,
};
use plateflow::experiment::{CycleBounds, CycleLength, ExperimentDriver, ExperimentState};
use plateflow::workflow::{Payload, WorkflowEngine, WorkflowRef, WorkflowResult};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Engine stub that records every dispatch and returns a scripted result.
#[derive(Clone, Default)]
struct StubEngine {
    dispatches: Arc<Mutex<Vec<(String, Payload)>>>,
    /// Workflow reference that should fail when dispatched
    fail_on: Option<String>,
    /// When set, results omit the bmg_read step
    omit_read_step: bool,
}

impl StubEngine {
    fn dispatched_refs(&self) -> Vec<String> {
        self.dispatches
            .lock()
            .unwrap()
            .iter()
            .map(|(reference, _)| reference.clone())
            .collect()
    }

    fn payload_for(&self, reference: &str) -> Option<Payload> {
        self.dispatches
            .lock()
            .unwrap()
            .iter()
            .find(|(dispatched, _)| dispatched == reference)
            .map(|(_, payload)| payload.clone())
    }
}

#[async_trait]
impl WorkflowEngine for StubEngine {
    async fn start_run(
        &self,
        workflow: &WorkflowRef,
        payload: &Payload,
    ) -> anyhow::Result<WorkflowResult> {
        self.dispatches
            .lock()
            .unwrap()
            .push((workflow.as_str().to_string(), payload.clone()));

        if self.fail_on.as_deref() == Some(workflow.as_str()) {
            anyhow::bail!("engine reported module failure");
        }

        let sequence = self.dispatches.lock().unwrap().len() as i64;
        let end_time = Utc
            .timestamp_opt(1_700_000_000 + sequence, 0)
            .single()
            .unwrap();

        let mut result =
            WorkflowResult::new(workflow.as_str()).with_step("plate_transfer", end_time);
        if !self.omit_read_step {
            result = result.with_step("bmg_read", end_time);
        }
        Ok(result)
    }
}

fn test_config(dir: &Path, total_loops: u64, inner_loop_count: u32) -> ExperimentConfig {
    std::fs::write(
        dir.join("inoculate.py"),
        "tips = $tip_location\nsources = $source_columns\ndestinations = $destination_columns\n",
    )
    .unwrap();

    let mut locations = BTreeMap::new();
    locations.insert("incubator_node".to_string(), "inheco_devID2_floor0".to_string());
    locations.insert("liquid_handler_node".to_string(), "ot2biobeta".to_string());
    locations.insert("reader_assay_name".to_string(), "NIDHI".to_string());

    ExperimentConfig {
        experiment: ExperimentSettings {
            label: "3".into(),
            campaign: "Substrate_Campaign".into(),
            total_loops,
            cycle_length: CycleLength::Four,
            inner_loop_count,
        },
        incubation: IncubationSettings {
            initial: Duration::ZERO,
            between_readings: Duration::ZERO,
            poll_interval: Duration::from_millis(1),
        },
        resources: ResourceSettings {
            tip_box: CycleBounds { min: 4, max: 11, start: 4 },
            plate_stack: CycleBounds { min: 1, max: 5, start: 1 },
            lid_nest: CycleBounds { min: 1, max: 2, start: 1 },
        },
        locations,
        parameters: BTreeMap::new(),
        workflows: WorkflowSettings {
            first_cycle: WorkflowRef::from("first_cycle_wf"),
            within_plate: WorkflowRef::from("within_plate_wf"),
            between_plate: WorkflowRef::from("between_plate_wf"),
            read: WorkflowRef::from("read_wf"),
            to_incubator: WorkflowRef::from("to_incubator_wf"),
            to_liquid_handler: WorkflowRef::from("to_liquid_handler_wf"),
            finalize: WorkflowRef::from("finalize_wf"),
            read_step: "bmg_read".into(),
        },
        protocol: ProtocolSettings {
            template: dir.join("inoculate.py"),
        },
        provenance: ProvenanceSettings {
            csv_directory: dir.join("provenance"),
        },
    }
}

#[tokio::test]
async fn two_loop_run_dispatches_phases_reads_and_ledger_rows_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StubEngine::default();
    let mut driver =
        ExperimentDriver::new(test_config(dir.path(), 2, 1), engine.clone()).unwrap();

    driver.run().await.unwrap();
    assert_eq!(driver.state(), ExperimentState::Done);

    let refs = engine.dispatched_refs();
    assert_eq!(
        refs,
        [
            "first_cycle_wf",
            "read_wf",
            "to_liquid_handler_wf",
            "within_plate_wf",
            "read_wf",
            "to_liquid_handler_wf",
            "finalize_wf",
        ]
    );

    // Exactly 2 phase dispatches and 2 read dispatches, interleaved in order
    let phase_count = refs
        .iter()
        .filter(|r| *r == "first_cycle_wf" || *r == "within_plate_wf" || *r == "between_plate_wf")
        .count();
    let read_count = refs.iter().filter(|r| *r == "read_wf").count();
    assert_eq!(phase_count, 2);
    assert_eq!(read_count, 2);

    // Exactly one header row followed by 2 data rows, in reading order
    let experiment_id = driver.run_info().experiment_id.clone();
    let csv_path = dir
        .path()
        .join("provenance")
        .join(format!("{experiment_id}.csv"));
    let contents = std::fs::read_to_string(csv_path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "bmg filename,utc timestamp");
    // plate 0, transfer 1, reading 1; then plate 0, transfer 2, reading 2
    assert!(lines[1].contains(&format!("{experiment_id}_0_1_1.txt")));
    assert!(lines[2].contains(&format!("{experiment_id}_0_2_2.txt")));
}

#[tokio::test]
async fn within_plate_payload_carries_wells_tips_and_rendered_protocol() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StubEngine::default();
    let mut driver =
        ExperimentDriver::new(test_config(dir.path(), 2, 1), engine.clone()).unwrap();
    driver.run().await.unwrap();

    // No column mapping on the first cycle
    let first_payload = engine.payload_for("first_cycle_wf").unwrap();
    assert_eq!(first_payload.get("source_wells_list"), None);
    assert_eq!(first_payload.get_text("current_protocol"), None);

    let payload = engine.payload_for("within_plate_wf").unwrap();

    // loop 1, cycle 4: sources 1/5/9, destinations 2/6/10
    let wells = match payload.get("source_wells_list") {
        Some(plateflow::workflow::PayloadValue::WellGroups(groups)) => groups.clone(),
        other => panic!("unexpected source_wells_list: {other:?}"),
    };
    assert_eq!(wells.len(), 3);
    assert_eq!(wells[0][0], "A1");
    assert_eq!(wells[1][0], "A5");
    assert_eq!(wells[2][7], "H9");

    // Tip rack rotated off its starting slot before the dispatch
    assert_eq!(payload.get_integer("tip_box_location"), Some(5));

    // Rendered protocol exists and has every token substituted
    let protocol_path = payload.get_text("current_protocol").unwrap();
    let rendered = std::fs::read_to_string(protocol_path).unwrap();
    assert_eq!(
        rendered,
        "tips = 5\nsources = [1,5,9]\ndestinations = [2,6,10]\n"
    );
    std::fs::remove_file(protocol_path).ok();

    // Fixed location identifiers ride along on every dispatch
    assert_eq!(payload.get_text("reader_assay_name"), Some("NIDHI"));
    assert_eq!(payload.get_text("bmg_data_output_name"), None);
}

#[tokio::test]
async fn between_plate_boundary_rotates_stack_and_resets_counters() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StubEngine::default();
    // Loops 0..4: FirstCycle, 3x WithinPlate, then the boundary at loop 4
    let mut driver =
        ExperimentDriver::new(test_config(dir.path(), 5, 1), engine.clone()).unwrap();
    driver.run().await.unwrap();

    let refs = engine.dispatched_refs();
    assert_eq!(
        refs.iter().filter(|r| *r == "between_plate_wf").count(),
        1
    );
    assert_eq!(
        refs.iter().filter(|r| *r == "within_plate_wf").count(),
        3
    );

    // Fresh plate came from the next tower deck, with the next lid nest
    let payload = engine.payload_for("between_plate_wf").unwrap();
    assert_eq!(payload.get_integer("plate_stack_location"), Some(2));
    assert_eq!(payload.get_integer("lid_nest_location"), Some(2));
    assert_eq!(payload.get_integer("plate_num"), Some(1));

    // Per-plate counters reset: the boundary iteration's reading is
    // plate 1, transfer 1, reading 1
    let experiment_id = driver.run_info().experiment_id.clone();
    let contents = std::fs::read_to_string(
        dir.path()
            .join("provenance")
            .join(format!("{experiment_id}.csv")),
    )
    .unwrap();
    let last_row = contents.lines().last().unwrap();
    assert!(last_row.contains(&format!("{experiment_id}_1_1_1.txt")));

    // 5 readings total: one per outer iteration
    assert_eq!(contents.lines().count(), 6);
}

#[tokio::test]
async fn dispatch_failure_is_fatal_and_halts_the_machine() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StubEngine {
        fail_on: Some("read_wf".to_string()),
        ..StubEngine::default()
    };
    let mut driver =
        ExperimentDriver::new(test_config(dir.path(), 2, 1), engine.clone()).unwrap();

    let err = driver.run().await.unwrap_err();
    assert!(format!("{err:#}").contains("read_wf"));
    assert!(!driver.state().is_terminal());

    // The machine stopped at the failed read: nothing was dispatched after
    // it and no provenance was written
    assert_eq!(engine.dispatched_refs(), ["first_cycle_wf", "read_wf"]);
    let experiment_id = driver.run_info().experiment_id.clone();
    assert!(!dir
        .path()
        .join("provenance")
        .join(format!("{experiment_id}.csv"))
        .exists());
}

#[tokio::test]
async fn missing_read_step_fails_fast_instead_of_using_stale_data() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StubEngine {
        omit_read_step: true,
        ..StubEngine::default()
    };
    let mut driver =
        ExperimentDriver::new(test_config(dir.path(), 2, 1), engine.clone()).unwrap();

    let err = driver.run().await.unwrap_err();
    let rendered = format!("{err:#}");
    assert!(rendered.contains("bmg_read"));

    // No ledger row was written from a result lacking the read step
    let experiment_id = driver.run_info().experiment_id.clone();
    assert!(!dir
        .path()
        .join("provenance")
        .join(format!("{experiment_id}.csv"))
        .exists());
}
