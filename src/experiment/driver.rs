//! The experiment state machine.
//!
//! `ExperimentDriver` composes the whole orchestration core: it decides,
//! iteration by iteration, which workflow to dispatch, rotates the consumable
//! resource cycles, derives the column mapping from the loop counter, blocks
//! for incubation periods, and records provenance for every reading.
//!
//! # Architecture
//!
//! ```text
//! ExperimentConfig ─┐
//!                   ├─> ExperimentDriver ──> WorkflowDispatcher ──> engine ──> instruments
//! WorkflowEngine  ──┘          │
//!                              ├──> IncubationWaiter (blocking holds)
//!                              └──> ProvenanceLedger (reading timestamps)
//! ```
//!
//! The driver is one sequential task. Every dispatch is awaited to
//! completion before the next begins, and the payload for each dispatch is a
//! fresh projection of loop state + resource indices + fixed location
//! identifiers - nothing mutable is shared across iterations.
//!
//! # Failure semantics
//!
//! Dispatch failures and malformed results are fatal: the error propagates
//! out of [`ExperimentDriver::run`] and the machine halts where it stands.
//! There is no automated physical cleanup - the arm, lids, and plates stay
//! wherever the failed workflow left them, and recovery is a human decision.
//! Provenance-ledger write failures are the one recoverable class: logged
//! and swallowed inside [`ProvenanceLedger`].
//!
//! # Example
//!
//! ```rust,ignore
//! use plateflow::config::ExperimentConfig;
//! use plateflow::experiment::ExperimentDriver;
//!
//! let config = ExperimentConfig::load_from("config/substrate_exp3.toml")?;
//! let mut driver = ExperimentDriver::new(config, engine)?;
//! driver.run().await?;
//! ```

use crate::config::ExperimentConfig;
use crate::error::FlowResult;
use crate::experiment::columns::{transfer_columns, TransferColumns};
use crate::experiment::incubation::{Clock, IncubationWaiter, SystemClock};
use crate::experiment::ledger::ProvenanceLedger;
use crate::experiment::resources::ResourceCycle;
use crate::experiment::run::ExperimentRun;
use crate::experiment::state::{ExperimentState, LoopState, Phase};
use crate::workflow::{Payload, ProtocolTemplate, WorkflowDispatcher, WorkflowEngine};
use anyhow::{bail, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

/// Top-level driver for one experiment run.
pub struct ExperimentDriver<E: WorkflowEngine, C: Clock = SystemClock> {
    config: ExperimentConfig,
    run: ExperimentRun,
    dispatcher: WorkflowDispatcher<E>,
    waiter: IncubationWaiter<C>,
    ledger: ProvenanceLedger,
    protocol: ProtocolTemplate,
    state: ExperimentState,
    loops: LoopState,
    tip_box: ResourceCycle,
    plate_stack: ResourceCycle,
    lid_nest: ResourceCycle,
    /// Hold applied by the next incubation wait
    incubation: Duration,
}

impl<E: WorkflowEngine> ExperimentDriver<E, SystemClock> {
    /// Build a driver on the system clock.
    ///
    /// Validates the configuration and registers the experiment run; nothing
    /// is dispatched until [`run`](Self::run).
    pub fn new(config: ExperimentConfig, engine: E) -> FlowResult<Self> {
        Self::with_clock(config, engine, SystemClock)
    }
}

impl<E: WorkflowEngine, C: Clock> ExperimentDriver<E, C> {
    /// Build a driver on a caller-provided clock (tests inject a mock here).
    pub fn with_clock(config: ExperimentConfig, engine: E, clock: C) -> FlowResult<Self> {
        config.validate()?;

        let run = ExperimentRun::register(
            config.experiment.label.clone(),
            config.experiment.campaign.clone(),
        );
        let tip_box = config.tip_box_cycle()?;
        let plate_stack = config.plate_stack_cycle()?;
        let lid_nest = config.lid_nest_cycle()?;
        let waiter = IncubationWaiter::with_clock(clock)
            .poll_interval(config.incubation.poll_interval);
        let ledger = ProvenanceLedger::new(&config.provenance.csv_directory);
        let protocol = ProtocolTemplate::new(&config.protocol.template);
        let incubation = if config.incubation.initial.is_zero() {
            config.incubation.between_readings
        } else {
            config.incubation.initial
        };

        Ok(Self {
            config,
            run,
            dispatcher: WorkflowDispatcher::new(engine),
            waiter,
            ledger,
            protocol,
            state: ExperimentState::Init,
            loops: LoopState::new(),
            tip_box,
            plate_stack,
            lid_nest,
            incubation,
        })
    }

    /// The run identity registered at construction.
    pub fn run_info(&self) -> &ExperimentRun {
        &self.run
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ExperimentState {
        self.state
    }

    /// Current loop counters.
    pub fn loop_state(&self) -> &LoopState {
        &self.loops
    }

    /// Execute the experiment to completion.
    ///
    /// # Errors
    ///
    /// Any workflow dispatch failure, protocol rendering failure, or missing
    /// named read step is fatal and halts the machine in place.
    pub async fn run(&mut self) -> Result<()> {
        if !self.state.can_begin() {
            bail!(
                "cannot start experiment: driver in {} state (expected Init)",
                self.state
            );
        }

        info!(
            experiment_id = %self.run.experiment_id,
            label = %self.run.label,
            campaign = %self.run.campaign,
            total_loops = self.config.experiment.total_loops,
            cycle_length = %self.config.experiment.cycle_length,
            "starting experiment"
        );

        while self.loops.loop_num < self.config.experiment.total_loops {
            let phase = Phase::classify(self.loops.loop_num, self.config.experiment.cycle_length);
            self.loops.enter(phase);
            self.state = ExperimentState::from_phase(phase);
            info!(
                loop_num = self.loops.loop_num,
                plate = self.loops.plate_num,
                %phase,
                "outer iteration"
            );

            match phase {
                Phase::FirstCycle => self.run_first_cycle().await?,
                Phase::WithinPlate => self.run_within_plate().await?,
                Phase::BetweenPlate => self.run_between_plate().await?,
            }

            self.run_reading_cycle().await?;
            self.loops.advance_loop();
        }

        self.state = ExperimentState::Finalize;
        info!(loops = self.loops.loop_num, "all loops complete, finalizing");
        let payload = self.base_payload();
        self.dispatcher
            .run(&self.config.workflows.finalize, &payload)
            .await?;

        self.state = ExperimentState::Done;
        info!(experiment_id = %self.run.experiment_id, "experiment complete");
        Ok(())
    }

    /// Iteration 0: plate prep and first inoculation, then the initial hold.
    async fn run_first_cycle(&mut self) -> Result<()> {
        let payload = self.base_payload();
        self.dispatcher
            .run(&self.config.workflows.first_cycle, &payload)
            .await?;

        if !self.config.incubation.initial.is_zero() {
            self.waiter.wait(self.config.incubation.initial).await;
        }
        // Subsequent holds run at the between-readings duration
        self.incubation = self.config.incubation.between_readings;
        Ok(())
    }

    /// Within-plate transfer: column mapping, fresh tip rack, rendered
    /// protocol, one liquid-handling dispatch.
    async fn run_within_plate(&mut self) -> Result<()> {
        let columns = transfer_columns(self.loops.loop_num, self.config.experiment.cycle_length);
        let tip_slot = self.tip_box.advance();
        info!(
            source = ?columns.source,
            destination = ?columns.destination,
            tip_slot,
            "within-plate transfer"
        );

        let protocol_path = self.protocol.render(&protocol_substitutions(tip_slot, &columns))?;
        let payload = self
            .base_payload()
            .with("source_wells_list", columns.source_wells())
            .with("destination_wells_list", columns.destination_wells())
            .with("current_protocol", protocol_path.display().to_string());

        self.dispatcher
            .run(&self.config.workflows.within_plate, &payload)
            .await?;
        self.loops.record_transfer();
        Ok(())
    }

    /// Between-plate boundary: rotate stack and lid nest, reset per-plate
    /// counters, fetch a fresh plate.
    async fn run_between_plate(&mut self) -> Result<()> {
        let stack_slot = self.plate_stack.advance();
        let nest_slot = self.lid_nest.advance();
        self.loops.begin_new_plate();
        info!(
            plate = self.loops.plate_num,
            plate_stack = stack_slot,
            lid_nest = nest_slot,
            "between-plate transfer"
        );

        let payload = self.base_payload();
        self.dispatcher
            .run(&self.config.workflows.between_plate, &payload)
            .await?;
        Ok(())
    }

    /// The bounded inner loop: read, record provenance, then either return
    /// the plate to the incubator and hold, or (final reading) route it to
    /// the liquid handler for the next transfer.
    async fn run_reading_cycle(&mut self) -> Result<()> {
        let total = self.config.experiment.inner_loop_count;

        for reading_index in 0..total {
            let final_reading = reading_index + 1 == total;
            let filename = self
                .run
                .reading_filename(&self.loops, Utc::now().timestamp());
            let payload = self
                .base_payload()
                .with("bmg_data_output_name", filename.as_str());

            let result = self
                .dispatcher
                .run(&self.config.workflows.read, &payload)
                .await?;
            // Timestamps come only from the result of the dispatch just made
            let timestamp = result.step_end_time(&self.config.workflows.read_step)?;
            self.ledger
                .append(&self.run.experiment_id, &filename, timestamp);
            self.loops.record_reading();

            if final_reading {
                self.dispatcher
                    .run(&self.config.workflows.to_liquid_handler, &payload)
                    .await?;
            } else {
                self.dispatcher
                    .run(&self.config.workflows.to_incubator, &payload)
                    .await?;
                self.waiter.wait(self.incubation).await;
            }
        }
        Ok(())
    }

    /// Project the current loop state, resource indices, and fixed location
    /// identifiers into a fresh payload.
    fn base_payload(&self) -> Payload {
        let mut payload = Payload::new();
        for (key, value) in &self.config.locations {
            payload.insert(key.clone(), value.as_str());
        }
        for (key, value) in &self.config.parameters {
            payload.insert(key.clone(), value.clone());
        }
        payload.insert("experiment_id", self.run.experiment_id.as_str());
        payload.insert("loop_num", self.loops.loop_num);
        payload.insert("plate_num", self.loops.plate_num);
        payload.insert("tip_box_location", self.tip_box.current());
        payload.insert("plate_stack_location", self.plate_stack.current());
        payload.insert("lid_nest_location", self.lid_nest.current());
        payload.insert("incubation_seconds", self.incubation.as_secs());
        payload
    }
}

/// `$token` substitutions for the liquid-handler protocol template.
fn protocol_substitutions(
    tip_slot: u32,
    columns: &TransferColumns,
) -> BTreeMap<String, String> {
    let mut substitutions = BTreeMap::new();
    substitutions.insert("tip_location".to_string(), tip_slot.to_string());
    substitutions.insert(
        "source_columns".to_string(),
        render_columns(&columns.source),
    );
    substitutions.insert(
        "destination_columns".to_string(),
        render_columns(&columns.destination),
    );
    substitutions
}

fn render_columns(columns: &[u32; 3]) -> String {
    serde_json::to_string(columns).unwrap_or_default()
}
