use crate::config::SimulatedToolConfig;
use crate::error::{CollectError, CollectResult};
use crate::sample::Sample;
use crate::source::{DataSource, SourceOutputs};
use glam::{DQuat, DVec3};
use std::f64::consts::TAU;
use trk_clock::{AcquisitionClock, Timestamp};
use trk_transform::Transform3D;

/// Synthetic tracker: every tool turns on a circle in the XY plane of the tracker, facing the
/// direction of travel. Timestamps come from the acquisition clock.
pub struct SimulatedTracker {
    id: String,
    tools: Vec<SimulatedToolConfig>,
    outputs: Option<SourceOutputs>,
    running: bool,
}

impl SimulatedTracker {
    pub fn new(id: impl Into<String>, tools: Vec<SimulatedToolConfig>) -> Self {
        Self {
            id: id.into(),
            tools,
            outputs: None,
            running: false,
        }
    }

    /// Pose of a tool at `time`.
    pub fn tool_pose(tool: &SimulatedToolConfig, time: Timestamp) -> Transform3D {
        let angle = TAU * time / tool.period_s;
        let (cx, cy, cz) = tool.center;
        let position = DVec3::new(
            cx + tool.radius * angle.cos(),
            cy + tool.radius * angle.sin(),
            cz,
        );
        Transform3D::from_rotation_translation(DQuat::from_rotation_z(angle), position)
    }
}

impl DataSource for SimulatedTracker {
    fn id(&self) -> &str {
        &self.id
    }

    fn connect(&mut self, outputs: &SourceOutputs) -> CollectResult<()> {
        if let Some(tool) = self.tools.iter().find(|t| !outputs.has_channel(&t.channel)) {
            return Err(CollectError::source_failure(
                &self.id,
                format!("tool channel {} is not configured", tool.channel),
            ));
        }
        self.outputs = Some(outputs.clone());
        Ok(())
    }

    fn disconnect(&mut self) -> CollectResult<()> {
        self.outputs = None;
        self.running = false;
        Ok(())
    }

    fn start(&mut self, _clock: &AcquisitionClock) -> CollectResult<()> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self, _clock: &AcquisitionClock) -> CollectResult<()> {
        self.running = false;
        Ok(())
    }

    fn update(&mut self, clock: &AcquisitionClock) -> CollectResult<()> {
        if !self.running {
            return Ok(());
        }
        let outputs = self
            .outputs
            .as_ref()
            .ok_or_else(|| CollectError::source_failure(&self.id, "not connected"))?;

        let now = clock.now();
        for tool in &self.tools {
            let sample = if tool.visible {
                Sample::from_pose(now, Self::tool_pose(tool, now), true)
            } else {
                // out of view: the tracker still reports a frame, flagged invalid
                Sample::from_pose(now, Transform3D::IDENTITY, false)
            };
            outputs.push(&tool.channel, sample)?;
        }
        Ok(())
    }
}
