//! Perception stack: sensor records in, belief state out
pub mod filters;
pub mod localization;
pub mod sensors;

use self::localization::{Localizer, PriorFix};
use self::sensors::{interpret, SensorMessage, Token};
use crate::common::types::Tick;
use crate::config::AgentConfig;
use crate::error::{CoreError, CoreResult};
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use crate::world::{LandmarkTable, WorldView};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Perception stack for the agent
pub struct PerceptionStack {
    base: LifecycleNodeBase,
    config: Arc<AgentConfig>,
    landmarks: LandmarkTable,
    localizer: Localizer,
    /// Tick of the last see message the estimates were derived from
    localized_see: Option<Tick>,
}

impl PerceptionStack {
    /// Create a new perception stack
    pub fn new(config: Arc<AgentConfig>) -> Self {
        let localizer = Localizer::new(
            config.localization.clone(),
            config.field.clone(),
            config.physics.player_max_speed,
        );
        PerceptionStack {
            base: LifecycleNodeBase::new("perception_stack"),
            landmarks: LandmarkTable::new(config.landmarks.clone()),
            localizer,
            config,
            localized_see: None,
        }
    }

    pub fn landmarks(&self) -> &LandmarkTable {
        &self.landmarks
    }

    pub fn localizer(&self) -> &Localizer {
        &self.localizer
    }

    /// Interpret one tokenized record and merge it.
    ///
    /// A record that matches no known shape leaves the world untouched.
    pub fn ingest(&mut self, world: &mut WorldView, record: &Token) -> CoreResult<()> {
        let message = interpret(record)?;
        self.ingest_message(world, &message);
        Ok(())
    }

    pub fn ingest_message(&mut self, world: &mut WorldView, message: &SensorMessage) {
        world.apply(message, &self.landmarks);
    }

    /// Re-estimate position and heading from the newest see message, then
    /// place the objects it reported on the field. A see message is used
    /// at most once.
    pub fn update_estimates(&mut self, world: &mut WorldView) {
        let Some((observations, seen_at)) = world
            .landmarks
            .latest()
            .map(|(observations, tick)| (observations.clone(), tick))
        else {
            return;
        };
        if self.localized_see == Some(seen_at) {
            return;
        }
        self.localized_see = Some(seen_at);

        let prior = world
            .position
            .latest()
            .map(|(position, tick)| PriorFix {
                position: *position,
                tick,
            });

        match self.localizer.estimate_position(&observations, prior, seen_at) {
            Ok(position) => {
                debug!(tick = seen_at, %position, "position fix");
                world.position.update(position, seen_at);
            }
            Err(err @ CoreError::AmbiguousEstimate(_)) => {
                debug!(tick = seen_at, "position unchanged: {}", err)
            }
            Err(err) => warn!(tick = seen_at, "localization failed: {}", err),
        }

        let self_max_age = self.config.planner.self_max_age;
        if let Some(position) = world.position.get_copied(seen_at, self_max_age) {
            match self
                .localizer
                .estimate_heading(&observations, position, world.body.neck_angle)
            {
                Ok(heading) => {
                    debug!(tick = seen_at, heading, "heading fix");
                    world.heading.update(heading, seen_at);
                    world.body.pending_turn = 0.0;
                }
                Err(err) => debug!(tick = seen_at, "heading unchanged: {}", err),
            }
        }

        world.resolve_objects(self_max_age, self.config.localization.velocity_window);
    }
}

impl LifecycleNode for PerceptionStack {
    fn on_configure(&mut self) -> CoreResult<()> {
        info!(landmarks = self.landmarks.len(), "Configuring perception stack");
        if self.landmarks.is_empty() {
            return Err(CoreError::Lifecycle {
                component: self.base.name.clone(),
                reason: "landmark table is empty".to_string(),
            });
        }
        self.base.transition(State::Unconfigured, State::Inactive)
    }

    fn on_activate(&mut self) -> CoreResult<()> {
        info!("Activating perception stack");
        self.base.transition(State::Inactive, State::Active)
    }

    fn on_deactivate(&mut self) -> CoreResult<()> {
        info!("Deactivating perception stack");
        self.base.transition(State::Active, State::Inactive)
    }

    fn on_cleanup(&mut self) -> CoreResult<()> {
        info!("Cleaning up perception stack");
        self.localized_see = None;
        self.base.transition(State::Inactive, State::Unconfigured)
    }

    fn state(&self) -> State {
        self.base.get_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::sensors::{LandmarkSighting, SeeMessage};

    fn see(tick: Tick, landmarks: Vec<LandmarkSighting>) -> SensorMessage {
        SensorMessage::See(SeeMessage {
            tick,
            landmarks,
            ..SeeMessage::default()
        })
    }

    fn sighting(id: &str, distance: f64, direction: f64) -> LandmarkSighting {
        LandmarkSighting {
            id: id.to_string(),
            distance: Some(distance),
            direction,
        }
    }

    #[test]
    fn one_landmark_leaves_position_alone() {
        let mut stack = PerceptionStack::new(Arc::new(AgentConfig::default()));
        let mut world = WorldView::new();
        world.position.update(crate::common::Coordinate::new(3.0, 4.0), 0);

        stack.ingest_message(&mut world, &see(1, vec![sighting("c", 5.0, 0.0)]));
        stack.update_estimates(&mut world);

        assert_eq!(world.position.confirmed_at(), Some(0));
        assert_eq!(world.position.get_copied(1, 5), Some(crate::common::Coordinate::new(3.0, 4.0)));
    }

    #[test]
    fn fix_from_center_and_goal_flags() {
        let mut stack = PerceptionStack::new(Arc::new(AgentConfig::default()));
        let mut world = WorldView::new();
        // Standing at the origin facing the right goal, neck straight
        let message = see(
            3,
            vec![
                sighting("gr", 52.5, 0.0),
                sighting("gl", 52.5, 180.0),
                sighting("ct", 34.0, 90.0),
            ],
        );
        stack.ingest_message(&mut world, &message);
        stack.update_estimates(&mut world);

        let position = world.position.get_copied(3, 0).unwrap();
        assert!(position.magnitude() < 1e-6, "position {}", position);
        let heading = world.heading.get_copied(3, 0).unwrap();
        assert!(heading.abs() < 1e-6);
    }

    #[test]
    fn same_see_is_not_localized_twice() {
        let mut stack = PerceptionStack::new(Arc::new(AgentConfig::default()));
        let mut world = WorldView::new();
        let message = see(
            3,
            vec![
                sighting("gr", 52.5, 0.0),
                sighting("gl", 52.5, 180.0),
                sighting("ct", 34.0, 90.0),
            ],
        );
        stack.ingest_message(&mut world, &message);
        stack.update_estimates(&mut world);
        world.position.clear();
        stack.update_estimates(&mut world);
        assert!(world.position.latest().is_none());
    }

    #[test]
    fn malformed_record_is_rejected() {
        let mut stack = PerceptionStack::new(Arc::new(AgentConfig::default()));
        let mut world = WorldView::new();
        let record = Token::list(vec![Token::atom("score"), Token::atom("10")]);
        assert!(matches!(
            stack.ingest(&mut world, &record),
            Err(CoreError::MalformedInput(_))
        ));
        assert_eq!(world.sim_time, 0);
    }
}
