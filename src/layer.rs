//! Motion layers and the arbitration pass.
//!
//! A layer owns a set of mutually exclusive units and runs one arbitration
//! pass per tick:
//!
//! 1. The active unit is asked whether it continues. A unit whose animator
//!    wandered into a state it does not own is forced out.
//! 2. Startable units are polled in priority order (registration order
//!    breaks ties). Polling stops below the active unit's priority. A
//!    candidate that wants to start must be let through by the active unit.
//! 3. The active unit updates. A hand-off it requests is honored in the
//!    same tick.
//!
//! At most one unit per layer is active once the pass returns.

use std::cmp::Reverse;

use bevy::prelude::*;

use crate::motion::{
    ActiveMotionInfo, LayerStatus, Motion, MotionContext, MotionHandle, MotionPhase,
};

/// Hand-offs followed within one tick before the layer gives up.
const MAX_HANDOFFS: usize = 4;

/// A set of mutually exclusive units mapped to one animation layer.
pub struct MotionLayer {
    name: String,
    index: usize,
    motions: Vec<Box<dyn Motion>>,
    active: Option<usize>,
    empty_time: f32,
}

impl MotionLayer {
    /// Create an empty layer.
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            motions: Vec::new(),
            active: None,
            empty_time: 0.0,
        }
    }

    /// Layer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layer index in its controller.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Units in registration order.
    pub fn motions(&self) -> impl Iterator<Item = &dyn Motion> {
        self.motions.iter().map(|m| m.as_ref())
    }

    /// Number of registered units.
    pub fn len(&self) -> usize {
        self.motions.len()
    }

    /// Whether the layer has no units.
    pub fn is_empty(&self) -> bool {
        self.motions.is_empty()
    }

    /// Unit at a registration index.
    pub fn get(&self, index: usize) -> Option<&dyn Motion> {
        self.motions.get(index).map(|m| m.as_ref())
    }

    /// Mutable unit at a registration index.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut (dyn Motion + 'static)> {
        self.motions.get_mut(index).map(|m| m.as_mut())
    }

    /// Registration index of the unit named `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.motions.iter().position(|m| m.base().name() == name)
    }

    /// The running unit.
    pub fn active(&self) -> Option<&dyn Motion> {
        self.active.map(|i| self.motions[i].as_ref())
    }

    /// Registration index of the running unit.
    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    /// Seconds the layer has been without an active unit.
    pub fn empty_time(&self) -> f32 {
        self.empty_time
    }

    /// Snapshot handed to units through the context.
    pub fn status(&self) -> LayerStatus {
        let active = self.active.map(|i| {
            let base = self.motions[i].base();
            ActiveMotionInfo {
                priority: base.priority,
                category: base.category,
                handle: base.handle(),
            }
        });
        LayerStatus {
            index: self.index,
            active,
            empty_time: self.empty_time,
            active_time: self
                .active
                .map(|i| self.motions[i].base().active_time())
                .unwrap_or(0.0),
        }
    }

    /// Register a unit, returning its handle.
    pub(crate) fn push(&mut self, mut motion: Box<dyn Motion>) -> MotionHandle {
        let handle = MotionHandle::new(self.index, self.motions.len());
        motion.base_mut().handle = handle;
        self.motions.push(motion);
        handle
    }

    pub(crate) fn motions_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Motion>> {
        self.motions.iter_mut()
    }

    /// Run one arbitration pass.
    pub fn tick(&mut self, ctx: &mut MotionContext, dt: f32, tick: u32) {
        for motion in &mut self.motions {
            motion.base_mut().is_activated_frame = false;
        }

        let retired = self.check_active(ctx);
        self.poll(ctx, retired);

        if self.active.is_some() {
            self.run_update(ctx, dt, tick);
        }
        if self.active.is_none() {
            self.empty_time += dt;
        }
    }

    /// Let the active unit rewrite the animation root motion.
    pub fn adjust_root_motion(
        &mut self,
        ctx: &mut MotionContext,
        dt: f32,
        tick: u32,
        movement: &mut Vec3,
        rotation: &mut Quat,
    ) {
        let Some(index) = self.active else {
            return;
        };
        ctx.layer = self.status();
        self.motions[index].adjust_root_motion(ctx, dt, tick, movement, rotation);
    }

    /// Deactivate the running unit, if any.
    pub fn deactivate_active(&mut self, ctx: &mut MotionContext) {
        if let Some(index) = self.active {
            self.deactivate(index, ctx);
        }
    }

    /// Deliver a camera post-update to a subscribed unit.
    pub(crate) fn camera_updated(
        &mut self,
        index: usize,
        ctx: &mut MotionContext,
        frame: &crate::camera::CameraFrame,
        dt: f32,
    ) -> Quat {
        if self.active != Some(index) {
            return Quat::IDENTITY;
        }
        ctx.layer = self.status();
        self.motions[index].on_camera_updated(ctx, frame, dt)
    }

    /// Continue-or-yield check for the active unit. Returns the unit retired this tick.
    fn check_active(&mut self, ctx: &mut MotionContext) -> Option<usize> {
        let index = self.active?;
        ctx.layer = self.status();

        let desynced = {
            let motion = &mut self.motions[index];
            let layer = motion.base().animator_layer;
            let state = ctx.animator.state_id(layer);
            let base = motion.base_mut();
            if base.owns_state(state) {
                base.is_animator_active = true;
                false
            } else {
                base.is_animator_active && !ctx.animator.is_in_transition(layer)
            }
        };

        let motion = &mut self.motions[index];
        if motion.should_continue(ctx) {
            if !desynced {
                return None;
            }
            warn!(
                "motion `{}` on layer `{}` lost its animator state (now {:?}), forcing deactivation",
                motion.base().name(),
                self.name,
                ctx.animator.state_id(motion.base().animator_layer),
            );
        } else {
            debug!("motion `{}` on layer `{}` finished", motion.base().name(), self.name);
        }

        self.deactivate(index, ctx);
        Some(index)
    }

    /// Poll candidates in priority order and promote the first that starts.
    fn poll(&mut self, ctx: &mut MotionContext, retired: Option<usize>) {
        let mut order: Vec<usize> = (0..self.motions.len()).collect();
        // Stable: equal priorities keep registration order.
        order.sort_by_key(|&i| Reverse(self.motions[i].base().priority));

        // Units that stopped this tick stay out until the next one.
        let mut stopped: Vec<usize> = retired.into_iter().collect();
        let mut previous = retired;
        for index in order {
            if Some(index) == self.active || stopped.contains(&index) {
                continue;
            }
            if !self.motions[index].base().is_startable {
                continue;
            }
            if let Some(active) = self.active {
                if self.motions[index].base().priority < self.motions[active].base().priority {
                    break;
                }
            }

            ctx.layer = self.status();
            if !self.motions[index].can_activate(ctx) {
                continue;
            }

            if let Some(active) = self.active {
                let (current, candidate) = two_mut(&mut self.motions, active, index);
                if !current.can_interrupt(candidate.base(), ctx) {
                    continue;
                }
                debug!(
                    "motion `{}` interrupts `{}` on layer `{}`",
                    candidate.base().name(),
                    current.base().name(),
                    self.name
                );
                self.deactivate(active, ctx);
                stopped.push(active);
                previous = Some(active);
            }

            if self.activate(index, previous, ctx) {
                return;
            }
        }
    }

    /// Update the active unit, following hand-offs.
    fn run_update(&mut self, ctx: &mut MotionContext, dt: f32, tick: u32) {
        for _ in 0..=MAX_HANDOFFS {
            let Some(index) = self.active else {
                return;
            };

            ctx.handoff = None;
            ctx.layer = self.status();
            let motion = &mut self.motions[index];
            motion.base_mut().output.reset();
            motion.base_mut().active_time += dt;
            motion.update(ctx, dt, tick);

            let Some(target) = ctx.handoff.take() else {
                return;
            };
            let Some(target_index) = self.index_of(&target) else {
                warn!(
                    "motion `{}` handed off to unknown motion `{}` on layer `{}`",
                    self.motions[index].base().name(),
                    target,
                    self.name
                );
                return;
            };
            if target_index == index {
                return;
            }

            debug!(
                "motion `{}` hands off to `{}` on layer `{}`",
                self.motions[index].base().name(),
                target,
                self.name
            );
            self.deactivate(index, ctx);
            if !self.activate(target_index, Some(index), ctx) {
                return;
            }
        }

        warn!("hand-off chain on layer `{}` exceeded {MAX_HANDOFFS} steps", self.name);
    }

    fn activate(&mut self, index: usize, previous: Option<usize>, ctx: &mut MotionContext) -> bool {
        ctx.layer = self.status();

        let (motion, previous) = match previous.filter(|&p| p != index) {
            Some(p) => {
                let (motion, previous) = two_mut(&mut self.motions, index, p);
                (motion, Some(previous.base()))
            }
            None => (&mut self.motions[index], None),
        };

        motion.base_mut().reset_runtime();
        motion.base_mut().phase = MotionPhase::Activating;

        if !motion.activate(previous, ctx) {
            let base = motion.base_mut();
            warn!("motion `{}` failed to activate on layer `{}`", base.name(), self.name);
            ctx.camera.unsubscribe(base.handle());
            base.reset_runtime();
            base.phase = MotionPhase::Inactive;
            return false;
        }

        let base = motion.base_mut();
        base.phase = MotionPhase::Active;
        base.is_activated_frame = true;
        debug!("motion `{}` activated on layer `{}`", base.name(), self.name);

        self.active = Some(index);
        self.empty_time = 0.0;
        true
    }

    fn deactivate(&mut self, index: usize, ctx: &mut MotionContext) {
        ctx.layer = self.status();

        let motion = &mut self.motions[index];
        motion.base_mut().phase = MotionPhase::Deactivating;
        motion.deactivate(ctx);

        let base = motion.base_mut();
        ctx.camera.unsubscribe(base.handle());
        base.reset_runtime();
        base.phase = MotionPhase::Inactive;
        debug!("motion `{}` deactivated on layer `{}`", base.name(), self.name);

        if self.active == Some(index) {
            self.active = None;
            self.empty_time = 0.0;
        }
    }
}

/// Two distinct mutable elements of a slice.
fn two_mut<T>(slice: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b, "two_mut needs distinct indices");
    if a < b {
        let (left, right) = slice.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = slice.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
