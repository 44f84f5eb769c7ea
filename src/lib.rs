//! # `msg_motion_controller`
//!
//! Priority-arbitrated motion layers for third-person characters, with a
//! root-motion adjustment pipeline and reach blending.
//!
//! This crate provides the locomotion layer that sits between an animation
//! state machine and a physics body:
//! - Self-contained motion units (idle, walk/run, jump, climb, vault, ...)
//!   decide every fixed tick whether they should run
//! - Each motion layer runs at most one unit; higher priority wins
//! - Running units rewrite the animation's root motion before it is applied
//! - Reach requests blend the character onto precise targets such as ledges
//! - Smoothed input feeds blend trees without jitter
//! - Abstracts the physics backend (headless and Rapier3D included)
//!
//! ## Architecture
//!
//! Each fixed tick:
//! 1. Sensors refresh the body snapshot and latch input edges
//! 2. Every [`MotionController`](controller::MotionController) arbitrates its
//!    layers: the running unit keeps or yields its layer, candidates of
//!    higher priority may take it over
//! 3. Root motion is adjusted by the running units, their outputs are added
//!    and the result is applied through the backend
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use msg_motion_controller::prelude::*;
//!
//! let controller = standard_controller().unwrap();
//! assert!(controller.motion("running_jump").is_some());
//!
//! // Spawn it on a character; the remaining components are required ones:
//! // commands.spawn((controller, Transform::default()));
//! ```

use bevy::prelude::*;

pub mod animator;
pub mod backend;
pub mod camera;
pub mod collision;
pub mod config;
pub mod controller;
pub mod detection;
pub mod error;
pub mod intent;
pub mod layer;
pub mod motion;
pub mod motions;
pub mod reach;
pub mod smoothing;
pub mod state;
pub mod systems;

#[cfg(feature = "rapier3d")]
pub mod rapier;

#[cfg(test)]
mod test_support;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::animator::{AnimatorBridge, AnimatorRegistry, AnimatorStateId, MotionAnimator};
    pub use crate::backend::{HeadlessBackend, MotionBackend};
    pub use crate::camera::{CameraFrame, MotionCamera};
    pub use crate::collision::{CollisionData, GroundFrame};
    pub use crate::config::{BodyConfig, CharacterBody};
    pub use crate::controller::{MotionConfigError, MotionController, RootMotion};
    pub use crate::detection::{EdgeHit, EdgeProbe, GeometryProbe, StaticBox, StaticGeometry};
    pub use crate::error::MotionError;
    pub use crate::intent::{MotionInput, actions};
    pub use crate::motion::{Motion, MotionBase, MotionCategory, MotionContext, MotionOutput, Stance};
    pub use crate::motions::{
        Climb, ClimbConfig, Fall, FallConfig, Idle, IdleConfig, Jump, JumpConfig, LaunchMomentum, Punch,
        PunchConfig, RunningJump, RunningJumpConfig, Slide, SlideConfig, Sneak, SneakConfig, Vault,
        VaultConfig, WalkRun, WalkRunConfig, standard_controller,
    };
    pub use crate::reach::{ReachRequest, ReachWindow};
    pub use crate::smoothing::{InputSnapshot, SmoothedInput, SmoothedSignal};
    pub use crate::state::{ActiveMotions, Airborne, Grounded};
    pub use crate::systems::MotionTick;
    pub use crate::{MotionControllerPlugin, MotionControllerSet};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::{Rapier3dBackend, Rapier3dCharacterBundle, SuspendedGravity};
}

/// System sets of the controller, in execution order.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionControllerSet {
    /// Input edges, ground probe and body snapshot (`FixedUpdate`).
    Sensors,
    /// Motion arbitration (`FixedUpdate`).
    Arbitration,
    /// Root-motion adjustment, output application, state markers (`FixedUpdate`).
    Application,
    /// Camera post-update hooks (`PostUpdate`, before transform propagation).
    CameraSync,
}

/// Main plugin for the motion controller.
///
/// This plugin is generic over a physics backend `B` which provides the actual
/// physics operations (raycasting, impulses, moving the body, etc.).
///
/// # Type Parameters
/// - `B`: The physics backend implementation (e.g., `HeadlessBackend`)
///
/// # Examples
///
/// ```rust
/// use bevy::prelude::*;
/// use msg_motion_controller::prelude::*;
///
/// let mut app = App::new();
/// app.add_plugins(MinimalPlugins)
///     .add_plugins(MotionControllerPlugin::<HeadlessBackend>::default());
/// ```
pub struct MotionControllerPlugin<B: backend::MotionBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::MotionBackend> Default for MotionControllerPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::MotionBackend> Plugin for MotionControllerPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<config::CharacterBody>();
        app.register_type::<config::BodyConfig>();
        app.register_type::<animator::MotionAnimator>();
        app.register_type::<intent::MotionInput>();
        app.register_type::<camera::MotionCamera>();
        app.register_type::<controller::RootMotion>();
        app.register_type::<state::Grounded>();
        app.register_type::<state::Airborne>();
        app.register_type::<state::ActiveMotions>();
        app.register_type::<systems::MotionTick>();

        app.init_resource::<systems::MotionTick>();

        // Add the physics backend plugin
        app.add_plugins(B::plugin());

        app.configure_sets(
            FixedUpdate,
            (
                MotionControllerSet::Sensors,
                MotionControllerSet::Arbitration,
                MotionControllerSet::Application,
            )
                .chain(),
        );
        app.configure_sets(
            PostUpdate,
            MotionControllerSet::CameraSync.before(bevy::transform::TransformSystem::TransformPropagate),
        );

        app.add_systems(First, systems::begin_motion_frame);

        // Core systems run in FixedUpdate so arbitration sees a stable timestep
        app.add_systems(
            FixedUpdate,
            (
                systems::advance_motion_tick,
                systems::update_motion_input,
                systems::update_character_body::<B>,
            )
                .chain()
                .in_set(MotionControllerSet::Sensors),
        );
        app.add_systems(
            FixedUpdate,
            systems::run_motion_controllers::<B>.in_set(MotionControllerSet::Arbitration),
        );
        app.add_systems(
            FixedUpdate,
            (systems::apply_motion_output::<B>, systems::sync_state_markers)
                .chain()
                .in_set(MotionControllerSet::Application),
        );

        app.add_systems(
            PostUpdate,
            systems::dispatch_camera_hooks::<B>.in_set(MotionControllerSet::CameraSync),
        );
    }
}
