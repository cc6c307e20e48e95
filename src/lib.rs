// src/lib.rs

// ----------------------------------------------------------------------------
// drop_sandbox: real-time rigid-body sandbox core
// ----------------------------------------------------------------------------
// Spheres and boxes fall onto a static floor, collide, play hit sounds, and
// drive the transforms of paired render proxies. Rendering, GUI, and asset
// loading live behind the `SceneGraph` and `AudioVoice` seams.

pub mod error;
pub use error::{Error, Result};

// Simulation core
pub mod arena;
pub mod body;
pub mod broadphase;
pub mod events;
pub mod material;
pub mod narrowphase;
pub mod physics;
pub mod shape;
pub mod solver;

// Sandbox layer
pub mod audio;
pub mod config;
pub mod controls;
pub mod registry;
pub mod sandbox;
pub mod scene;
pub mod spawner;
pub mod time;

#[cfg(all(feature = "rodio", not(target_arch = "wasm32")))]
pub mod sound;

pub use audio::{AudioVoice, HitSoundDispatcher, RecordingVoice, SilentVoice, VoicePool};
pub use body::{BodyHandle, RigidBody, SleepState};
pub use broadphase::BroadphaseKind;
pub use config::SandboxConfig;
pub use controls::{Command, ControlSurface};
pub use events::{CollisionEvent, ListenerHandle};
pub use material::{ContactRule, MaterialId, MaterialRegistry};
pub use physics::{PhysicsWorld, StepReport};
pub use registry::{PairId, PairedObject, PairedRegistry};
pub use sandbox::{Sandbox, TeardownReport, TickReport};
pub use scene::{HeadlessScene, ProxyHandle, RenderProxy, SceneGraph};
pub use shape::{BodyShape, ShapeKind};
pub use time::{Clock, FrameTimer, ManualClock, MonotonicClock};

#[cfg(all(feature = "rodio", not(target_arch = "wasm32")))]
pub use sound::RodioVoice;
