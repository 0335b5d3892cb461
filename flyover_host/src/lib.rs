//! Flyover Host Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the Flyover overlay
//! engine to drive both a **real map host** (a GPU renderer anchored to a
//! basemap) and a **simulated host** (in-memory resource ledger) with the
//! same code.
//!
//! # Core Concept: The Driven Host
//!
//! The engine never owns a render loop, a GPU device, or a wall clock. It
//! consumes three narrow traits and nothing else:
//! - Time (`now()`)
//! - GPU resources + camera surface (`create_mesh()`, `write_instances()`,
//!   `apply_camera()`, `request_redraw()`)
//! - Frame callbacks (`schedule_frame()`, `cancel_frame()`)
//!
//! By injecting a virtual clock and a mock host, any animation bug becomes a
//! deterministic unit test.
//!
//! # Example
//!
//! ```ignore
//! use flyover_host::{HostContext, RenderHost, FrameScheduler};
//!
//! fn frame<Ctx: HostContext, H: RenderHost + FrameScheduler>(
//!     ctx: &Ctx,
//!     host: &mut H,
//! ) {
//!     let now = ctx.now();
//!     // ... advance animators to `now`, then:
//!     host.request_redraw();
//!     host.schedule_frame();
//! }
//! ```

mod context;
mod render;
mod types;
mod error;
mod system_impl;

pub use context::HostContext;
pub use render::{FrameScheduler, RenderHost};
pub use types::{CameraPose, InstanceBufferHandle, InstanceRecord, MeshData, MeshHandle};
pub use error::HostError;
pub use system_impl::SystemContext;
