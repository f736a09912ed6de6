//! Concrete resource layouts built on `cw-serializer`.
//!
//! Things live in a [`ThingGraph`] arena and refer to each other by
//! [`ThingRef`] index, so shared and cyclic references need no ownership
//! tricks. Each layout lists its fields once; revision-dependent fields carry
//! their presence rules as data next to the type.

pub mod material;
pub mod parts;
pub mod region;
pub mod scene;
pub mod thing;

pub use material::{Fuzz, GfxMaterialHeader, Refraction, TEXTURE_SLOTS};
pub use parts::{PBody, PGroup, PPos, PRenderMesh};
pub use region::RegionOverride;
pub use scene::{Level, ThingGraph};
pub use thing::{thing_ref, Part, Thing, ThingRef};
