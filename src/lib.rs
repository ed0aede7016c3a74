//! Shader Effect - Gestionnaire d'effets de shaders multi-étages
//!
//! Cette bibliothèque charge des shaders via un service de traduction,
//! compile chaque étage (vertex, fragment, geometry), les lie en un seul
//! programme et gère le binding des uniforms et des blocs d'uniforms
//! à travers la convention de suffixes `VS` / `PS` / `GS`.

pub mod stage;
pub mod translate;
pub mod gpu;
pub mod effect;
pub mod uniform;
pub mod config;

pub use stage::*;
pub use translate::*;
pub use gpu::*;
pub use effect::*;
pub use uniform::*;
pub use config::*;

/// Version de la bibliothèque
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
