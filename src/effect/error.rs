//! Erreurs des effets

use std::path::PathBuf;
use thiserror::Error;

use crate::gpu::GpuError;
use crate::stage::StageKind;

/// Erreurs rendues par `ShaderEffect`
#[derive(Debug, Error)]
pub enum EffectError {
    /// Échec du service de traduction, propagé tel quel
    #[error(transparent)]
    Translation(#[from] anyhow::Error),

    /// Un chargement épinglé a reçu un autre étage que celui demandé
    #[error("{path}: étage {expected} attendu, le traducteur a rendu {found}")]
    StageMismatch {
        path: PathBuf,
        expected: StageKind,
        found: StageKind,
    },

    /// Le traducteur a rendu un étage qui ne peut pas être attaché
    #[error("{path}: étage {found} non supporté")]
    UnsupportedStage { path: PathBuf, found: StageKind },

    /// Échec de compilation d'un étage
    #[error("échec de compilation du {stage} shader:\n{log}")]
    CompileError { stage: StageKind, log: String },

    /// Échec de l'édition de liens
    #[error("échec de l'édition de liens:\n{log}")]
    LinkError { log: String },

    /// Aucun étage attaché au programme
    #[error("aucun étage chargé, le programme ne peut pas être lié")]
    NoStages,

    /// Bloc d'uniforms introuvable dans le programme lié
    #[error("bloc d'uniforms '{name}' introuvable dans le programme")]
    UnknownUniformBlock { name: String },

    #[error(transparent)]
    Gpu(#[from] GpuError),
}

pub type EffectResult<T> = std::result::Result<T, EffectError>;
