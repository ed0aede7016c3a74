//! Service de traduction des shaders
//!
//! La traduction elle-même est externe : un `Translator` reçoit un chemin,
//! des flags de compilation et un dialecte cible, et rend le source traduit
//! accompagné de l'étage détecté.

pub mod source_file;

use anyhow::{anyhow, Result};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use crate::stage::StageKind;

pub use source_file::*;

bitflags! {
    /// Flags opaques transmis tels quels au traducteur
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct CompileFlags: u32 {
        /// Les constantes sont émises dans des blocs d'uniforms
        const UNIFORM_BUFFER_OBJECT = 1 << 0;

        /// Origine des coordonnées fragment en haut à gauche
        const ORIGIN_UPPER_LEFT = 1 << 1;

        /// Centre des pixels sur des coordonnées entières
        const PIXEL_CENTER_INTEGER = 1 << 2;

        /// Les constantes globales restent des uniforms simples
        const GLOBAL_CONSTS_NEVER_IN_UBO = 1 << 3;

        /// Le geometry shader est présent dans le pipeline
        const GS_ENABLED = 1 << 4;

        /// La tessellation est présente dans le pipeline
        const TESS_ENABLED = 1 << 5;

        /// Blending à double source
        const DUAL_SOURCE_BLENDING = 1 << 6;

        /// Les entrées/sorties gardent leurs noms sémantiques
        const INOUT_SEMANTIC_NAMES = 1 << 7;
    }
}

/// Dialecte du langage de shading à émettre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Le traducteur choisit lui-même
    #[default]
    Default,
    Es100,
    Es300,
    Es310,
    Glsl120,
    Glsl130,
    Glsl140,
    Glsl150,
    Glsl330,
    Glsl400,
    Glsl410,
    Glsl420,
    Glsl430,
    Glsl440,
}

impl Dialect {
    /// Directive `#version` correspondante, `None` pour `Default`
    pub fn version_directive(self) -> Option<&'static str> {
        match self {
            Dialect::Default => None,
            Dialect::Es100 => Some("#version 100"),
            Dialect::Es300 => Some("#version 300 es"),
            Dialect::Es310 => Some("#version 310 es"),
            Dialect::Glsl120 => Some("#version 120"),
            Dialect::Glsl130 => Some("#version 130"),
            Dialect::Glsl140 => Some("#version 140"),
            Dialect::Glsl150 => Some("#version 150"),
            Dialect::Glsl330 => Some("#version 330"),
            Dialect::Glsl400 => Some("#version 400"),
            Dialect::Glsl410 => Some("#version 410"),
            Dialect::Glsl420 => Some("#version 420"),
            Dialect::Glsl430 => Some("#version 430"),
            Dialect::Glsl440 => Some("#version 440"),
        }
    }

    /// Le dialecte connaît-il les geometry shaders ?
    pub fn supports_geometry(self) -> bool {
        !matches!(
            self,
            Dialect::Es100 | Dialect::Es300 | Dialect::Es310 | Dialect::Glsl120 | Dialect::Glsl130 | Dialect::Glsl140
        )
    }

    /// Le dialecte connaît-il les blocs d'uniforms ?
    pub fn supports_uniform_blocks(self) -> bool {
        !matches!(self, Dialect::Es100 | Dialect::Glsl120 | Dialect::Glsl130)
    }
}

/// Unité de shader traduite, consommée immédiatement par l'effet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedShader {
    /// Étage détecté par le traducteur
    pub stage: StageKind,

    /// Source dans le dialecte cible
    pub source: String,
}

/// Service de traduction
pub trait Translator {
    /// Traduit le fichier `path` vers `dialect`
    fn translate(&self, path: &Path, flags: CompileFlags, dialect: Dialect) -> Result<TranslatedShader>;
}

impl<T: Translator + ?Sized> Translator for &T {
    fn translate(&self, path: &Path, flags: CompileFlags, dialect: Dialect) -> Result<TranslatedShader> {
        (**self).translate(path, flags, dialect)
    }
}

impl<T: Translator + ?Sized> Translator for Box<T> {
    fn translate(&self, path: &Path, flags: CompileFlags, dialect: Dialect) -> Result<TranslatedShader> {
        (**self).translate(path, flags, dialect)
    }
}

impl<T: Translator + ?Sized> Translator for Rc<T> {
    fn translate(&self, path: &Path, flags: CompileFlags, dialect: Dialect) -> Result<TranslatedShader> {
        (**self).translate(path, flags, dialect)
    }
}

impl<T: Translator + ?Sized> Translator for Arc<T> {
    fn translate(&self, path: &Path, flags: CompileFlags, dialect: Dialect) -> Result<TranslatedShader> {
        (**self).translate(path, flags, dialect)
    }
}

/// Requête reçue par un `MemoryTranslator`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub path: PathBuf,
    pub flags: CompileFlags,
    pub dialect: Dialect,
}

/// Traducteur en mémoire : chaque chemin est associé à une unité déjà traduite
///
/// Utile pour les hôtes qui embarquent leurs shaders et pour les tests.
#[derive(Debug, Default)]
pub struct MemoryTranslator {
    units: HashMap<PathBuf, TranslatedShader>,
    requests: RefCell<Vec<TranslationRequest>>,
}

impl MemoryTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre (ou remplace) l'unité associée à `path`
    pub fn insert(&mut self, path: impl Into<PathBuf>, stage: StageKind, source: impl Into<String>) {
        self.units.insert(
            path.into(),
            TranslatedShader {
                stage,
                source: source.into(),
            },
        );
    }

    /// Variante chaînable de `insert`
    pub fn with(mut self, path: impl Into<PathBuf>, stage: StageKind, source: impl Into<String>) -> Self {
        self.insert(path, stage, source);
        self
    }

    /// Historique des requêtes reçues
    pub fn requests(&self) -> Vec<TranslationRequest> {
        self.requests.borrow().clone()
    }
}

impl Translator for MemoryTranslator {
    fn translate(&self, path: &Path, flags: CompileFlags, dialect: Dialect) -> Result<TranslatedShader> {
        self.requests.borrow_mut().push(TranslationRequest {
            path: path.to_path_buf(),
            flags,
            dialect,
        });

        self.units
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("Aucune source enregistrée pour {}", path.display()))
    }
}
