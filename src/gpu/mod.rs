//! Interface de commandes GPU
//!
//! Toutes les opérations passent par un `GpuDevice` explicite : l'effet ne
//! touche jamais à un contexte global implicite. Les sémantiques suivent
//! celles d'OpenGL :
//! - une location d'uniform non résolue vaut `-1` et les envois vers `-1` sont ignorés
//! - un index de bloc non résolu vaut `INVALID_INDEX` et les bindings vers lui sont ignorés
//! - les locations et index ne sont attribués qu'à l'édition de liens

pub mod reflect;
pub mod software;

use std::fmt;
use thiserror::Error;

use crate::stage::StageKind;

pub use software::*;

/// Identifiant opaque d'un programme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// Identifiant opaque d'un objet shader (un étage compilé)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub u32);

/// Identifiant opaque d'un buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Location d'un uniform dans un programme lié
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);

impl UniformLocation {
    /// Location rendue pour un nom inconnu
    pub const INVALID: UniformLocation = UniformLocation(-1);

    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

/// Index d'un bloc d'uniforms dans un programme lié
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockIndex(pub u32);

impl BlockIndex {
    /// Index rendu pour un nom de bloc inconnu (`0xFFFFFFFF`)
    pub const INVALID: BlockIndex = BlockIndex(u32::MAX);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "program#{}", self.0)
    }
}

impl fmt::Display for ShaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shader#{}", self.0)
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

/// Cibles de binding de buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Uniform,
}

/// Indication d'usage passée lors du dimensionnement d'un buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    StaticDraw,
    DynamicDraw,
    StreamDraw,
}

/// Erreurs de l'interface GPU
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// Plus d'identifiants disponibles
    #[error("plus d'identifiants disponibles pour créer un objet {0}")]
    HandleExhausted(&'static str),

    /// Étage ne pouvant pas être créé comme objet shader
    #[error("impossible de créer un shader pour l'étage {0}")]
    InvalidStage(StageKind),

    /// Buffer inconnu ou déjà supprimé
    #[error("buffer inconnu: {0}")]
    UnknownBuffer(BufferId),

    /// Aucun buffer lié à la cible
    #[error("aucun buffer lié à la cible {0:?}")]
    NoBufferBound(BufferTarget),

    /// Écriture hors des limites du buffer
    #[error("écriture hors limites: offset {offset} + {len} octets > taille {size}")]
    OutOfBounds { offset: usize, len: usize, size: usize },
}

/// Interface de commandes GPU consommée par les effets
///
/// Les opérations qui ne peuvent qu'enregistrer une erreur côté pilote
/// (binding vers un index invalide, envoi vers la location `-1`...) ne
/// rendent rien, comme l'API graphique sous-jacente.
pub trait GpuDevice {
    /// Crée un programme vide
    fn create_program(&mut self) -> Result<ProgramId, GpuError>;

    /// Supprime un programme et détache ses shaders
    fn delete_program(&mut self, program: ProgramId);

    /// Crée un objet shader pour un étage
    fn create_shader(&mut self, stage: StageKind) -> Result<ShaderId, GpuError>;

    /// Supprime un objet shader (différé tant qu'il est attaché)
    fn delete_shader(&mut self, shader: ShaderId);

    /// Remplace le source d'un shader
    fn shader_source(&mut self, shader: ShaderId, source: &str);

    /// Compile le source courant d'un shader
    fn compile_shader(&mut self, shader: ShaderId);

    /// Statut de la dernière compilation
    fn shader_compile_status(&self, shader: ShaderId) -> bool;

    /// Journal de la dernière compilation
    fn shader_info_log(&self, shader: ShaderId) -> String;

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId);

    fn detach_shader(&mut self, program: ProgramId, shader: ShaderId);

    /// Associe un attribut de vertex à un slot, effectif au prochain link
    fn bind_attrib_location(&mut self, program: ProgramId, index: u32, name: &str);

    /// Associe une sortie fragment à un slot de couleur, effectif au prochain link
    fn bind_frag_data_location(&mut self, program: ProgramId, color: u32, name: &str);

    /// Édite les liens du programme
    fn link_program(&mut self, program: ProgramId);

    /// Statut de la dernière édition de liens
    fn program_link_status(&self, program: ProgramId) -> bool;

    /// Journal de la dernière édition de liens
    fn program_info_log(&self, program: ProgramId) -> String;

    /// Active un programme pour les draws suivants
    fn use_program(&mut self, program: Option<ProgramId>);

    /// Programme actif du contexte
    fn current_program(&self) -> Option<ProgramId>;

    /// Résout la location d'un uniform, `UniformLocation::INVALID` si absent
    fn uniform_location(&self, program: ProgramId, name: &str) -> UniformLocation;

    /// Envoie un tableau de vec4 à une location du programme
    fn program_uniform_4fv(&mut self, program: ProgramId, location: UniformLocation, values: &[[f32; 4]]);

    fn create_buffer(&mut self) -> Result<BufferId, GpuError>;

    fn delete_buffer(&mut self, buffer: BufferId);

    /// Lie un buffer à une cible (`None` pour délier)
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>);

    /// (Re)dimensionne le buffer lié à `target`
    ///
    /// Sans `data`, le contenu est indéterminé.
    fn buffer_data(
        &mut self,
        target: BufferTarget,
        size: usize,
        data: Option<&[u8]>,
        usage: BufferUsage,
    ) -> Result<(), GpuError>;

    /// Écrit dans le buffer lié à `target`
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) -> Result<(), GpuError>;

    /// Résout l'index d'un bloc d'uniforms, `BlockIndex::INVALID` si absent
    fn uniform_block_index(&self, program: ProgramId, name: &str) -> BlockIndex;

    /// Taille en octets déclarée par un bloc (`UNIFORM_BLOCK_DATA_SIZE`)
    fn uniform_block_data_size(&self, program: ProgramId, index: BlockIndex) -> Option<usize>;

    /// Associe un bloc du programme à un slot de binding
    fn uniform_block_binding(&mut self, program: ProgramId, index: BlockIndex, binding: u32);

    /// Lie un buffer à un slot indexé de la cible (et à la cible générique)
    fn bind_buffer_base(&mut self, target: BufferTarget, index: u32, buffer: BufferId);
}
