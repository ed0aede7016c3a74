//! Conteneur d'effet : programme GPU et ses étages
//!
//! Cycle de vie d'un effet :
//! 1. `create` alloue le programme
//! 2. `load`, `load_vertex`, `load_pixel`, `load_geometry` traduisent, compilent et attachent les étages
//! 3. `enable` lie les slots fixes, édite les liens et active le programme
//! 4. les opérations d'uniforms (voir `crate::uniform`) sont appelées à chaque draw
//! 5. `destroy` libère le programme et ses étages
//!
//! Le périphérique GPU est passé explicitement à chaque opération.

pub mod error;

use std::path::Path;

use crate::config::{EffectConfig, Validation};
use crate::gpu::{GpuDevice, ProgramId, ShaderId};
use crate::stage::{StageKind, StageRequest};
use crate::translate::Translator;

pub use error::*;

/// Attributs de vertex liés avant chaque édition de liens
pub const VERTEX_INPUTS: [(u32, &str); 2] = [(0, "Input0"), (1, "Input1")];

/// Sorties fragment liées avant chaque édition de liens
pub const PIXEL_OUTPUTS: [(u32, &str); 1] = [(0, "PixOutput0")];

/// Effet de shaders multi-étages
pub struct ShaderEffect<T> {
    /// Programme, identité fixe pour toute la vie de l'effet
    program: ProgramId,

    /// Objets shader par slot d'étage (vertex, fragment, geometry)
    stages: [Option<ShaderId>; 3],

    /// Service de traduction
    translator: T,

    config: EffectConfig,

    /// Dernière édition de liens réussie, remis à zéro à chaque changement d'étage
    linked: bool,

    destroyed: bool,
}

impl<T: Translator> ShaderEffect<T> {
    /// Crée un effet vide : un programme sans étage attaché
    pub fn create<D: GpuDevice + ?Sized>(device: &mut D, translator: T, config: EffectConfig) -> EffectResult<Self> {
        let program = device.create_program()?;
        log::debug!("Effet créé: {} ({:?})", program, config.dialect);

        Ok(Self {
            program,
            stages: [None; 3],
            translator,
            config,
            linked: false,
            destroyed: false,
        })
    }

    /// Chargement combiné : attache l'étage vertex ou fragment rendu par le traducteur
    ///
    /// Un étage geometry ou inconnu est ignoré et `None` est rendu.
    pub fn load<D, P>(&mut self, device: &mut D, path: P) -> EffectResult<Option<StageKind>>
    where
        D: GpuDevice + ?Sized,
        P: AsRef<Path>,
    {
        self.load_stage(device, path, StageRequest::Any)
    }

    /// Charge un vertex shader ; tout autre étage est une `StageMismatch`
    pub fn load_vertex<D, P>(&mut self, device: &mut D, path: P) -> EffectResult<()>
    where
        D: GpuDevice + ?Sized,
        P: AsRef<Path>,
    {
        self.load_stage(device, path, StageRequest::Pinned(StageKind::Vertex))
            .map(|_| ())
    }

    /// Charge un fragment (pixel) shader
    pub fn load_pixel<D, P>(&mut self, device: &mut D, path: P) -> EffectResult<()>
    where
        D: GpuDevice + ?Sized,
        P: AsRef<Path>,
    {
        self.load_stage(device, path, StageRequest::Pinned(StageKind::Fragment))
            .map(|_| ())
    }

    /// Charge un geometry shader
    pub fn load_geometry<D, P>(&mut self, device: &mut D, path: P) -> EffectResult<()>
    where
        D: GpuDevice + ?Sized,
        P: AsRef<Path>,
    {
        self.load_stage(device, path, StageRequest::Pinned(StageKind::Geometry))
            .map(|_| ())
    }

    /// Traduit `path`, vérifie l'étage rendu contre `request` puis compile et attache
    ///
    /// Rend l'étage attaché, ou `None` si un chargement combiné a ignoré l'unité.
    pub fn load_stage<D, P>(&mut self, device: &mut D, path: P, request: StageRequest) -> EffectResult<Option<StageKind>>
    where
        D: GpuDevice + ?Sized,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let unit = self
            .translator
            .translate(path, self.config.compile_flags, self.config.dialect)?;

        if !request.accepts(unit.stage) {
            return match request {
                StageRequest::Any => {
                    log::debug!("{}: étage {} ignoré par le chargement combiné", path.display(), unit.stage);
                    Ok(None)
                }
                StageRequest::Pinned(expected) => Err(EffectError::StageMismatch {
                    path: path.to_path_buf(),
                    expected,
                    found: unit.stage,
                }),
            };
        }

        let Some(slot) = unit.stage.slot() else {
            return Err(EffectError::UnsupportedStage {
                path: path.to_path_buf(),
                found: unit.stage,
            });
        };

        self.install_stage(device, unit.stage, slot, &unit.source)?;
        Ok(Some(unit.stage))
    }

    /// Compile un étage et le substitue à l'éventuel étage précédent du même type
    fn install_stage<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        stage: StageKind,
        slot: usize,
        source: &str,
    ) -> EffectResult<()> {
        let shader = device.create_shader(stage)?;
        device.shader_source(shader, source);
        device.compile_shader(shader);

        if !device.shader_compile_status(shader) {
            let log = device.shader_info_log(shader);
            match self.config.validation {
                Validation::Strict => {
                    device.delete_shader(shader);
                    return Err(EffectError::CompileError { stage, log });
                }
                Validation::Lenient => {
                    log::warn!("Échec de compilation du {} shader (ignoré):\n{}", stage, log);
                }
            }
        }

        // Un étage rechargé remplace et libère le précédent
        if let Some(previous) = self.stages[slot].take() {
            device.detach_shader(self.program, previous);
            device.delete_shader(previous);
            log::debug!("{}: {} shader {} remplacé", self.program, stage, previous);
        }

        device.attach_shader(self.program, shader);
        self.stages[slot] = Some(shader);
        self.linked = false;

        log::debug!("{}: {} shader {} attaché", self.program, stage, shader);
        Ok(())
    }

    /// Lie les slots fixes, édite les liens et active le programme
    ///
    /// En validation stricte, un échec d'édition de liens est rendu avec son
    /// journal et le programme n'est pas activé. En validation souple, le
    /// journal est émis en avertissement et le programme est activé quand même.
    pub fn enable<D: GpuDevice + ?Sized>(&mut self, device: &mut D) -> EffectResult<()> {
        if self.stages.iter().all(Option::is_none) {
            return Err(EffectError::NoStages);
        }

        for (index, name) in VERTEX_INPUTS {
            device.bind_attrib_location(self.program, index, name);
        }
        for (color, name) in PIXEL_OUTPUTS {
            device.bind_frag_data_location(self.program, color, name);
        }

        device.link_program(self.program);
        self.linked = device.program_link_status(self.program);

        if !self.linked {
            let log = device.program_info_log(self.program);
            match self.config.validation {
                Validation::Strict => return Err(EffectError::LinkError { log }),
                Validation::Lenient => {
                    log::warn!("Échec de l'édition de liens de {} (ignoré):\n{}", self.program, log);
                }
            }
        }

        device.use_program(Some(self.program));
        log::debug!("{} activé", self.program);
        Ok(())
    }

    /// Libère les étages et le programme
    pub fn destroy<D: GpuDevice + ?Sized>(mut self, device: &mut D) {
        if device.current_program() == Some(self.program) {
            device.use_program(None);
        }

        for shader in self.stages.iter_mut().filter_map(Option::take) {
            device.detach_shader(self.program, shader);
            device.delete_shader(shader);
        }
        device.delete_program(self.program);

        log::debug!("{} détruit", self.program);
        self.destroyed = true;
    }
}

impl<T> ShaderEffect<T> {
    /// Programme de l'effet
    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// Objet shader attaché pour un étage
    pub fn stage(&self, kind: StageKind) -> Option<ShaderId> {
        kind.slot().and_then(|slot| self.stages[slot])
    }

    /// Étages attachés, dans l'ordre vertex, fragment, geometry
    pub fn attached_stages(&self) -> Vec<StageKind> {
        StageKind::ATTACHABLE
            .into_iter()
            .filter(|kind| self.stage(*kind).is_some())
            .collect()
    }

    /// La dernière édition de liens a-t-elle réussi (sans changement d'étage depuis) ?
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// Le programme de l'effet est-il le programme actif du périphérique ?
    pub fn is_active<D: GpuDevice + ?Sized>(&self, device: &D) -> bool {
        device.current_program() == Some(self.program)
    }

    pub fn config(&self) -> &EffectConfig {
        &self.config
    }

    pub fn translator(&self) -> &T {
        &self.translator
    }
}

impl<T> Drop for ShaderEffect<T> {
    fn drop(&mut self) {
        if !self.destroyed {
            log::warn!("{} abandonné sans destroy(): programme et étages non libérés", self.program);
        }
    }
}
