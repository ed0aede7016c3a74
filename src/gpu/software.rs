//! Périphérique GPU logiciel
//!
//! Implémentation déterministe de `GpuDevice` entièrement en mémoire. Elle
//! reproduit les sémantiques observables du pilote (locations attribuées au
//! link, `-1` ignoré, bindings de blocs, tailles std140) et expose des
//! accesseurs de relecture pour les tests.

use std::collections::HashMap;

use super::reflect::{scan, Declarations, GlslType};
use super::{
    BlockIndex, BufferId, BufferTarget, BufferUsage, GpuDevice, GpuError, ProgramId, ShaderId, UniformLocation,
};
use crate::stage::StageKind;

/// Objet shader logiciel
#[derive(Debug, Clone)]
struct SoftShader {
    stage: StageKind,
    source: String,
    compiled: bool,
    info_log: String,
    declarations: Declarations,
    /// Suppression demandée alors que le shader était attaché
    delete_pending: bool,
}

/// Uniform d'un programme lié
#[derive(Debug, Clone)]
struct LinkedUniform {
    name: String,
    ty: GlslType,
    is_array: bool,
    base_location: i32,
    values: Vec<[f32; 4]>,
}

/// Bloc d'uniforms d'un programme lié
#[derive(Debug, Clone)]
struct LinkedBlock {
    name: String,
    size: usize,
    binding: u32,
}

/// Programme logiciel
#[derive(Debug, Clone, Default)]
struct SoftProgram {
    attached: Vec<ShaderId>,
    attrib_bindings: HashMap<String, u32>,
    frag_bindings: HashMap<String, u32>,
    linked: bool,
    info_log: String,
    linked_attribs: HashMap<String, u32>,
    linked_frag_outputs: HashMap<String, u32>,
    uniforms: Vec<LinkedUniform>,
    blocks: Vec<LinkedBlock>,
}

impl SoftProgram {
    /// Retrouve l'uniform et l'élément visés par une location
    fn uniform_at(&mut self, location: i32) -> Option<(&mut LinkedUniform, usize)> {
        self.uniforms.iter_mut().find_map(|uniform| {
            let element = location - uniform.base_location;
            if element >= 0 && (element as usize) < uniform.values.len() {
                Some((uniform, element as usize))
            } else {
                None
            }
        })
    }
}

/// Buffer logiciel
#[derive(Debug, Clone, Default)]
struct SoftBuffer {
    data: Vec<u8>,
    usage: Option<BufferUsage>,
}

/// Compteurs d'appels, utiles pour vérifier ce qui a été émis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    pub compiles: u32,
    pub links: u32,
    pub uniform_uploads: u32,
    pub block_bindings: u32,
    /// Opérations rejetées par le pilote (équivalent de `glGetError`)
    pub errors: u32,
}

/// Nombre d'objets encore vivants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveObjects {
    pub programs: usize,
    pub shaders: usize,
    pub buffers: usize,
}

impl LiveObjects {
    pub fn is_empty(&self) -> bool {
        self.programs == 0 && self.shaders == 0 && self.buffers == 0
    }
}

/// Périphérique GPU logiciel
#[derive(Debug, Default)]
pub struct SoftwareDevice {
    next_id: u32,
    programs: HashMap<ProgramId, SoftProgram>,
    shaders: HashMap<ShaderId, SoftShader>,
    buffers: HashMap<BufferId, SoftBuffer>,
    bound_buffers: HashMap<BufferTarget, BufferId>,
    indexed_uniform_buffers: HashMap<u32, BufferId>,
    current_program: Option<ProgramId>,
    stats: CallStats,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self, kind: &'static str) -> Result<u32, GpuError> {
        let id = self.next_id.checked_add(1).ok_or(GpuError::HandleExhausted(kind))?;
        self.next_id = id;
        Ok(id)
    }

    fn record_error(&mut self, message: &str) {
        log::trace!("Opération GPU rejetée: {}", message);
        self.stats.errors += 1;
    }

    fn is_attached_anywhere(&self, shader: ShaderId) -> bool {
        self.programs.values().any(|program| program.attached.contains(&shader))
    }

    fn bound_buffer_mut(&mut self, target: BufferTarget) -> Result<&mut SoftBuffer, GpuError> {
        let id = *self.bound_buffers.get(&target).ok_or(GpuError::NoBufferBound(target))?;
        self.buffers.get_mut(&id).ok_or(GpuError::UnknownBuffer(id))
    }

    /// Édition de liens : rend le programme lié ou le journal d'erreur
    fn link(&self, program: &SoftProgram) -> Result<(Vec<LinkedUniform>, Vec<LinkedBlock>), String> {
        if program.attached.is_empty() {
            return Err("ERROR: aucun shader attaché au programme".to_string());
        }

        let mut uniforms: Vec<LinkedUniform> = Vec::new();
        let mut blocks: Vec<LinkedBlock> = Vec::new();
        let mut next_location = 0i32;

        for shader_id in &program.attached {
            let shader = self
                .shaders
                .get(shader_id)
                .ok_or_else(|| format!("ERROR: {} inconnu", shader_id))?;

            if !shader.compiled {
                return Err(format!("ERROR: le {} shader {} n'est pas compilé", shader.stage, shader_id));
            }
            if !shader.declarations.has_main {
                return Err(format!("ERROR: le {} shader ne définit pas main()", shader.stage));
            }

            for decl in &shader.declarations.uniforms {
                if let Some(existing) = uniforms.iter().find(|u| u.name == decl.name) {
                    if existing.ty != decl.ty || existing.values.len() != decl.len() {
                        return Err(format!("ERROR: uniform '{}' déclaré avec des types différents", decl.name));
                    }
                    continue;
                }
                uniforms.push(LinkedUniform {
                    name: decl.name.clone(),
                    ty: decl.ty,
                    is_array: decl.array_len.is_some(),
                    base_location: next_location,
                    values: vec![[0.0; 4]; decl.len()],
                });
                next_location += decl.len() as i32;
            }

            for decl in &shader.declarations.blocks {
                if let Some(existing) = blocks.iter().find(|b| b.name == decl.name) {
                    if existing.size != decl.size {
                        return Err(format!(
                            "ERROR: bloc '{}' déclaré avec des tailles différentes ({} et {})",
                            decl.name, existing.size, decl.size
                        ));
                    }
                    continue;
                }
                blocks.push(LinkedBlock {
                    name: decl.name.clone(),
                    size: decl.size,
                    binding: 0,
                });
            }
        }

        Ok((uniforms, blocks))
    }

    // --- Relecture -------------------------------------------------------

    /// Valeurs courantes d'un uniform (nom physique) du programme lié
    pub fn uniform_values(&self, program: ProgramId, name: &str) -> Option<Vec<[f32; 4]>> {
        self.programs
            .get(&program)?
            .uniforms
            .iter()
            .find(|u| u.name == name)
            .map(|u| u.values.clone())
    }

    /// Slot de binding courant d'un bloc (nom physique)
    pub fn block_binding(&self, program: ProgramId, name: &str) -> Option<u32> {
        self.programs
            .get(&program)?
            .blocks
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.binding)
    }

    /// Shaders attachés, dans l'ordre d'attachement
    pub fn attached_shaders(&self, program: ProgramId) -> Vec<ShaderId> {
        self.programs
            .get(&program)
            .map(|p| p.attached.clone())
            .unwrap_or_default()
    }

    /// Étage d'un objet shader vivant
    pub fn shader_stage(&self, shader: ShaderId) -> Option<StageKind> {
        self.shaders.get(&shader).map(|s| s.stage)
    }

    /// Source soumis à un objet shader vivant
    pub fn shader_text(&self, shader: ShaderId) -> Option<&str> {
        self.shaders.get(&shader).map(|s| s.source.as_str())
    }

    /// Location d'attribut effective après le dernier link réussi
    pub fn attrib_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        self.programs.get(&program)?.linked_attribs.get(name).copied()
    }

    /// Slot de sortie fragment effectif après le dernier link réussi
    pub fn frag_data_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        self.programs.get(&program)?.linked_frag_outputs.get(name).copied()
    }

    /// Contenu d'un buffer
    pub fn buffer_contents(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.data.as_slice())
    }

    /// Usage passé au dernier dimensionnement
    pub fn buffer_usage(&self, buffer: BufferId) -> Option<BufferUsage> {
        self.buffers.get(&buffer).and_then(|b| b.usage)
    }

    /// Buffer lié au slot indexé `slot` de la cible uniform
    pub fn uniform_buffer_binding(&self, slot: u32) -> Option<BufferId> {
        self.indexed_uniform_buffers.get(&slot).copied()
    }

    /// Buffer lié à la cible générique
    pub fn bound_buffer(&self, target: BufferTarget) -> Option<BufferId> {
        self.bound_buffers.get(&target).copied()
    }

    pub fn live_objects(&self) -> LiveObjects {
        LiveObjects {
            programs: self.programs.len(),
            shaders: self.shaders.len(),
            buffers: self.buffers.len(),
        }
    }

    pub fn stats(&self) -> CallStats {
        self.stats
    }
}

impl GpuDevice for SoftwareDevice {
    fn create_program(&mut self) -> Result<ProgramId, GpuError> {
        let id = ProgramId(self.allocate_id("programme")?);
        self.programs.insert(id, SoftProgram::default());
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        let Some(removed) = self.programs.remove(&program) else {
            self.record_error("delete_program sur un programme inconnu");
            return;
        };

        // Les shaders en attente de suppression sont libérés au détachement
        for shader in removed.attached {
            let pending = self.shaders.get(&shader).is_some_and(|s| s.delete_pending);
            if pending && !self.is_attached_anywhere(shader) {
                self.shaders.remove(&shader);
            }
        }

        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn create_shader(&mut self, stage: StageKind) -> Result<ShaderId, GpuError> {
        if stage.slot().is_none() {
            return Err(GpuError::InvalidStage(stage));
        }

        let id = ShaderId(self.allocate_id("shader")?);
        self.shaders.insert(
            id,
            SoftShader {
                stage,
                source: String::new(),
                compiled: false,
                info_log: String::new(),
                declarations: Declarations::default(),
                delete_pending: false,
            },
        );
        Ok(id)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        if !self.shaders.contains_key(&shader) {
            self.record_error("delete_shader sur un shader inconnu");
            return;
        }

        if self.is_attached_anywhere(shader) {
            if let Some(s) = self.shaders.get_mut(&shader) {
                s.delete_pending = true;
            }
        } else {
            self.shaders.remove(&shader);
        }
    }

    fn shader_source(&mut self, shader: ShaderId, source: &str) {
        match self.shaders.get_mut(&shader) {
            Some(s) => s.source = source.to_string(),
            None => self.record_error("shader_source sur un shader inconnu"),
        }
    }

    fn compile_shader(&mut self, shader: ShaderId) {
        self.stats.compiles += 1;

        let Some(s) = self.shaders.get_mut(&shader) else {
            self.record_error("compile_shader sur un shader inconnu");
            return;
        };

        let error_directive = s
            .source
            .lines()
            .enumerate()
            .find(|(_, line)| line.trim_start().starts_with("#error"));

        let result = if s.source.trim().is_empty() {
            Err("ERROR: 0:0: source vide".to_string())
        } else if let Some((line_no, line)) = error_directive {
            let message = line.trim_start().trim_start_matches("#error").trim();
            Err(format!("ERROR: 0:{}: '#error' : {}", line_no + 1, message))
        } else {
            scan(&s.source).map_err(|e| e.to_string())
        };

        match result {
            Ok(declarations) => {
                s.compiled = true;
                s.info_log.clear();
                s.declarations = declarations;
            }
            Err(log) => {
                s.compiled = false;
                s.info_log = log;
                s.declarations = Declarations::default();
            }
        }
    }

    fn shader_compile_status(&self, shader: ShaderId) -> bool {
        self.shaders.get(&shader).is_some_and(|s| s.compiled)
    }

    fn shader_info_log(&self, shader: ShaderId) -> String {
        self.shaders
            .get(&shader)
            .map(|s| s.info_log.clone())
            .unwrap_or_default()
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        if !self.shaders.contains_key(&shader) {
            self.record_error("attach_shader d'un shader inconnu");
            return;
        }
        let already_attached = match self.programs.get(&program) {
            Some(p) => p.attached.contains(&shader),
            None => {
                self.record_error("attach_shader sur un programme inconnu");
                return;
            }
        };
        if already_attached {
            self.record_error("shader déjà attaché");
        } else if let Some(p) = self.programs.get_mut(&program) {
            p.attached.push(shader);
        }
    }

    fn detach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        let Some(p) = self.programs.get_mut(&program) else {
            self.record_error("detach_shader sur un programme inconnu");
            return;
        };
        let Some(pos) = p.attached.iter().position(|s| *s == shader) else {
            self.record_error("detach_shader d'un shader non attaché");
            return;
        };
        p.attached.remove(pos);

        let pending = self.shaders.get(&shader).is_some_and(|s| s.delete_pending);
        if pending && !self.is_attached_anywhere(shader) {
            self.shaders.remove(&shader);
        }
    }

    fn bind_attrib_location(&mut self, program: ProgramId, index: u32, name: &str) {
        match self.programs.get_mut(&program) {
            Some(p) => {
                p.attrib_bindings.insert(name.to_string(), index);
            }
            None => self.record_error("bind_attrib_location sur un programme inconnu"),
        }
    }

    fn bind_frag_data_location(&mut self, program: ProgramId, color: u32, name: &str) {
        match self.programs.get_mut(&program) {
            Some(p) => {
                p.frag_bindings.insert(name.to_string(), color);
            }
            None => self.record_error("bind_frag_data_location sur un programme inconnu"),
        }
    }

    fn link_program(&mut self, program: ProgramId) {
        self.stats.links += 1;

        let Some(p) = self.programs.get(&program) else {
            self.record_error("link_program sur un programme inconnu");
            return;
        };
        let result = self.link(p);

        let Some(p) = self.programs.get_mut(&program) else {
            return;
        };
        match result {
            Ok((uniforms, blocks)) => {
                p.linked = true;
                p.info_log.clear();
                p.linked_attribs = p.attrib_bindings.clone();
                p.linked_frag_outputs = p.frag_bindings.clone();
                p.uniforms = uniforms;
                p.blocks = blocks;
            }
            Err(log) => {
                p.linked = false;
                p.info_log = log;
                p.linked_attribs.clear();
                p.linked_frag_outputs.clear();
                p.uniforms.clear();
                p.blocks.clear();
            }
        }
    }

    fn program_link_status(&self, program: ProgramId) -> bool {
        self.programs.get(&program).is_some_and(|p| p.linked)
    }

    fn program_info_log(&self, program: ProgramId) -> String {
        self.programs
            .get(&program)
            .map(|p| p.info_log.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        match program {
            Some(id) if !self.programs.contains_key(&id) => self.record_error("use_program d'un programme inconnu"),
            _ => self.current_program = program,
        }
    }

    fn current_program(&self) -> Option<ProgramId> {
        self.current_program
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> UniformLocation {
        let Some(p) = self.programs.get(&program) else {
            return UniformLocation::INVALID;
        };

        // `Nom` ou `Nom[i]`, y compris `Struct[1].champ[i]`
        let (base, element) = match name.strip_suffix(']').and_then(|n| n.rsplit_once('[')) {
            Some((base, index)) => match index.parse::<usize>() {
                Ok(index) => (base, index),
                Err(_) => return UniformLocation::INVALID,
            },
            None => (name, 0),
        };

        p.uniforms
            .iter()
            .find(|u| u.name == base && element < u.values.len())
            .map(|u| UniformLocation(u.base_location + element as i32))
            .unwrap_or(UniformLocation::INVALID)
    }

    fn program_uniform_4fv(&mut self, program: ProgramId, location: UniformLocation, values: &[[f32; 4]]) {
        self.stats.uniform_uploads += 1;

        // `-1` est ignoré silencieusement
        if !location.is_valid() {
            return;
        }

        let outcome = match self.programs.get_mut(&program).map(|p| p.uniform_at(location.0)) {
            None => Err("program_uniform_4fv sur un programme inconnu"),
            Some(None) => Err("program_uniform_4fv vers une location inconnue"),
            Some(Some((uniform, _))) if uniform.ty != GlslType::VEC4 || (!uniform.is_array && values.len() > 1) => {
                Err("program_uniform_4fv: type incompatible")
            }
            Some(Some((uniform, element))) => {
                // Les éléments au-delà de la fin du tableau sont ignorés
                for (slot, value) in uniform.values[element..].iter_mut().zip(values) {
                    *slot = *value;
                }
                Ok(())
            }
        };

        if let Err(message) = outcome {
            self.record_error(message);
        }
    }

    fn create_buffer(&mut self) -> Result<BufferId, GpuError> {
        let id = BufferId(self.allocate_id("buffer")?);
        self.buffers.insert(id, SoftBuffer::default());
        Ok(id)
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_none() {
            self.record_error("delete_buffer sur un buffer inconnu");
            return;
        }
        self.bound_buffers.retain(|_, id| *id != buffer);
        self.indexed_uniform_buffers.retain(|_, id| *id != buffer);
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        match buffer {
            Some(id) if !self.buffers.contains_key(&id) => self.record_error("bind_buffer d'un buffer inconnu"),
            Some(id) => {
                self.bound_buffers.insert(target, id);
            }
            None => {
                self.bound_buffers.remove(&target);
            }
        }
    }

    fn buffer_data(
        &mut self,
        target: BufferTarget,
        size: usize,
        data: Option<&[u8]>,
        usage: BufferUsage,
    ) -> Result<(), GpuError> {
        let buffer = self.bound_buffer_mut(target)?;

        let contents = match data {
            Some(bytes) if bytes.len() < size => {
                return Err(GpuError::OutOfBounds {
                    offset: 0,
                    len: size,
                    size: bytes.len(),
                });
            }
            Some(bytes) => bytes[..size].to_vec(),
            None => vec![0; size],
        };

        buffer.data = contents;
        buffer.usage = Some(usage);
        Ok(())
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) -> Result<(), GpuError> {
        let buffer = self.bound_buffer_mut(target)?;
        let size = buffer.data.len();

        let end = offset
            .checked_add(data.len())
            .filter(|end| *end <= size)
            .ok_or(GpuError::OutOfBounds {
                offset,
                len: data.len(),
                size,
            })?;

        buffer.data[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn uniform_block_index(&self, program: ProgramId, name: &str) -> BlockIndex {
        self.programs
            .get(&program)
            .and_then(|p| p.blocks.iter().position(|b| b.name == name))
            .map(|index| BlockIndex(index as u32))
            .unwrap_or(BlockIndex::INVALID)
    }

    fn uniform_block_data_size(&self, program: ProgramId, index: BlockIndex) -> Option<usize> {
        self.programs
            .get(&program)?
            .blocks
            .get(index.0 as usize)
            .map(|b| b.size)
    }

    fn uniform_block_binding(&mut self, program: ProgramId, index: BlockIndex, binding: u32) {
        self.stats.block_bindings += 1;

        let block = self
            .programs
            .get_mut(&program)
            .and_then(|p| p.blocks.get_mut(index.0 as usize));

        match block {
            Some(block) => block.binding = binding,
            // `INVALID_INDEX` (bloc absent de l'étage) est ignoré silencieusement
            None if !index.is_valid() => {}
            None => self.record_error("uniform_block_binding vers un index invalide"),
        }
    }

    fn bind_buffer_base(&mut self, target: BufferTarget, index: u32, buffer: BufferId) {
        if !self.buffers.contains_key(&buffer) {
            self.record_error("bind_buffer_base d'un buffer inconnu");
            return;
        }
        match target {
            BufferTarget::Uniform => {
                self.indexed_uniform_buffers.insert(index, buffer);
            }
        }
        self.bound_buffers.insert(target, buffer);
    }
}
