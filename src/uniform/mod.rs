//! Binding des uniforms et des blocs d'uniforms
//!
//! Les noms logiques sont résolus par le protocole de suffixes de
//! `crate::stage` : `SetVec4("Tint")` vise `TintVS`, `TintPS` et `TintGS`.
//! Un nom absent d'un étage n'est pas une erreur, la location `-1` (ou
//! l'index invalide) est transmise au périphérique qui l'ignore.
//!
//! Exception : `create_uniform_block` cherche le nom tel quel, sans suffixe.

use bytemuck::Pod;

use crate::effect::{EffectError, EffectResult, ShaderEffect};
use crate::gpu::{BufferId, BufferTarget, BufferUsage, GpuDevice, GpuError};
use crate::stage::stage_names;

impl<T> ShaderEffect<T> {
    /// Envoie un tableau de vec4 aux trois variantes d'étage de `name`
    ///
    /// Le nombre de vecteurs envoyés est `values.len()`. Rend le nombre de
    /// variantes résolues dans le programme.
    pub fn set_vec4<D: GpuDevice + ?Sized>(&self, device: &mut D, name: &str, values: &[[f32; 4]]) -> usize {
        let program = self.program();
        let mut resolved = 0;

        for (stage, physical) in stage_names(name) {
            let location = device.uniform_location(program, &physical);
            if location.is_valid() {
                resolved += 1;
            } else {
                log::trace!("{}: uniform {} absent du {} shader", program, physical, stage);
            }
            device.program_uniform_4fv(program, location, values);
        }

        resolved
    }

    /// Taille en octets du bloc `name` (nom nu, sans suffixe)
    pub fn uniform_block_size<D: GpuDevice + ?Sized>(&self, device: &D, name: &str) -> EffectResult<usize> {
        let program = self.program();
        let index = device.uniform_block_index(program, name);

        device
            .uniform_block_data_size(program, index)
            .ok_or_else(|| EffectError::UnknownUniformBlock { name: name.to_string() })
    }

    /// Crée un buffer dimensionné exactement à la taille du bloc `name`
    ///
    /// Le bloc est cherché sous son nom nu. Le buffer reste lié à la cible
    /// uniform, son contenu est indéterminé et il appartient à l'appelant.
    pub fn create_uniform_block<D: GpuDevice + ?Sized>(&self, device: &mut D, name: &str) -> EffectResult<BufferId> {
        let size = self.uniform_block_size(device, name)?;
        let buffer = device.create_buffer()?;

        device.bind_buffer(BufferTarget::Uniform, Some(buffer));
        if let Err(err) = device.buffer_data(BufferTarget::Uniform, size, None, BufferUsage::DynamicDraw) {
            device.delete_buffer(buffer);
            return Err(err.into());
        }

        log::debug!("{}: bloc {} adossé à {} ({} octets)", self.program(), name, buffer, size);
        Ok(buffer)
    }

    /// Associe les trois variantes d'étage du bloc `name` au slot `binding`
    ///
    /// Rend le nombre de variantes résolues dans le programme.
    pub fn set_uniform_block<D: GpuDevice + ?Sized>(&self, device: &mut D, name: &str, binding: u32) -> usize {
        let program = self.program();
        let mut resolved = 0;

        for (stage, physical) in stage_names(name) {
            let index = device.uniform_block_index(program, &physical);
            if index.is_valid() {
                resolved += 1;
            } else {
                log::trace!("{}: bloc {} absent du {} shader", program, physical, stage);
            }
            device.uniform_block_binding(program, index, binding);
        }

        resolved
    }

    /// Lie `buffer` au slot `binding`, puis associe les variantes du bloc `name` à ce slot
    pub fn set_uniform_block_buffer<D: GpuDevice + ?Sized>(
        &self,
        device: &mut D,
        name: &str,
        binding: u32,
        buffer: BufferId,
    ) -> usize {
        device.bind_buffer_base(BufferTarget::Uniform, binding, buffer);
        self.set_uniform_block(device, name, binding)
    }
}

/// Écrit `value` dans un buffer de bloc à partir de `offset`
///
/// L'écriture est bornée par la taille du buffer.
pub fn write_uniform_block<D, P>(device: &mut D, buffer: BufferId, offset: usize, value: &P) -> Result<(), GpuError>
where
    D: GpuDevice + ?Sized,
    P: Pod,
{
    device.bind_buffer(BufferTarget::Uniform, Some(buffer));
    device.buffer_sub_data(BufferTarget::Uniform, offset, bytemuck::bytes_of(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EffectConfig;
    use crate::gpu::SoftwareDevice;
    use crate::stage::StageKind;
    use crate::translate::MemoryTranslator;

    fn effect(device: &mut SoftwareDevice, vs: &str, ps: &str) -> ShaderEffect<MemoryTranslator> {
        let translator = MemoryTranslator::new()
            .with("a.vs", StageKind::Vertex, vs)
            .with("a.ps", StageKind::Fragment, ps);

        let mut effect = ShaderEffect::create(device, translator, EffectConfig::default()).unwrap();
        effect.load_vertex(device, "a.vs").unwrap();
        effect.load_pixel(device, "a.ps").unwrap();
        effect.enable(device).unwrap();
        effect
    }

    #[test]
    fn test_set_vec4_probes_every_stage() {
        let mut device = SoftwareDevice::new();
        let effect = effect(
            &mut device,
            "uniform vec4 TintVS;\nvoid main() {}\n",
            "uniform vec4 TintPS;\nvoid main() {}\n",
        );

        let resolved = effect.set_vec4(&mut device, "Tint", &[[0.5, 0.5, 0.5, 1.0]]);

        assert_eq!(resolved, 2);
        // La variante GS absente est tout de même transmise
        assert_eq!(device.stats().uniform_uploads, 3);
        assert_eq!(device.stats().errors, 0);
        effect.destroy(&mut device);
    }

    #[test]
    fn test_block_size_uses_bare_name() {
        let mut device = SoftwareDevice::new();
        let effect = effect(
            &mut device,
            "uniform Camera { mat4 view; };\nvoid main() {}\n",
            "uniform FooPS { vec4 tint; };\nvoid main() {}\n",
        );

        assert_eq!(effect.uniform_block_size(&device, "Camera").unwrap(), 64);
        assert!(matches!(
            effect.uniform_block_size(&device, "Foo"),
            Err(EffectError::UnknownUniformBlock { .. })
        ));
        effect.destroy(&mut device);
    }

    #[test]
    fn test_failed_block_creation_allocates_nothing() {
        let mut device = SoftwareDevice::new();
        let effect = effect(&mut device, "void main() {}\n", "void main() {}\n");

        assert!(effect.create_uniform_block(&mut device, "Missing").is_err());
        assert_eq!(device.live_objects().buffers, 0);
        effect.destroy(&mut device);
    }
}
