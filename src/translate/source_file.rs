//! Traducteur à partir de fichiers GLSL sur disque
//!
//! L'étage est déduit de l'extension (`.vert`, `.frag`, `.geom` et variantes,
//! éventuellement suivies de `.glsl`). Le source est passé tel quel, en
//! ajoutant la directive `#version` du dialecte s'il n'en a pas.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::{CompileFlags, Dialect, TranslatedShader, Translator};
use crate::stage::StageKind;

/// Traducteur lisant des sources GLSL déjà écrites dans le dialecte cible
#[derive(Debug, Clone, Default)]
pub struct SourceFileTranslator {
    /// Répertoire de base pour les chemins relatifs
    root: Option<PathBuf>,
}

impl SourceFileTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Résout les chemins relatifs depuis `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: Some(root.into()) }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Déduit l'étage de l'extension du fichier
pub fn detect_stage(path: &Path) -> StageKind {
    let mut ext = extension_of(path);

    // `water.frag.glsl` : regarder l'extension précédente
    if ext.as_deref() == Some("glsl") {
        ext = path.file_stem().and_then(|stem| extension_of(Path::new(stem)));
    }

    match ext.as_deref() {
        Some("vert" | "vs" | "vsh") => StageKind::Vertex,
        Some("frag" | "fs" | "ps" | "fsh") => StageKind::Fragment,
        Some("geom" | "gs" | "gsh") => StageKind::Geometry,
        _ => StageKind::Unknown,
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

impl Translator for SourceFileTranslator {
    fn translate(&self, path: &Path, flags: CompileFlags, dialect: Dialect) -> Result<TranslatedShader> {
        let full_path = self.resolve(path);
        let text = fs::read_to_string(&full_path)
            .with_context(|| format!("Impossible de lire le shader {}", full_path.display()))?;

        let stage = detect_stage(path);

        if stage == StageKind::Geometry && !dialect.supports_geometry() {
            bail!("Le dialecte {:?} ne supporte pas les geometry shaders ({})", dialect, path.display());
        }
        if flags.contains(CompileFlags::UNIFORM_BUFFER_OBJECT) && !dialect.supports_uniform_blocks() {
            bail!("Le dialecte {:?} ne supporte pas les blocs d'uniforms ({})", dialect, path.display());
        }

        let has_version = text.trim_start().starts_with("#version");
        let source = match dialect.version_directive() {
            Some(directive) if !has_version => format!("{}\n{}", directive, text),
            _ => text,
        };

        log::debug!("Shader {} traduit ({} octets, étage {})", path.display(), source.len(), stage);

        Ok(TranslatedShader { stage, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_detect_stage_from_extension() {
        assert_eq!(detect_stage(Path::new("a.vert")), StageKind::Vertex);
        assert_eq!(detect_stage(Path::new("a.PS")), StageKind::Fragment);
        assert_eq!(detect_stage(Path::new("water.frag.glsl")), StageKind::Fragment);
        assert_eq!(detect_stage(Path::new("grass.gs")), StageKind::Geometry);
        assert_eq!(detect_stage(Path::new("a.comp")), StageKind::Unknown);
        assert_eq!(detect_stage(Path::new("noext")), StageKind::Unknown);
    }

    #[test]
    fn test_translate_injects_version() -> Result<()> {
        let temp_dir = TempDir::new()?;
        fs::write(temp_dir.path().join("a.vert"), "void main() {}\n")?;

        let translator = SourceFileTranslator::with_root(temp_dir.path());
        let unit = translator.translate(Path::new("a.vert"), CompileFlags::empty(), Dialect::Glsl330)?;

        assert_eq!(unit.stage, StageKind::Vertex);
        assert!(unit.source.starts_with("#version 330\n"));
        Ok(())
    }

    #[test]
    fn test_translate_keeps_existing_version() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("a.frag");
        fs::write(&path, "#version 410\nvoid main() {}\n")?;

        let unit = SourceFileTranslator::new().translate(&path, CompileFlags::empty(), Dialect::Glsl330)?;
        assert_eq!(unit.source, "#version 410\nvoid main() {}\n");
        Ok(())
    }

    #[test]
    fn test_translate_rejects_unsupported_dialect() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("a.geom");
        fs::write(&path, "void main() {}\n")?;

        let result = SourceFileTranslator::new().translate(&path, CompileFlags::empty(), Dialect::Es300);
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_translate_missing_file() {
        let result = SourceFileTranslator::new().translate(
            Path::new("/nonexistent/a.vert"),
            CompileFlags::empty(),
            Dialect::Default,
        );
        assert!(result.is_err());
    }
}
