//! Configuration des effets

use serde::{Deserialize, Serialize};
use anyhow::Result;
use std::fs;

use crate::translate::{CompileFlags, Dialect};

/// Sévérité appliquée aux échecs de compilation et d'édition de liens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validation {
    /// Les échecs sont rendus comme erreurs typées
    #[default]
    Strict,
    /// Les échecs sont journalisés et l'effet continue
    Lenient,
}

/// Configuration d'un effet, fixée à la construction
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    /// Flags transmis tels quels au traducteur
    pub compile_flags: CompileFlags,

    /// Dialecte que le traducteur doit émettre
    pub dialect: Dialect,

    /// Sévérité des échecs de compilation et de link
    pub validation: Validation,
}

impl EffectConfig {
    pub fn with_compile_flags(mut self, flags: CompileFlags) -> Self {
        self.compile_flags = flags;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: EffectConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn load_or_default(path: &str) -> Self {
        Self::load_from_file(path).unwrap_or_else(|err| {
            log::warn!("Configuration {} ignorée: {}", path, err);
            Self::default()
        })
    }
}
