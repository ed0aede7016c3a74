//! Étages du pipeline et protocole de nommage par suffixe
//!
//! Un même nom logique d'uniform (ou de bloc d'uniforms) est déclaré
//! indépendamment dans chaque étage avec un suffixe :
//! - `VS` pour le vertex shader
//! - `PS` pour le fragment (pixel) shader
//! - `GS` pour le geometry shader
//!
//! L'application manipule le nom nu, le binder sonde les trois variantes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Types d'étages reconnus par le traducteur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Vertex,
    Fragment,
    Geometry,
    /// Étage non reconnu (hull, domain, compute...)
    Unknown,
}

impl StageKind {
    /// Étages pouvant être attachés à un programme, dans l'ordre des slots
    pub const ATTACHABLE: [StageKind; 3] = [StageKind::Vertex, StageKind::Fragment, StageKind::Geometry];

    /// Index du slot de l'étage dans un effet, `None` pour `Unknown`
    pub fn slot(self) -> Option<usize> {
        match self {
            StageKind::Vertex => Some(0),
            StageKind::Fragment => Some(1),
            StageKind::Geometry => Some(2),
            StageKind::Unknown => None,
        }
    }

    /// Suffixe utilisé par le protocole de nommage, `None` pour `Unknown`
    pub fn suffix(self) -> Option<&'static str> {
        STAGE_SUFFIXES
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, suffix)| *suffix)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Vertex => f.write_str("vertex"),
            StageKind::Fragment => f.write_str("fragment"),
            StageKind::Geometry => f.write_str("geometry"),
            StageKind::Unknown => f.write_str("unknown"),
        }
    }
}

/// Table (étage, suffixe) parcourue uniformément par le binder d'uniforms
pub const STAGE_SUFFIXES: [(StageKind, &str); 3] = [
    (StageKind::Vertex, "VS"),
    (StageKind::Fragment, "PS"),
    (StageKind::Geometry, "GS"),
];

/// Dérive les noms physiques par étage d'un nom logique
///
/// `stage_names("Tint")` produit `TintVS`, `TintPS`, `TintGS`.
pub fn stage_names(name: &str) -> impl Iterator<Item = (StageKind, String)> + '_ {
    STAGE_SUFFIXES
        .into_iter()
        .map(move |(kind, suffix)| (kind, format!("{}{}", name, suffix)))
}

/// Étage attendu lors d'un chargement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRequest {
    /// Chargement combiné : vertex ou fragment, selon ce que détecte le traducteur
    Any,
    /// Chargement épinglé : le traducteur doit rapporter exactement cet étage
    Pinned(StageKind),
}

impl StageRequest {
    /// Vérifie si un étage détecté satisfait la requête
    pub fn accepts(self, found: StageKind) -> bool {
        match self {
            StageRequest::Any => matches!(found, StageKind::Vertex | StageKind::Fragment),
            StageRequest::Pinned(expected) => expected == found,
        }
    }
}
