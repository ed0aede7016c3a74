//! Relevé des déclarations d'uniforms pour le périphérique logiciel
//!
//! Le source est analysé par le crate `glsl`. Seules les déclarations
//! `uniform` de premier niveau sont relevées : les uniforms du bloc par
//! défaut (structures aplaties comme le fait le pilote, `Light.color`,
//! `Lights[1].color`) et les blocs d'uniforms avec leur taille std140.

use std::collections::HashMap;
use std::fmt;

use glsl::parser::Parse;
use glsl::syntax::{
    ArraySpecifier, ArraySpecifierDimension, BinaryOp, Block, Declaration, Expr, ExternalDeclaration,
    InitDeclaratorList, Initializer, StorageQualifier, StructFieldSpecifier, StructSpecifier, TranslationUnit,
    TypeQualifier, TypeQualifierSpec, TypeSpecifierNonArray,
};

/// Type des composantes d'un scalaire, vecteur ou matrice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Float,
    Double,
    Int,
    UInt,
    Bool,
}

impl ScalarKind {
    fn size(self) -> usize {
        match self {
            ScalarKind::Double => 8,
            _ => 4,
        }
    }
}

/// Type feuille d'un uniform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlslType {
    Scalar(ScalarKind),
    Vector(ScalarKind, usize),
    /// Matrice `colonnes x lignes`, stockée par colonnes
    Matrix { double: bool, columns: usize, rows: usize },
    /// Sampler, image ou compteur atomique
    Opaque,
}

impl GlslType {
    pub const VEC4: GlslType = GlslType::Vector(ScalarKind::Float, 4);

    fn from_syntax(ty: &TypeSpecifierNonArray) -> Option<Self> {
        use TypeSpecifierNonArray as T;

        let scalar = GlslType::Scalar;
        let vector = GlslType::Vector;
        let matrix = |double, columns, rows| GlslType::Matrix { double, columns, rows };

        let leaf = match ty {
            T::Void | T::Struct(_) | T::TypeName(_) => return None,
            T::Bool => scalar(ScalarKind::Bool),
            T::Int => scalar(ScalarKind::Int),
            T::UInt => scalar(ScalarKind::UInt),
            T::Float => scalar(ScalarKind::Float),
            T::Double => scalar(ScalarKind::Double),
            T::Vec2 => vector(ScalarKind::Float, 2),
            T::Vec3 => vector(ScalarKind::Float, 3),
            T::Vec4 => vector(ScalarKind::Float, 4),
            T::DVec2 => vector(ScalarKind::Double, 2),
            T::DVec3 => vector(ScalarKind::Double, 3),
            T::DVec4 => vector(ScalarKind::Double, 4),
            T::BVec2 => vector(ScalarKind::Bool, 2),
            T::BVec3 => vector(ScalarKind::Bool, 3),
            T::BVec4 => vector(ScalarKind::Bool, 4),
            T::IVec2 => vector(ScalarKind::Int, 2),
            T::IVec3 => vector(ScalarKind::Int, 3),
            T::IVec4 => vector(ScalarKind::Int, 4),
            T::UVec2 => vector(ScalarKind::UInt, 2),
            T::UVec3 => vector(ScalarKind::UInt, 3),
            T::UVec4 => vector(ScalarKind::UInt, 4),
            T::Mat2 => matrix(false, 2, 2),
            T::Mat3 => matrix(false, 3, 3),
            T::Mat4 => matrix(false, 4, 4),
            T::Mat23 => matrix(false, 2, 3),
            T::Mat24 => matrix(false, 2, 4),
            T::Mat32 => matrix(false, 3, 2),
            T::Mat34 => matrix(false, 3, 4),
            T::Mat42 => matrix(false, 4, 2),
            T::Mat43 => matrix(false, 4, 3),
            T::DMat2 => matrix(true, 2, 2),
            T::DMat3 => matrix(true, 3, 3),
            T::DMat4 => matrix(true, 4, 4),
            T::DMat23 => matrix(true, 2, 3),
            T::DMat24 => matrix(true, 2, 4),
            T::DMat32 => matrix(true, 3, 2),
            T::DMat34 => matrix(true, 3, 4),
            T::DMat42 => matrix(true, 4, 2),
            T::DMat43 => matrix(true, 4, 3),
            _ => GlslType::Opaque,
        };
        Some(leaf)
    }

    /// Disposition std140 d'un élément isolé, `None` pour un type opaque
    fn std140_layout(self) -> Option<Layout> {
        match self {
            GlslType::Scalar(kind) => Some(Layout {
                size: kind.size(),
                align: kind.size(),
            }),
            GlslType::Vector(kind, len) => Some(vector_layout(kind, len)),
            // Tableau de colonnes, chacune alignée sur un vec4
            GlslType::Matrix { double, columns, rows } => {
                let kind = if double { ScalarKind::Double } else { ScalarKind::Float };
                let stride = round_up(vector_layout(kind, rows).align, 16);
                Some(Layout {
                    size: stride * columns,
                    align: stride,
                })
            }
            GlslType::Opaque => None,
        }
    }
}

/// Uniform feuille du bloc par défaut
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: String,
    pub ty: GlslType,
    /// `None` si déclaré sans crochets
    pub array_len: Option<usize>,
}

impl UniformDecl {
    /// Nombre d'éléments (1 hors tableau)
    pub fn len(&self) -> usize {
        self.array_len.unwrap_or(1)
    }
}

/// Bloc d'uniforms et sa taille std140
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDecl {
    pub name: String,
    pub size: usize,
}

/// Déclarations relevées dans un source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    pub uniforms: Vec<UniformDecl>,
    pub blocks: Vec<BlockDecl>,
    pub has_main: bool,
}

/// Erreur de relevé, rendue comme journal de compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError(pub String);

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    size: usize,
    align: usize,
}

fn round_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

fn vector_layout(kind: ScalarKind, len: usize) -> Layout {
    let component = kind.size();
    // vec3 s'aligne comme un vec4
    let align_len = if len == 3 { 4 } else { len };
    Layout {
        size: component * len,
        align: component * align_len,
    }
}

fn has_storage(qualifier: Option<&TypeQualifier>, storage: StorageQualifier) -> bool {
    qualifier.is_some_and(|q| {
        q.qualifiers
            .0
            .iter()
            .any(|spec| matches!(spec, TypeQualifierSpec::Storage(s) if *s == storage))
    })
}

/// Type résolu : feuille ou champs d'une structure
enum Shape<'a> {
    Leaf(GlslType),
    Struct(&'a [StructFieldSpecifier]),
}

/// Structures et constantes entières visibles au niveau global
#[derive(Default)]
struct Scope<'a> {
    structs: HashMap<String, &'a StructSpecifier>,
    constants: HashMap<String, i64>,
}

impl<'a> Scope<'a> {
    fn eval(&self, expr: &Expr) -> Option<i64> {
        match expr {
            Expr::IntConst(value) => Some(i64::from(*value)),
            Expr::UIntConst(value) => Some(i64::from(*value)),
            Expr::Variable(name) => self.constants.get(&name.0).copied(),
            Expr::Binary(op, lhs, rhs) => {
                let (lhs, rhs) = (self.eval(lhs)?, self.eval(rhs)?);
                match op {
                    BinaryOp::Add => lhs.checked_add(rhs),
                    BinaryOp::Sub => lhs.checked_sub(rhs),
                    BinaryOp::Mult => lhs.checked_mul(rhs),
                    BinaryOp::Div => lhs.checked_div(rhs),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Nombre total d'éléments des spécificateurs de tableau (type puis nom)
    fn array_len(&self, name: &str, specs: [Option<&ArraySpecifier>; 2]) -> Result<Option<usize>, ScanError> {
        let mut total: Option<usize> = None;

        for spec in specs.into_iter().flatten() {
            for dimension in &spec.dimensions.0 {
                let len = match dimension {
                    ArraySpecifierDimension::ExplicitlySized(expr) => self
                        .eval(expr)
                        .filter(|len| *len > 0)
                        .and_then(|len| usize::try_from(len).ok())
                        .ok_or_else(|| ScanError(format!("ERROR: taille de tableau invalide pour '{}'", name)))?,
                    ArraySpecifierDimension::Unsized => {
                        return Err(ScanError(format!("ERROR: tableau '{}' sans taille", name)));
                    }
                };
                total = Some(total.unwrap_or(1) * len);
            }
        }

        Ok(total)
    }

    fn shape(&self, ty: &'a TypeSpecifierNonArray) -> Result<Shape<'a>, ScanError> {
        match ty {
            TypeSpecifierNonArray::Struct(spec) => Ok(Shape::Struct(&spec.fields.0)),
            TypeSpecifierNonArray::TypeName(name) => self
                .structs
                .get(&name.0)
                .copied()
                .map(|spec| Shape::Struct(&spec.fields.0))
                .ok_or_else(|| ScanError(format!("ERROR: type inconnu '{}'", name.0))),
            other => GlslType::from_syntax(other)
                .map(Shape::Leaf)
                .ok_or_else(|| ScanError("ERROR: uniform de type void".to_string())),
        }
    }

    /// Liste d'initialisation globale : structure, constante ou uniform
    fn declare(&mut self, list: &'a InitDeclaratorList, decls: &mut Declarations) -> Result<(), ScanError> {
        let head = &list.head;
        if let TypeSpecifierNonArray::Struct(spec) = &head.ty.ty.ty {
            if let Some(name) = &spec.name {
                self.structs.insert(name.0.clone(), spec);
            }
        }

        let qualifier = head.ty.qualifier.as_ref();
        let declared = head
            .name
            .iter()
            .map(|name| (name, head.array_specifier.as_ref(), head.initializer.as_ref()))
            .chain(
                list.tail
                    .iter()
                    .map(|t| (&t.ident.ident, t.ident.array_spec.as_ref(), t.initializer.as_ref())),
            );

        if has_storage(qualifier, StorageQualifier::Const) {
            for (name, _, initializer) in declared {
                if let Some(Initializer::Simple(expr)) = initializer {
                    if let Some(value) = self.eval(expr) {
                        self.constants.insert(name.0.clone(), value);
                    }
                }
            }
        } else if has_storage(qualifier, StorageQualifier::Uniform) {
            for (name, array, _) in declared {
                let len = self.array_len(&name.0, [head.ty.ty.array_specifier.as_ref(), array])?;
                self.push_uniform(name.0.clone(), &head.ty.ty.ty, len, decls)?;
            }
        }

        Ok(())
    }

    /// Ajoute un uniform, aplati membre par membre s'il s'agit d'une structure
    fn push_uniform(
        &self,
        name: String,
        ty: &'a TypeSpecifierNonArray,
        array_len: Option<usize>,
        decls: &mut Declarations,
    ) -> Result<(), ScanError> {
        match self.shape(ty)? {
            Shape::Leaf(ty) => decls.uniforms.push(UniformDecl { name, ty, array_len }),
            Shape::Struct(fields) => {
                let prefixes: Vec<String> = match array_len {
                    None => vec![name],
                    Some(len) => (0..len).map(|i| format!("{}[{}]", name, i)).collect(),
                };
                for prefix in &prefixes {
                    for field in fields {
                        for ident in &field.identifiers.0 {
                            let member = format!("{}.{}", prefix, ident.ident.0);
                            let len =
                                self.array_len(&member, [field.ty.array_specifier.as_ref(), ident.array_spec.as_ref()])?;
                            self.push_uniform(member, &field.ty.ty, len, decls)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn member_layout(
        &self,
        member: &str,
        ty: &'a TypeSpecifierNonArray,
        array_len: Option<usize>,
    ) -> Result<Layout, ScanError> {
        let element = match self.shape(ty)? {
            Shape::Leaf(leaf) => leaf
                .std140_layout()
                .ok_or_else(|| ScanError(format!("ERROR: type de membre non supporté pour '{}'", member)))?,
            Shape::Struct(fields) => self.struct_layout(fields)?,
        };

        Ok(match array_len {
            None => element,
            Some(len) => {
                let align = round_up(element.align, 16);
                Layout {
                    size: round_up(element.size, align) * len,
                    align,
                }
            }
        })
    }

    fn struct_layout(&self, fields: &'a [StructFieldSpecifier]) -> Result<Layout, ScanError> {
        let mut offset = 0;
        let mut align = 16;

        for field in fields {
            for ident in &field.identifiers.0 {
                let name = &ident.ident.0;
                let len = self.array_len(name, [field.ty.array_specifier.as_ref(), ident.array_spec.as_ref()])?;
                let member = self.member_layout(name, &field.ty.ty, len)?;
                offset = round_up(offset, member.align) + member.size;
                align = align.max(member.align);
            }
        }

        Ok(Layout {
            size: round_up(offset, align),
            align,
        })
    }

    fn block_size(&self, block: &'a Block) -> Result<usize, ScanError> {
        if let Some(instance) = &block.identifier {
            self.array_len(&instance.ident.0, [instance.array_spec.as_ref(), None])?;
        }
        Ok(self.struct_layout(&block.fields)?.size)
    }
}

/// Relève les uniforms, blocs et la présence de `main` d'un source GLSL
pub fn scan(source: &str) -> Result<Declarations, ScanError> {
    let unit = TranslationUnit::parse(source)
        .map_err(|e| ScanError(format!("ERROR: 0:0: erreur de syntaxe: {:?}", e)))?;

    let mut scope = Scope::default();
    let mut decls = Declarations::default();

    for external in unit.0 .0.iter() {
        match external {
            ExternalDeclaration::FunctionDefinition(function) => {
                if function.prototype.name.0 == "main" {
                    decls.has_main = true;
                }
            }
            ExternalDeclaration::Declaration(Declaration::InitDeclaratorList(list)) => {
                scope.declare(list, &mut decls)?;
            }
            ExternalDeclaration::Declaration(Declaration::Block(block))
                if has_storage(Some(&block.qualifier), StorageQualifier::Uniform) =>
            {
                decls.blocks.push(BlockDecl {
                    name: block.name.0.clone(),
                    size: scope.block_size(block)?,
                });
            }
            _ => {}
        }
    }

    Ok(decls)
}
