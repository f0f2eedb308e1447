use serde::{Deserialize, Serialize};

/// Scalar, vector and square matrix types of the shading language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasicType {
    Float,
    Int,
    Uint,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    IVec2,
    IVec3,
    IVec4,
    UVec2,
    UVec3,
    UVec4,
    BVec2,
    BVec3,
    BVec4,
    Mat2,
    Mat3,
    Mat4,
}

impl BasicType {
    pub const ALL: [BasicType; 19] = [
        BasicType::Float,
        BasicType::Int,
        BasicType::Uint,
        BasicType::Bool,
        BasicType::Vec2,
        BasicType::Vec3,
        BasicType::Vec4,
        BasicType::IVec2,
        BasicType::IVec3,
        BasicType::IVec4,
        BasicType::UVec2,
        BasicType::UVec3,
        BasicType::UVec4,
        BasicType::BVec2,
        BasicType::BVec3,
        BasicType::BVec4,
        BasicType::Mat2,
        BasicType::Mat3,
        BasicType::Mat4,
    ];

    /// The `float`-element scalar/vector types, i.e. what builtin signatures
    /// call `genType`.
    pub const GEN_TYPES: [BasicType; 4] = [
        BasicType::Float,
        BasicType::Vec2,
        BasicType::Vec3,
        BasicType::Vec4,
    ];

    #[must_use]
    pub fn glsl_name(self) -> &'static str {
        match self {
            BasicType::Float => "float",
            BasicType::Int => "int",
            BasicType::Uint => "uint",
            BasicType::Bool => "bool",
            BasicType::Vec2 => "vec2",
            BasicType::Vec3 => "vec3",
            BasicType::Vec4 => "vec4",
            BasicType::IVec2 => "ivec2",
            BasicType::IVec3 => "ivec3",
            BasicType::IVec4 => "ivec4",
            BasicType::UVec2 => "uvec2",
            BasicType::UVec3 => "uvec3",
            BasicType::UVec4 => "uvec4",
            BasicType::BVec2 => "bvec2",
            BasicType::BVec3 => "bvec3",
            BasicType::BVec4 => "bvec4",
            BasicType::Mat2 => "mat2",
            BasicType::Mat3 => "mat3",
            BasicType::Mat4 => "mat4",
        }
    }

    #[must_use]
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            BasicType::Float | BasicType::Int | BasicType::Uint | BasicType::Bool
        )
    }

    #[must_use]
    pub fn is_vector(self) -> bool {
        !self.is_scalar() && !self.is_matrix()
    }

    #[must_use]
    pub fn is_matrix(self) -> bool {
        matches!(self, BasicType::Mat2 | BasicType::Mat3 | BasicType::Mat4)
    }

    #[must_use]
    pub fn is_boolean(self) -> bool {
        self.element_type() == BasicType::Bool
    }

    #[must_use]
    pub fn is_integral(self) -> bool {
        matches!(self.element_type(), BasicType::Int | BasicType::Uint)
    }

    #[must_use]
    pub fn is_numeric(self) -> bool {
        !self.is_boolean()
    }

    /// Scalar type of one component; matrices have `float` components.
    #[must_use]
    pub fn element_type(self) -> BasicType {
        match self {
            BasicType::Float | BasicType::Vec2 | BasicType::Vec3 | BasicType::Vec4 => {
                BasicType::Float
            }
            BasicType::Int | BasicType::IVec2 | BasicType::IVec3 | BasicType::IVec4 => {
                BasicType::Int
            }
            BasicType::Uint | BasicType::UVec2 | BasicType::UVec3 | BasicType::UVec4 => {
                BasicType::Uint
            }
            BasicType::Bool | BasicType::BVec2 | BasicType::BVec3 | BasicType::BVec4 => {
                BasicType::Bool
            }
            BasicType::Mat2 | BasicType::Mat3 | BasicType::Mat4 => BasicType::Float,
        }
    }

    /// Number of scalar components (matrices count all entries).
    #[must_use]
    pub fn num_elements(self) -> u32 {
        match self {
            BasicType::Float | BasicType::Int | BasicType::Uint | BasicType::Bool => 1,
            BasicType::Vec2 | BasicType::IVec2 | BasicType::UVec2 | BasicType::BVec2 => 2,
            BasicType::Vec3 | BasicType::IVec3 | BasicType::UVec3 | BasicType::BVec3 => 3,
            BasicType::Vec4 | BasicType::IVec4 | BasicType::UVec4 | BasicType::BVec4 => 4,
            BasicType::Mat2 => 4,
            BasicType::Mat3 => 9,
            BasicType::Mat4 => 16,
        }
    }

    /// Side length for matrices, component count otherwise.
    #[must_use]
    pub fn columns(self) -> u32 {
        match self {
            BasicType::Mat2 => 2,
            BasicType::Mat3 => 3,
            BasicType::Mat4 => 4,
            other => other.num_elements(),
        }
    }

    /// The vector type with the given element type and width; width 1 yields
    /// the element type itself. Panics on widths outside 1..=4 or matrix
    /// element types.
    #[must_use]
    pub fn make_vector(element: BasicType, width: u32) -> BasicType {
        assert!(element.is_scalar(), "vector element must be a scalar type");
        match (element, width) {
            (e, 1) => e,
            (BasicType::Float, 2) => BasicType::Vec2,
            (BasicType::Float, 3) => BasicType::Vec3,
            (BasicType::Float, 4) => BasicType::Vec4,
            (BasicType::Int, 2) => BasicType::IVec2,
            (BasicType::Int, 3) => BasicType::IVec3,
            (BasicType::Int, 4) => BasicType::IVec4,
            (BasicType::Uint, 2) => BasicType::UVec2,
            (BasicType::Uint, 3) => BasicType::UVec3,
            (BasicType::Uint, 4) => BasicType::UVec4,
            (BasicType::Bool, 2) => BasicType::BVec2,
            (BasicType::Bool, 3) => BasicType::BVec3,
            (BasicType::Bool, 4) => BasicType::BVec4,
            (e, w) => panic!("no vector type for {} x {w}", e.glsl_name()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeQualifier {
    Const,
    Uniform,
    ShaderInput,
    ShaderOutput,
    InParam,
    OutParam,
    InoutParam,
}

/// A value type, optionally wrapped in qualifiers. Qualifiers never nest:
/// `Qualified` always wraps an unqualified type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Void,
    Basic(BasicType),
    Struct(String),
    Array(Box<Type>, u32),
    Qualified(Vec<TypeQualifier>, Box<Type>),
}

impl Type {
    #[must_use]
    pub fn qualified(qualifiers: Vec<TypeQualifier>, target: Type) -> Type {
        debug_assert!(!matches!(target, Type::Qualified(..)));
        Type::Qualified(qualifiers, Box::new(target))
    }

    /// Strips the qualifier wrapper, if any. Two types are compared for
    /// mutation-legality purposes using this form.
    #[must_use]
    pub fn without_qualifiers(&self) -> &Type {
        match self {
            Type::Qualified(_, target) => target,
            other => other,
        }
    }

    #[must_use]
    pub fn has_qualifier(&self, qualifier: TypeQualifier) -> bool {
        match self {
            Type::Qualified(qualifiers, _) => qualifiers.contains(&qualifier),
            _ => false,
        }
    }

    #[must_use]
    pub fn has_qualifiers(&self) -> bool {
        matches!(self, Type::Qualified(qualifiers, _) if !qualifiers.is_empty())
    }

    #[must_use]
    pub fn as_basic(&self) -> Option<BasicType> {
        match self.without_qualifiers() {
            Type::Basic(basic) => Some(*basic),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self.without_qualifiers(), Type::Array(..))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_construction_round_trips() {
        for ty in BasicType::ALL {
            if ty.is_scalar() || ty.is_vector() {
                assert_eq!(
                    BasicType::make_vector(ty.element_type(), ty.num_elements()),
                    ty
                );
            }
        }
    }

    #[test]
    fn matrices_have_float_elements() {
        for ty in [BasicType::Mat2, BasicType::Mat3, BasicType::Mat4] {
            assert_eq!(ty.element_type(), BasicType::Float);
            assert_eq!(ty.num_elements(), ty.columns() * ty.columns());
        }
    }

    #[test]
    fn qualifier_stripping() {
        let ty = Type::qualified(
            vec![TypeQualifier::Uniform],
            Type::Basic(BasicType::Vec2),
        );
        assert_eq!(ty.without_qualifiers(), &Type::Basic(BasicType::Vec2));
        assert!(ty.has_qualifier(TypeQualifier::Uniform));
        assert!(!ty.has_qualifier(TypeQualifier::Const));
    }
}
