use serde::{Deserialize, Serialize};

/// The dialect a translation unit is written in. Mutations consult the flag
/// methods before choosing a strategy; they never assume the most permissive
/// dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadingLanguageVersion {
    /// ESSL 1.00 as constrained by WebGL.
    WebGl100,
    Essl300,
    Essl310,
    Glsl330,
    Glsl450,
}

impl ShadingLanguageVersion {
    #[must_use]
    pub fn supports_do_stmt(self) -> bool {
        self != ShadingLanguageVersion::WebGl100
    }

    #[must_use]
    pub fn supports_switch_stmt(self) -> bool {
        self != ShadingLanguageVersion::WebGl100
    }

    #[must_use]
    pub fn supports_bitwise_operations(self) -> bool {
        self != ShadingLanguageVersion::WebGl100
    }

    #[must_use]
    pub fn supports_unsigned(self) -> bool {
        self != ShadingLanguageVersion::WebGl100
    }

    /// For-loop headers must have the restricted canonical shape (constant
    /// bounds, simple counter).
    #[must_use]
    pub fn restricted_for_loops(self) -> bool {
        self == ShadingLanguageVersion::WebGl100
    }

    /// Array indices must be constant or loop counters.
    #[must_use]
    pub fn restricted_array_indexing(self) -> bool {
        self == ShadingLanguageVersion::WebGl100
    }

    #[must_use]
    pub fn is_webgl(self) -> bool {
        self == ShadingLanguageVersion::WebGl100
    }

    /// Initializers of `const` variables must themselves be constant
    /// expressions.
    #[must_use]
    pub fn initializers_of_const_must_be_const(self) -> bool {
        self == ShadingLanguageVersion::WebGl100
    }

    /// Whether fragment shaders write `gl_FragColor` rather than a declared
    /// `out` variable.
    #[must_use]
    pub fn supports_gl_frag_color(self) -> bool {
        self == ShadingLanguageVersion::WebGl100
    }

    /// Whether `barrier()` can be called from compute shaders.
    #[must_use]
    pub fn supports_barrier(self) -> bool {
        matches!(
            self,
            ShadingLanguageVersion::Essl310 | ShadingLanguageVersion::Glsl450
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaderKind {
    Vertex,
    Fragment,
    Compute,
}
