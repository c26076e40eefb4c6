// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Binding annotations: which named shader resource corresponds to which (group, binding).

GLSL ES 3.0 has no `layout(binding = N)` for uniform blocks or samplers, so the emulation has to
learn the mapping some other way and then assign slots through the program after linking.  The
shader generator can either hand over a structured manifest
([crate::images::shader::ShaderModuleDescriptor::bindings]) or leave comment pragmas in the
source:

```glsl
// @group(0) @binding(0) uniform Camera
// @group(1) @binding(0) texture u_albedo @sampler(1)
```

The first form names a uniform block.  The second names a sampler uniform and, optionally, the
binding in the same group holding the sampler object to pair with it at draw time.
*/

/// One resolved annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BindingAnnotation {
    UniformBlock {
        group: u32,
        binding: u32,
        /// Block name as declared in the shader.
        name: String,
    },
    Texture {
        group: u32,
        binding: u32,
        /// Name of the `sampler*` uniform.
        name: String,
        /// Binding (same group) of the paired sampler object.
        sampler_binding: Option<u32>,
    },
}

impl BindingAnnotation {
    pub fn group(&self) -> u32 {
        match self {
            BindingAnnotation::UniformBlock { group, .. } => *group,
            BindingAnnotation::Texture { group, .. } => *group,
        }
    }
    pub fn binding(&self) -> u32 {
        match self {
            BindingAnnotation::UniformBlock { binding, .. } => *binding,
            BindingAnnotation::Texture { binding, .. } => *binding,
        }
    }
    pub fn name(&self) -> &str {
        match self {
            BindingAnnotation::UniformBlock { name, .. } => name,
            BindingAnnotation::Texture { name, .. } => name,
        }
    }
}

/// Scans shader source for annotation comments, in source order.
///
/// Lines that don't parse as an annotation are ignored.
pub fn scan(source: &str) -> Vec<BindingAnnotation> {
    source
        .lines()
        .filter_map(|line| {
            let comment = line.split_once("//")?.1;
            parse_annotation(comment)
        })
        .collect()
}

fn parse_annotation(comment: &str) -> Option<BindingAnnotation> {
    let mut rest = comment.trim_start();
    let group = attribute(&mut rest, "@group")?;
    let binding = attribute(&mut rest, "@binding")?;
    let (kind, after_kind) = word(rest)?;
    let (name, after_name) = word(after_kind)?;
    rest = after_name;
    match kind {
        "uniform" => Some(BindingAnnotation::UniformBlock {
            group,
            binding,
            name: name.to_string(),
        }),
        "texture" => {
            let sampler_binding = if rest.trim_start().is_empty() {
                None
            } else {
                Some(attribute(&mut rest, "@sampler")?)
            };
            Some(BindingAnnotation::Texture {
                group,
                binding,
                name: name.to_string(),
                sampler_binding,
            })
        }
        _ => None,
    }
}

/// Parses `tag(N)` at the front of `rest`, advancing past it.
fn attribute(rest: &mut &str, tag: &str) -> Option<u32> {
    let s = rest.trim_start().strip_prefix(tag)?;
    let s = s.trim_start().strip_prefix('(')?;
    let (number, s) = s.split_once(')')?;
    let value = number.trim().parse().ok()?;
    *rest = s;
    Some(value)
}

fn word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    let end = s
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(s.len());
    if end == 0 {
        None
    } else {
        Some((&s[..end], &s[end..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_both_forms() {
        let source = "#version 300 es\n\
            // @group(0) @binding(0) uniform Camera\n\
            layout(std140) uniform Camera { mat4 view; };\n\
            uniform sampler2D u_albedo; // @group(1) @binding(0) texture u_albedo @sampler(1)\n\
            // @group(1) @binding(2) texture u_mask\n";
        assert_eq!(
            scan(source),
            vec![
                BindingAnnotation::UniformBlock {
                    group: 0,
                    binding: 0,
                    name: "Camera".to_string()
                },
                BindingAnnotation::Texture {
                    group: 1,
                    binding: 0,
                    name: "u_albedo".to_string(),
                    sampler_binding: Some(1)
                },
                BindingAnnotation::Texture {
                    group: 1,
                    binding: 2,
                    name: "u_mask".to_string(),
                    sampler_binding: None
                },
            ]
        );
    }

    #[test]
    fn tolerates_spacing() {
        assert_eq!(
            scan("//@group( 2 )  @binding (3)   uniform   Lights"),
            vec![BindingAnnotation::UniformBlock {
                group: 2,
                binding: 3,
                name: "Lights".to_string()
            }]
        );
    }

    #[test]
    fn ignores_ordinary_comments() {
        assert!(scan("// group 0 binding 0\n// @group(x) @binding(0) uniform A\n").is_empty());
        assert!(scan("// @group(0) @binding(0) storage A").is_empty());
        assert!(scan("// @group(0) @binding(0) texture t garbage").is_empty());
    }
}
