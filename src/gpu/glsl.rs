//! Source-level GLSL checks backing the headless context.
//!
//! This is not a compiler. It catches the mistakes that show up while
//! iterating on tutorial shaders (missing `#version`, unbalanced braces, a
//! dropped `;` at the end of a block, no `main`) and reflects the global
//! interface the linker needs: stage inputs/outputs and default-block
//! uniforms. Diagnostics follow the `0:LINE: error: ...` shape used by
//! common drivers.

use std::collections::HashMap;

use super::ShaderStage;

/// Interface of a shader stage that passed the checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct StageInterface {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    /// Uniform names as `glGetUniformLocation` accepts them, with struct
    /// members and array elements expanded.
    pub uniforms: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    text: &'a str,
    line: usize,
}

#[derive(Debug, Clone)]
struct Member {
    name: String,
    ty: String,
    /// `ty` named a struct declared before this member.
    nested: bool,
    array_len: Option<usize>,
}

/// Upper bound on expanded uniform names per stage, in the range GL 3.3
/// drivers report for `GL_MAX_UNIFORM_LOCATIONS`.
const MAX_UNIFORM_LOCATIONS: usize = 1024;

const STORAGE_QUALIFIERS: &[&str] = &[
    "const",
    "flat",
    "smooth",
    "noperspective",
    "centroid",
    "invariant",
    "highp",
    "mediump",
    "lowp",
];

/// Checks `source` for `stage` and returns its global interface, or the
/// info log text on failure.
pub(crate) fn check(stage: ShaderStage, source: &str) -> Result<StageInterface, String> {
    let cleaned = strip_comments(source)?;
    let cleaned = strip_preprocessor(&cleaned)?;
    let tokens = tokenize(&cleaned);
    check_delimiters(&tokens)?;
    check_block_terminators(&tokens)?;
    if !defines_main(&tokens) {
        return Err(format!("0:1: error: {stage} shader lacks `main'"));
    }
    reflect(&tokens)
}

/// Verifies that every fragment input is written by the vertex stage.
pub(crate) fn check_interface(
    vertex: &StageInterface,
    fragment: &StageInterface,
) -> Result<(), String> {
    let missing: Vec<String> = fragment
        .inputs
        .iter()
        .filter(|input| !vertex.outputs.contains(input))
        .map(|input| {
            format!(
                "error: fragment shader input `{input}' has no matching output \
                 in the previous stage"
            )
        })
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(missing.join("\n"))
    }
}

fn strip_comments(source: &str) -> Result<String, String> {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut line = 1;
    while let Some(ch) = chars.next() {
        match (ch, chars.peek().copied()) {
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        line += 1;
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                let start = line;
                chars.next();
                let mut closed = false;
                let mut previous = ' ';
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        line += 1;
                    }
                    if previous == '*' && next == '/' {
                        closed = true;
                        break;
                    }
                    previous = next;
                }
                if !closed {
                    return Err(format!("0:{start}: error: unterminated comment"));
                }
                out.push(' ');
            }
            _ => {
                if ch == '\n' {
                    line += 1;
                }
                out.push(ch);
            }
        }
    }
    Ok(out)
}

/// Requires `#version` before any code and blanks out directive lines.
fn strip_preprocessor(source: &str) -> Result<String, String> {
    let mut seen_version = false;
    let mut out = String::with_capacity(source.len());
    for (index, line) in source.lines().enumerate() {
        let trimmed = line.trim_start();
        if let Some(directive) = trimmed.strip_prefix('#') {
            if directive.trim_start().starts_with("version") {
                if seen_version {
                    return Err(format!(
                        "0:{}: error: #version must appear once, before anything else",
                        index + 1
                    ));
                }
                seen_version = true;
            }
        } else {
            if !trimmed.is_empty() && !seen_version {
                return Err(format!("0:{}: error: missing #version directive", index + 1));
            }
            out.push_str(line);
        }
        out.push('\n');
    }
    if !seen_version {
        return Err("0:1: error: missing #version directive".to_string());
    }
    Ok(out)
}

fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let bytes = source.as_bytes();
    let mut line = 1;
    let mut index = 0;
    while index < bytes.len() {
        let byte = bytes[index];
        if byte == b'\n' {
            line += 1;
            index += 1;
        } else if byte.is_ascii_whitespace() {
            index += 1;
        } else if byte.is_ascii_alphanumeric()
            || byte == b'_'
            || (byte == b'.' && bytes.get(index + 1).is_some_and(u8::is_ascii_digit))
        {
            let start = index;
            let numeric = !(byte.is_ascii_alphabetic() || byte == b'_');
            index += 1;
            while index < bytes.len() {
                let next = bytes[index];
                if next.is_ascii_alphanumeric() || next == b'_' || (numeric && next == b'.') {
                    index += 1;
                } else {
                    break;
                }
            }
            tokens.push(Token {
                text: &source[start..index],
                line,
            });
        } else {
            let width = source[index..].chars().next().map_or(1, char::len_utf8);
            tokens.push(Token {
                text: &source[index..index + width],
                line,
            });
            index += width;
        }
    }
    tokens
}

fn check_delimiters(tokens: &[Token<'_>]) -> Result<(), String> {
    let mut stack: Vec<Token<'_>> = Vec::new();
    for token in tokens {
        match token.text {
            "(" | "[" | "{" => stack.push(*token),
            ")" | "]" | "}" => {
                let expected = match token.text {
                    ")" => "(",
                    "]" => "[",
                    _ => "{",
                };
                match stack.pop() {
                    Some(open) if open.text == expected => {}
                    _ => {
                        return Err(format!(
                            "0:{}: error: syntax error, unexpected '{}'",
                            token.line, token.text
                        ))
                    }
                }
            }
            _ => {}
        }
    }
    match stack.pop() {
        Some(open) => Err(format!(
            "0:{}: error: syntax error, unmatched '{}'",
            open.line, open.text
        )),
        None => Ok(()),
    }
}

fn check_block_terminators(tokens: &[Token<'_>]) -> Result<(), String> {
    for pair in tokens.windows(2) {
        if pair[1].text == "}" && !matches!(pair[0].text, ";" | "{" | "}") {
            return Err(format!(
                "0:{}: error: syntax error, unexpected '}}', expecting ';' after '{}'",
                pair[0].line, pair[0].text
            ));
        }
    }
    Ok(())
}

fn defines_main(tokens: &[Token<'_>]) -> bool {
    let texts: Vec<&str> = tokens.iter().map(|token| token.text).collect();
    texts.windows(4).enumerate().any(|(index, window)| {
        if window[..3] != ["void", "main", "("] {
            return false;
        }
        let rest = &texts[index + 3..];
        matches!(rest, [")", "{", ..] | ["void", ")", "{", ..])
    })
}

/// Walks the global scope collecting struct types, stage interface
/// variables and default-block uniforms.
fn reflect(tokens: &[Token<'_>]) -> Result<StageInterface, String> {
    let mut interface = StageInterface::default();
    let mut structs: HashMap<String, Vec<Member>> = HashMap::new();
    let mut pending: Vec<&str> = Vec::new();
    let mut index = 0;

    while index < tokens.len() {
        let token = tokens[index];
        match token.text {
            ";" => {
                declare(&pending, token.line, &structs, &mut interface)?;
                pending.clear();
                index += 1;
            }
            "{" => {
                let close = matching_brace(tokens, index);
                if pending.first() == Some(&"struct") {
                    if let Some(name) = pending.get(1) {
                        let body: Vec<&str> =
                            tokens[index + 1..close].iter().map(|t| t.text).collect();
                        let members = declare_struct(name, &body, token.line, &structs)?;
                        structs.insert(name.to_string(), members);
                    }
                }
                // Functions and interface blocks end at the brace; a struct
                // may still declare variables before its ';'.
                if pending.first() != Some(&"struct") {
                    pending.clear();
                }
                index = close + 1;
            }
            text => {
                pending.push(text);
                index += 1;
            }
        }
    }

    Ok(interface)
}

fn matching_brace(tokens: &[Token<'_>], open: usize) -> usize {
    let mut depth = 0usize;
    for (offset, token) in tokens[open..].iter().enumerate() {
        match token.text {
            "{" => depth += 1,
            "}" => {
                depth -= 1;
                if depth == 0 {
                    return open + offset;
                }
            }
            _ => {}
        }
    }
    tokens.len() - 1
}

/// Parses a struct body. Member types resolve against the structs declared
/// so far, so the type graph stays acyclic.
fn declare_struct(
    name: &str,
    body: &[&str],
    line: usize,
    structs: &HashMap<String, Vec<Member>>,
) -> Result<Vec<Member>, String> {
    if structs.contains_key(name) {
        return Err(format!("0:{line}: error: redefinition of struct `{name}'"));
    }
    let mut members = Vec::new();
    for statement in body.split(|text| *text == ";") {
        let statement = skip_qualifiers(statement);
        let Some((ty, declarators)) = statement.split_first() else {
            continue;
        };
        if *ty == name {
            return Err(format!("0:{line}: error: struct `{name}' cannot contain itself"));
        }
        for (member, array_len) in declarators_of(declarators) {
            members.push(Member {
                name: member,
                ty: ty.to_string(),
                nested: structs.contains_key(*ty),
                array_len,
            });
        }
    }
    Ok(members)
}

fn declare(
    statement: &[&str],
    line: usize,
    structs: &HashMap<String, Vec<Member>>,
    interface: &mut StageInterface,
) -> Result<(), String> {
    let statement = strip_layout(statement);
    let storage = statement
        .iter()
        .position(|text| matches!(*text, "uniform" | "in" | "out"));
    let Some(position) = storage else {
        return Ok(());
    };
    // Parameter qualifiers of a function prototype.
    if statement[..position].contains(&"(") {
        return Ok(());
    }
    let rest = skip_qualifiers(&statement[position + 1..]);
    let Some((ty, declarators)) = rest.split_first() else {
        return Ok(());
    };
    for (name, array_len) in declarators_of(declarators) {
        match statement[position] {
            "uniform" => {
                let uniform = Uniform {
                    name: &name,
                    ty,
                    nested: structs.contains_key(*ty),
                    array_len,
                };
                expand_uniform(uniform, structs, &mut interface.uniforms).map_err(|()| {
                    format!(
                        "0:{line}: error: uniform `{name}' needs more than \
                         {MAX_UNIFORM_LOCATIONS} locations"
                    )
                })?;
            }
            "in" => interface.inputs.push(name),
            _ => interface.outputs.push(name),
        }
    }
    Ok(())
}

fn strip_layout<'a>(statement: &[&'a str]) -> Vec<&'a str> {
    let mut out = Vec::with_capacity(statement.len());
    let mut index = 0;
    while index < statement.len() {
        if statement[index] == "layout" && statement.get(index + 1) == Some(&"(") {
            let mut depth = 0;
            index += 1;
            while index < statement.len() {
                match statement[index] {
                    "(" => depth += 1,
                    ")" => {
                        depth -= 1;
                        if depth == 0 {
                            index += 1;
                            break;
                        }
                    }
                    _ => {}
                }
                index += 1;
            }
        } else {
            out.push(statement[index]);
            index += 1;
        }
    }
    out
}

fn skip_qualifiers<'s, 'a>(statement: &'s [&'a str]) -> &'s [&'a str] {
    let start = statement
        .iter()
        .position(|text| !STORAGE_QUALIFIERS.contains(text))
        .unwrap_or(statement.len());
    &statement[start..]
}

/// Splits `a, b[4], c = 1.0` into names with optional array lengths.
fn declarators_of(tokens: &[&str]) -> Vec<(String, Option<usize>)> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut segment: Vec<&str> = Vec::new();
    for text in tokens.iter().copied().chain(std::iter::once(",")) {
        match text {
            "(" | "[" => depth += 1,
            ")" | "]" => depth -= 1,
            _ => {}
        }
        if text == "," && depth == 0 {
            if let Some(name) = segment.first() {
                let array_len = match segment.get(1..4) {
                    Some(["[", len, "]"]) => {
                        Some(len.trim_end_matches(['u', 'U']).parse::<usize>().unwrap_or(1))
                    }
                    _ => None,
                };
                out.push((name.to_string(), array_len));
            }
            segment.clear();
        } else {
            segment.push(text);
        }
    }
    out
}

/// One uniform declarator, or a struct member reached through one.
#[derive(Debug, Clone, Copy)]
struct Uniform<'a> {
    name: &'a str,
    ty: &'a str,
    nested: bool,
    array_len: Option<usize>,
}

/// Expands `uniform` into location names. Fails once the stage would need
/// more than [`MAX_UNIFORM_LOCATIONS`] names.
fn expand_uniform(
    uniform: Uniform<'_>,
    structs: &HashMap<String, Vec<Member>>,
    out: &mut Vec<String>,
) -> Result<(), ()> {
    if let Some(len) = uniform.array_len {
        if len > MAX_UNIFORM_LOCATIONS {
            return Err(());
        }
        if !uniform.nested {
            push_unique(out, uniform.name.to_string())?;
        }
        for element in 0..len {
            let name = format!("{}[{element}]", uniform.name);
            let element = Uniform {
                name: &name,
                array_len: None,
                ..uniform
            };
            expand_uniform(element, structs, out)?;
        }
        return Ok(());
    }
    match structs.get(uniform.ty).filter(|_| uniform.nested) {
        Some(members) => {
            for member in members {
                let name = format!("{}.{}", uniform.name, member.name);
                let member = Uniform {
                    name: &name,
                    ty: &member.ty,
                    nested: member.nested,
                    array_len: member.array_len,
                };
                expand_uniform(member, structs, out)?;
            }
            Ok(())
        }
        None => push_unique(out, uniform.name.to_string()),
    }
}

fn push_unique(out: &mut Vec<String>, name: String) -> Result<(), ()> {
    if !out.contains(&name) {
        if out.len() >= MAX_UNIFORM_LOCATIONS {
            return Err(());
        }
        out.push(name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r#"#version 330 core
layout (location = 0) in vec3 aPos;
layout (location = 1) in vec3 aNormal;
layout (location = 2) in vec2 aTexCoords;

out vec3 FragPos;
out vec3 Normal;
out vec2 TexCoords;

uniform mat4 model;
uniform mat4 view;
uniform mat4 projection;

void main()
{
    FragPos = vec3(model * vec4(aPos, 1.0));
    Normal = mat3(transpose(inverse(model))) * aNormal;
    TexCoords = aTexCoords;
    gl_Position = projection * view * vec4(FragPos, 1.0);
}
"#;

    const FRAGMENT: &str = r#"#version 330 core
out vec4 FragColor;

struct Material {
    sampler2D diffuse;
    sampler2D specular;
    float shininess;
};

struct Light {
    vec3 position;
    vec3 ambient, diffuse;
};

in vec3 FragPos;
in vec3 Normal;
in vec2 TexCoords;

uniform vec3 viewPos;
uniform Material material;
uniform Light lights[2];

/* lighting is
   intentionally minimal */
void main()
{
    vec3 color = texture(material.diffuse, TexCoords).rgb;
    if (length(Normal) > 0.0) {
        color *= lights[0].ambient;
    }
    FragColor = vec4(color, 1.0);
}
"#;

    #[test]
    fn reflects_vertex_interface() {
        let interface = check(ShaderStage::Vertex, VERTEX).unwrap();
        assert_eq!(interface.inputs, vec!["aPos", "aNormal", "aTexCoords"]);
        assert_eq!(interface.outputs, vec!["FragPos", "Normal", "TexCoords"]);
        assert_eq!(interface.uniforms, vec!["model", "view", "projection"]);
    }

    #[test]
    fn expands_struct_and_array_uniforms() {
        let interface = check(ShaderStage::Fragment, FRAGMENT).unwrap();
        for name in [
            "viewPos",
            "material.diffuse",
            "material.specular",
            "material.shininess",
            "lights[0].position",
            "lights[1].ambient",
            "lights[1].diffuse",
        ] {
            assert!(interface.uniforms.iter().any(|u| u == name), "missing {name}");
        }
        assert!(!interface.uniforms.iter().any(|u| u == "material"));
        assert_eq!(interface.outputs, vec!["FragColor"]);
    }

    #[test]
    fn reports_missing_semicolon_with_line() {
        let source = "#version 330 core\nvoid main()\n{\n    gl_Position = vec4(0.0)\n}\n";
        let log = check(ShaderStage::Vertex, source).unwrap_err();
        assert!(log.starts_with("0:4: error"), "{log}");
    }

    #[test]
    fn reports_unbalanced_braces() {
        let source = "#version 330 core\nvoid main()\n{\n    gl_Position = vec4(0.0);\n";
        let log = check(ShaderStage::Vertex, source).unwrap_err();
        assert!(log.contains("unmatched '{'"), "{log}");
    }

    #[test]
    fn requires_version_and_main() {
        let log = check(ShaderStage::Vertex, "void main() {}\n").unwrap_err();
        assert!(log.contains("missing #version"));

        let source = "#version 330 core\nvoid helper() {}\n";
        let log = check(ShaderStage::Fragment, source).unwrap_err();
        assert!(log.contains("fragment shader lacks `main'"));
    }

    #[test]
    fn reports_unterminated_comment() {
        let source = "#version 330 core\n/* open\nvoid main() {}\n";
        let log = check(ShaderStage::Vertex, source).unwrap_err();
        assert_eq!(log, "0:2: error: unterminated comment");
    }

    #[test]
    fn interface_mismatch_names_missing_varying() {
        let vertex = check(ShaderStage::Vertex, VERTEX).unwrap();
        let mut fragment = check(ShaderStage::Fragment, FRAGMENT).unwrap();
        assert!(check_interface(&vertex, &fragment).is_ok());

        fragment.inputs.push("Color".to_string());
        let log = check_interface(&vertex, &fragment).unwrap_err();
        assert!(log.contains("`Color'"));
    }

    #[test]
    fn self_referencing_struct_is_a_compile_error() {
        let source = "#version 330 core\nstruct S { S s; };\nuniform S u;\nout vec4 c;\n\
                      void main()\n{\n    c = vec4(1.0);\n}\n";
        let log = check(ShaderStage::Fragment, source).unwrap_err();
        assert_eq!(log, "0:2: error: struct `S' cannot contain itself");
    }

    #[test]
    fn structs_only_nest_previously_declared_types() {
        let source = "#version 330 core\nstruct A { B b; };\nstruct B { A a; };\n\
                      uniform B u;\nvoid main() {}\n";
        let interface = check(ShaderStage::Vertex, source).unwrap();
        assert_eq!(interface.uniforms, vec!["u.a.b"]);

        let source = "#version 330 core\nstruct A { float x; };\nstruct A { int y; };\n\
                      void main() {}\n";
        let log = check(ShaderStage::Vertex, source).unwrap_err();
        assert!(log.contains("redefinition of struct `A'"), "{log}");
    }

    #[test]
    fn oversized_uniform_arrays_are_rejected() {
        let source = "#version 330 core\nuniform float a[1000000000];\nvoid main() {}\n";
        let log = check(ShaderStage::Vertex, source).unwrap_err();
        assert!(log.starts_with("0:2: error: uniform `a'"), "{log}");

        let source = "#version 330 core\nstruct P { vec4 v[600]; };\nuniform P p[2];\n\
                      void main() {}\n";
        assert!(check(ShaderStage::Vertex, source).is_err());

        let source = "#version 330 core\nuniform vec3 offsets[64];\nvoid main() {}\n";
        let interface = check(ShaderStage::Vertex, source).unwrap();
        assert_eq!(interface.uniforms.len(), 65);
    }
}
