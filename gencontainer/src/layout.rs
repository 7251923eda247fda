//! Layout description: an ordered list of 7-field tuples
//!
//! ```text
//! # comment
//! ('BOOT', 'out.bin', 'CLASSIC', 'RSA2048', 'key.pem', 0x1000, 0),
//! ('PLD0', 'pld.bin', 'Lz4',     'SHA2_256', '',       0x10,   0),
//! ('_SG_', '',        'Dummy',   'SHA2_256', '',       0,      0),
//! ```
//!
//! The first row describes the container: signature, output file, image
//! type, header auth type, key file, alignment and an unused size. Every
//! following row is a component: name, source file, compression, auth type,
//! key file, alignment and reserved region size. Empty strings and zero
//! numbers select defaults.

use crate::component_entry::MONO_SIG_NAME;
use crate::container::Container;
use crate::error::{ContainerError, Result};
use crate::types::{AuthType, CompressAlg, HashAlg, ImageType, tag_from_str, tag_to_string};
use std::fmt;

/// Placeholder key name written for RSA entries on extraction
pub const DEFAULT_KEY_FILE: &str = "TestSigningPrivateKey.pem";

/// Alignment given to the `INRD` component of a generated layout
const INRD_ALIGNMENT: u32 = 0x1000;

/// Alignment of the container row in a generated layout
const GENERATED_CONTAINER_ALIGNMENT: u32 = 0x10;

/// The container row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub signature: [u8; 4],
    /// Output file name; empty selects `<signature>.bin`
    pub file: String,
    pub image_type: ImageType,
    pub auth_type: AuthType,
    pub key_file: String,
    /// Zero selects the default container alignment
    pub alignment: u32,
    pub size: u32,
}

impl ContainerSpec {
    pub fn output_name(&self) -> String {
        if self.file.is_empty() {
            format!("{}.bin", tag_to_string(&self.signature))
        } else {
            self.file.clone()
        }
    }
}

/// A component row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSpec {
    pub name: [u8; 4],
    /// Source file; empty synthesizes a placeholder
    pub file: String,
    pub compress: CompressAlg,
    pub auth_type: AuthType,
    pub key_file: String,
    /// Zero inherits the container alignment
    pub alignment: u32,
    /// Zero sizes the region automatically
    pub size: u32,
}

impl ComponentSpec {
    pub fn name_str(&self) -> String {
        tag_to_string(&self.name)
    }

    pub fn is_mono_signature(&self) -> bool {
        self.name.eq_ignore_ascii_case(MONO_SIG_NAME.as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub container: ContainerSpec,
    pub components: Vec<ComponentSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Comma,
    Str(String),
    Int(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Str(String),
    Int(u64),
}

fn tokenize(text: &str) -> Result<Vec<(Token, usize)>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            c if c.is_whitespace() => {}
            '#' => {
                while chars.next_if(|&c| c != '\n').is_some() {}
            }
            '(' => tokens.push((Token::Open, line)),
            ')' => tokens.push((Token::Close, line)),
            ',' => tokens.push((Token::Comma, line)),
            '[' | ']' => {}
            '\'' | '"' => {
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some(q) if q == c => break,
                        Some('\n') | None => {
                            return Err(ContainerError::layout(line, "unterminated string"));
                        }
                        Some('\\') => value.push('/'),
                        Some(ch) => value.push(ch),
                    }
                }
                tokens.push((Token::Str(value), line));
            }
            c if c.is_ascii_digit() => {
                let mut word = String::from(c);
                while let Some(ch) = chars.next_if(|ch| ch.is_ascii_alphanumeric() || *ch == '_') {
                    word.push(ch);
                }
                tokens.push((Token::Int(parse_int(&word, line)?), line));
            }
            other => {
                return Err(ContainerError::layout(
                    line,
                    format!("unexpected character '{other}'"),
                ));
            }
        }
    }
    Ok(tokens)
}

fn parse_int(word: &str, line: usize) -> Result<u64> {
    let word = word.replace('_', "");
    let parsed = match word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => word.parse::<u64>(),
    };
    parsed.map_err(|_| ContainerError::layout(line, format!("invalid number '{word}'")))
}

/// Group tokens into rows of values
fn rows(tokens: &[(Token, usize)]) -> Result<Vec<(Vec<Value>, usize)>> {
    let mut rows = Vec::new();
    let mut iter = tokens.iter();

    while let Some((token, line)) = iter.next() {
        match token {
            Token::Comma => continue,
            Token::Open => {}
            _ => return Err(ContainerError::layout(*line, "expected '('")),
        }

        let mut values = Vec::new();
        let mut expect_value = true;
        loop {
            let Some((token, at)) = iter.next() else {
                return Err(ContainerError::layout(*line, "unterminated row"));
            };
            match token {
                Token::Close => break,
                Token::Comma if !expect_value => expect_value = true,
                Token::Str(s) if expect_value => {
                    values.push(Value::Str(s.clone()));
                    expect_value = false;
                }
                Token::Int(v) if expect_value => {
                    values.push(Value::Int(*v));
                    expect_value = false;
                }
                _ => return Err(ContainerError::layout(*at, "malformed row")),
            }
        }
        rows.push((values, *line));
    }
    Ok(rows)
}

/// Typed access to the 7 fields of one row
struct Row {
    values: Vec<Value>,
    line: usize,
}

impl Row {
    const FIELDS: usize = 7;

    fn new(values: Vec<Value>, line: usize) -> Result<Self> {
        if values.len() != Self::FIELDS {
            return Err(ContainerError::layout(
                line,
                format!("expected {} fields, found {}", Self::FIELDS, values.len()),
            ));
        }
        Ok(Self { values, line })
    }

    fn str(&self, idx: usize) -> Result<&str> {
        match &self.values[idx] {
            Value::Str(s) => Ok(s.trim()),
            Value::Int(_) => Err(ContainerError::layout(
                self.line,
                format!("field {} must be a string", idx + 1),
            )),
        }
    }

    fn int(&self, idx: usize) -> Result<u32> {
        match &self.values[idx] {
            Value::Int(v) => u32::try_from(*v).map_err(|_| {
                ContainerError::layout(self.line, format!("field {} is too large", idx + 1))
            }),
            Value::Str(_) => Err(ContainerError::layout(
                self.line,
                format!("field {} must be a number", idx + 1),
            )),
        }
    }

    fn alignment(&self, idx: usize) -> Result<u32> {
        let value = self.int(idx)?;
        if value != 0 && !value.is_power_of_two() {
            return Err(ContainerError::layout(
                self.line,
                format!("alignment 0x{value:X} is not a power of two"),
            ));
        }
        Ok(value)
    }

    fn tag(&self, idx: usize) -> Result<[u8; 4]> {
        tag_from_str(self.str(idx)?).map_err(|e| ContainerError::layout(self.line, e.to_string()))
    }

    fn parse<T: std::str::FromStr<Err = ContainerError>>(&self, idx: usize) -> Result<T> {
        self.str(idx)?
            .parse()
            .map_err(|e: ContainerError| ContainerError::layout(self.line, e.to_string()))
    }
}

impl Layout {
    /// Parse layout text
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = tokenize(text)?;
        let mut rows = rows(&tokens)?.into_iter();

        let (values, line) = rows
            .next()
            .ok_or_else(|| ContainerError::layout(1, "layout has no container row"))?;
        let row = Row::new(values, line)?;
        let container = ContainerSpec {
            signature: row.tag(0)?,
            file: row.str(1)?.to_string(),
            image_type: row.parse(2)?,
            auth_type: row.parse(3)?,
            key_file: row.str(4)?.to_string(),
            alignment: row.alignment(5)?,
            size: row.int(6)?,
        };

        let components = rows
            .map(|(values, line)| {
                let row = Row::new(values, line)?;
                Ok(ComponentSpec {
                    name: row.tag(0)?,
                    file: row.str(1)?.to_string(),
                    compress: row.parse(2)?,
                    auth_type: row.parse(3)?,
                    key_file: row.str(4)?.to_string(),
                    alignment: row.alignment(5)?,
                    size: row.int(6)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            container,
            components,
        })
    }

    /// Build a monolithically signed layout from `NAME:file` items
    ///
    /// The container row uses alignment 0x10 and `key_auth` as header auth;
    /// `INRD` is aligned to 0x1000, every other component inherits.
    pub fn from_component_list(
        items: &[String],
        image_type: ImageType,
        key_auth: AuthType,
        key_file: &str,
        out_file: &str,
        hash_alg: HashAlg,
    ) -> Result<Self> {
        let mut components = items
            .iter()
            .map(|item| {
                let (name, file) = item.split_once(':').unwrap_or((item.as_str(), ""));
                let name = tag_from_str(name).map_err(|_| {
                    ContainerError::InvalidName(format!("invalid component string format '{item}'"))
                })?;
                Ok(ComponentSpec {
                    name,
                    file: file.to_string(),
                    compress: CompressAlg::Dummy,
                    auth_type: AuthType::None,
                    key_file: String::new(),
                    alignment: if &name == b"INRD" { INRD_ALIGNMENT } else { 0 },
                    size: 0,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        components.push(ComponentSpec {
            name: tag_from_str(MONO_SIG_NAME)?,
            file: String::new(),
            compress: CompressAlg::Dummy,
            auth_type: hash_alg.into(),
            key_file: String::new(),
            alignment: 0,
            size: 0,
        });

        Ok(Self {
            container: ContainerSpec {
                signature: *b"BOOT",
                file: out_file.to_string(),
                image_type,
                auth_type: key_auth,
                key_file: key_file.to_string(),
                alignment: GENERATED_CONTAINER_ALIGNMENT,
                size: 0,
            },
            components,
        })
    }

    /// Layout that rebuilds `container` from the files extraction writes
    pub fn from_container(container: &Container, file_name: &str) -> Result<Self> {
        let key_for = |auth: AuthType| {
            if auth.is_rsa() {
                DEFAULT_KEY_FILE.to_string()
            } else {
                String::new()
            }
        };

        let components = container
            .components
            .iter()
            .map(|component| {
                let entry = &component.entry;
                Ok(ComponentSpec {
                    name: entry.name,
                    file: if entry.is_reserved() {
                        String::new()
                    } else {
                        format!("{}.bin", entry.name_str())
                    },
                    compress: component.lz_header()?.alg()?,
                    auth_type: entry.auth_type,
                    key_file: key_for(entry.auth_type),
                    alignment: 1u32 << entry.alignment,
                    size: entry.size,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            container: ContainerSpec {
                signature: container.header.signature,
                file: file_name.to_string(),
                image_type: container.header.image_type,
                auth_type: container.header.auth_type,
                key_file: key_for(container.header.auth_type),
                alignment: container.alignment,
                size: 0,
            },
            components,
        })
    }

    pub fn is_mono_signing(&self) -> bool {
        self.components
            .last()
            .is_some_and(ComponentSpec::is_mono_signature)
    }

    /// Reject duplicate names and a `_SG_` row that is not last, before any
    /// component is processed
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for (idx, comp) in self.components.iter().enumerate() {
            if comp.is_mono_signature() && idx + 1 != self.components.len() {
                return Err(ContainerError::MonoSigningNotLast(MONO_SIG_NAME.to_string()));
            }
            if !seen.insert(comp.name.map(|b| b.to_ascii_uppercase())) {
                return Err(ContainerError::DuplicateName(comp.name_str()));
            }
        }
        Ok(())
    }
}

/// Layout text, one aligned row per line
impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quote = |s: &str| format!("'{s}'");
        let hex = |v: u32| format!("0x{v:x}");
        let line = |cols: [String; 7]| {
            format!(
                " {:<6}, {:<16}, {:<10}, {:<10}, {:<30}, {:<8}, {:<8}",
                cols[0], cols[1], cols[2], cols[3], cols[4], cols[5], cols[6]
            )
        };

        writeln!(f, "# Container Layout File\n#")?;
        let title = [
            " Name", " ImageFile", " CompAlg", " AuthType", " KeyFile", " Alignment", " Size",
        ]
        .map(String::from);
        writeln!(f, "#  {}", line(title))?;
        writeln!(f, "# {}", "=".repeat(100))?;

        let c = &self.container;
        let header = [
            quote(&tag_to_string(&c.signature)),
            quote(&c.file),
            quote(c.image_type.as_str()),
            quote(c.auth_type.as_str()),
            quote(&c.key_file),
            hex(c.alignment),
            c.size.to_string(),
        ];
        writeln!(f, "  ({}),", line(header))?;

        for comp in &self.components {
            let row = [
                quote(&comp.name_str()),
                quote(&comp.file),
                quote(comp.compress.as_str()),
                quote(comp.auth_type.as_str()),
                quote(&comp.key_file),
                hex(comp.alignment),
                hex(comp.size),
            ];
            writeln!(f, "  ({}),", line(row))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# Container Layout File
('BOOT', 'out.bin', 'CLASSIC', 'RSA2048', 'key.pem', 0x1000, 0),
('PLD0', "dir\pld.bin", 'Lz4', 'SHA2_256', '', 0x10, 0),  # trailing comment
('_SG_', '', '', 'SHA2_384', '', 0, 0x2000),
"#;

    #[test]
    fn test_parse_layout() {
        let layout = Layout::parse(SAMPLE).unwrap();
        assert_eq!(&layout.container.signature, b"BOOT");
        assert_eq!(layout.container.image_type, ImageType::Classic);
        assert_eq!(layout.container.auth_type, AuthType::Rsa2048);
        assert_eq!(layout.container.alignment, 0x1000);

        assert_eq!(layout.components.len(), 2);
        let pld = &layout.components[0];
        assert_eq!(pld.name_str(), "PLD0");
        assert_eq!(pld.file, "dir/pld.bin");
        assert_eq!(pld.compress, CompressAlg::Lz4);
        assert_eq!(pld.alignment, 0x10);

        let sg = &layout.components[1];
        assert_eq!(sg.compress, CompressAlg::Dummy);
        assert_eq!(sg.size, 0x2000);
        assert!(layout.is_mono_signing());
    }

    #[test]
    fn test_parse_defaults() {
        let layout = Layout::parse("('ABCD', '', '', '', '', 0, 0)").unwrap();
        assert_eq!(layout.container.output_name(), "ABCD.bin");
        assert_eq!(layout.container.image_type, ImageType::Normal);
        assert_eq!(layout.container.auth_type, AuthType::None);
        assert!(layout.components.is_empty());
        assert!(!layout.is_mono_signing());
    }

    #[test]
    fn test_parse_errors_carry_line() {
        let err = Layout::parse("('BOOT', '', '', '', '', 0, 0),\n('PLD', '', '', '', '', 0, 0)")
            .unwrap_err();
        assert!(matches!(err, ContainerError::Layout { line: 2, .. }));

        let err = Layout::parse("('BOOT', '', '', '', '', 0x30, 0)").unwrap_err();
        assert!(matches!(err, ContainerError::Layout { line: 1, .. }));

        let err = Layout::parse("('BOOT', '', 'WEIRD', '', '', 0, 0)").unwrap_err();
        assert!(err.to_string().contains("WEIRD"));

        assert!(Layout::parse("('BOOT', '', '', '', '', 0)").is_err());
        assert!(Layout::parse("('BOOT', 'x.bin)").is_err());
        assert!(Layout::parse("").is_err());
    }

    #[test]
    fn test_render_parses_back() {
        let layout = Layout::parse(SAMPLE).unwrap();
        let text = layout.to_string();
        assert!(text.starts_with("# Container Layout File"));
        assert!(text.contains("  ( 'BOOT', 'out.bin'"));
        assert_eq!(Layout::parse(&text).unwrap(), layout);
    }

    #[test]
    fn test_validate() {
        let layout = Layout::parse(SAMPLE).unwrap();
        assert!(layout.validate().is_ok());

        let dup = Layout::parse(
            "('BOOT', '', '', '', '', 0, 0)\n('ABCD', '', '', '', '', 0, 0)\n('ABCD', '', '', '', '', 0, 0)",
        )
        .unwrap();
        assert!(matches!(dup.validate(), Err(ContainerError::DuplicateName(n)) if n == "ABCD"));

        let misplaced = Layout::parse(
            "('BOOT', '', '', '', '', 0, 0)\n('_SG_', '', '', '', '', 0, 0)\n('ABCD', '', '', '', '', 0, 0)",
        )
        .unwrap();
        assert!(!misplaced.is_mono_signing());
        assert!(matches!(
            misplaced.validate(),
            Err(ContainerError::MonoSigningNotLast(_))
        ));

        let lower = Layout::parse(
            "('BOOT', '', '', '', '', 0, 0)\n('abcd', '', '', '', '', 0, 0)\n('_sg_', '', '', '', '', 0, 0)",
        )
        .unwrap();
        assert!(lower.is_mono_signing());
        assert!(lower.validate().is_ok());

        let mixed = Layout::parse(
            "('BOOT', '', '', '', '', 0, 0)\n('abcd', '', '', '', '', 0, 0)\n('ABCD', '', '', '', '', 0, 0)",
        )
        .unwrap();
        assert!(matches!(mixed.validate(), Err(ContainerError::DuplicateName(n)) if n == "ABCD"));
    }

    #[test]
    fn test_component_list() {
        let items = vec!["PLD0:a.bin".to_string(), "INRD:c:/img/rd.bin".to_string()];
        let layout = Layout::from_component_list(
            &items,
            ImageType::Classic,
            AuthType::Rsa3072,
            "key.pem",
            "out.bin",
            HashAlg::Sha2_384,
        )
        .unwrap();

        assert_eq!(layout.container.alignment, 0x10);
        assert_eq!(layout.container.auth_type, AuthType::Rsa3072);
        assert_eq!(layout.components.len(), 3);
        assert_eq!(layout.components[0].alignment, 0);
        assert_eq!(layout.components[1].alignment, 0x1000);
        assert_eq!(layout.components[1].file, "c:/img/rd.bin");
        let sg = &layout.components[2];
        assert!(sg.is_mono_signature());
        assert_eq!(sg.auth_type, AuthType::Sha2_384);

        let bad = vec!["PLD:a.bin".to_string()];
        assert!(
            Layout::from_component_list(
                &bad,
                ImageType::Normal,
                AuthType::None,
                "",
                "",
                HashAlg::Sha2_256
            )
            .is_err()
        );
    }
}
