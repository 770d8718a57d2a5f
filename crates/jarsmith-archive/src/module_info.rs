//! Reads the module name and version out of a `module-info.class` file.
//!
//! Only the constant pool and the `Module` attribute header are decoded;
//! everything else in the class file is skipped.

use jarsmith_core::{ArchiveError, ArchiveResult};

/// Identity of a Java module descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub version: Option<String>,
}

enum Constant {
    Utf8(String),
    Module(u16),
    Other,
    /// Second slot of a long or double
    Unusable,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_bytes(&mut self, n: usize) -> ArchiveResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| malformed("unexpected end of class file"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u1(&mut self) -> ArchiveResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u2(&mut self) -> ArchiveResult<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u4(&mut self) -> ArchiveResult<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

fn malformed(message: &str) -> ArchiveError {
    ArchiveError::InvalidArgument(format!("module-info.class: {message}"))
}

/// Parse a module descriptor; `Ok(None)` when the class has no `Module` attribute
pub fn parse_module_info(bytes: &[u8]) -> ArchiveResult<Option<ModuleInfo>> {
    let mut reader = Reader::new(bytes);
    if reader.read_u4()? != 0xCAFE_BABE {
        return Err(malformed("bad magic"));
    }
    reader.read_u2()?; // minor
    reader.read_u2()?; // major
    let pool = read_constant_pool(&mut reader)?;

    reader.read_u2()?; // access_flags
    reader.read_u2()?; // this_class
    reader.read_u2()?; // super_class
    let interfaces = reader.read_u2()?;
    for _ in 0..interfaces {
        reader.read_u2()?;
    }
    for _ in 0..2 {
        // fields, then methods
        let members = reader.read_u2()?;
        for _ in 0..members {
            reader.read_bytes(6)?;
            skip_attributes(&mut reader)?;
        }
    }

    let attributes = reader.read_u2()?;
    for _ in 0..attributes {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let info = reader.read_bytes(length)?;
        if utf8(&pool, name_index)? != "Module" {
            continue;
        }
        let mut module = Reader::new(info);
        let name_index = module.read_u2()?;
        module.read_u2()?; // flags
        let version_index = module.read_u2()?;

        let name = match pool.get(usize::from(name_index)) {
            Some(Constant::Module(utf8_index)) => utf8(&pool, *utf8_index)?.to_string(),
            _ => return Err(malformed("module name is not a Module constant")),
        };
        let version = if version_index == 0 {
            None
        } else {
            Some(utf8(&pool, version_index)?.to_string())
        };
        return Ok(Some(ModuleInfo { name, version }));
    }
    Ok(None)
}

fn skip_attributes(reader: &mut Reader<'_>) -> ArchiveResult<()> {
    let count = reader.read_u2()?;
    for _ in 0..count {
        reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        reader.read_bytes(length)?;
    }
    Ok(())
}

fn read_constant_pool(reader: &mut Reader<'_>) -> ArchiveResult<Vec<Constant>> {
    let count = usize::from(reader.read_u2()?);
    let mut pool = Vec::with_capacity(count);
    pool.push(Constant::Unusable);
    while pool.len() < count {
        let tag = reader.read_u1()?;
        match tag {
            1 => {
                let length = usize::from(reader.read_u2()?);
                let bytes = reader.read_bytes(length)?;
                pool.push(Constant::Utf8(String::from_utf8_lossy(bytes).into_owned()));
            }
            19 => pool.push(Constant::Module(reader.read_u2()?)),
            7 | 8 | 16 | 20 => {
                reader.read_u2()?;
                pool.push(Constant::Other);
            }
            15 => {
                reader.read_bytes(3)?;
                pool.push(Constant::Other);
            }
            3 | 4 | 9 | 10 | 11 | 12 | 17 | 18 => {
                reader.read_u4()?;
                pool.push(Constant::Other);
            }
            5 | 6 => {
                reader.read_bytes(8)?;
                pool.push(Constant::Other);
                pool.push(Constant::Unusable);
            }
            other => return Err(malformed(&format!("unknown constant tag {other}"))),
        }
    }
    Ok(pool)
}

fn utf8(pool: &[Constant], index: u16) -> ArchiveResult<&str> {
    match pool.get(usize::from(index)) {
        Some(Constant::Utf8(s)) => Ok(s),
        _ => Err(malformed(&format!("constant {index} is not UTF-8"))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    #![allow(non_snake_case)]

    use super::*;

    fn utf8_constant(out: &mut Vec<u8>, s: &str) {
        out.push(1);
        out.extend_from_slice(&(s.len() as u16).to_be_bytes());
        out.extend_from_slice(s.as_bytes());
    }

    /// A minimal module-info class with the given name and version
    pub(crate) fn module_info_class(name: &str, version: Option<&str>) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABE_u32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&53u16.to_be_bytes());
        // #1 "Module", #2 name, #3 Module(#2), #4 version
        out.extend_from_slice(&5u16.to_be_bytes());
        utf8_constant(&mut out, "Module");
        utf8_constant(&mut out, name);
        out.push(19);
        out.extend_from_slice(&2u16.to_be_bytes());
        utf8_constant(&mut out, version.unwrap_or(""));
        out.extend_from_slice(&0x8000u16.to_be_bytes()); // ACC_MODULE
        out.extend_from_slice(&[0, 0, 0, 0]); // this, super
        out.extend_from_slice(&[0, 0, 0, 0, 0, 0]); // interfaces, fields, methods
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&1u16.to_be_bytes());
        let body: Vec<u8> = [
            3u16.to_be_bytes(),
            0u16.to_be_bytes(),
            (if version.is_some() { 4u16 } else { 0u16 }).to_be_bytes(),
            0u16.to_be_bytes(), // requires
            0u16.to_be_bytes(), // exports
            0u16.to_be_bytes(), // opens
            0u16.to_be_bytes(), // uses
            0u16.to_be_bytes(), // provides
        ]
        .concat();
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn parse_module_info___reads_name_and_version() {
        let bytes = module_info_class("com.acme.core", Some("1.2"));

        let info = parse_module_info(&bytes).unwrap().unwrap();

        assert_eq!(info.name, "com.acme.core");
        assert_eq!(info.version.as_deref(), Some("1.2"));
    }

    #[test]
    fn parse_module_info___without_version___returns_none_version() {
        let bytes = module_info_class("m", None);

        let info = parse_module_info(&bytes).unwrap().unwrap();

        assert_eq!(info.version, None);
    }

    #[test]
    fn parse_module_info___bad_magic___returns_error() {
        let result = parse_module_info(&[0, 1, 2, 3, 4, 5, 6, 7]);

        assert!(result.is_err());
    }

    #[test]
    fn parse_module_info___truncated___returns_error() {
        let bytes = module_info_class("m", None);

        let result = parse_module_info(&bytes[..20]);

        assert!(result.is_err());
    }
}
