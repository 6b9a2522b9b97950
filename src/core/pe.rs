// PE image parsing: machine table, import directory walk, buildtype heuristic.
// All reads are bounds-checked; arbitrary input must error, never panic.
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::core::error::{Error, ErrorKind};

const DOS_MAGIC: [u8; 2] = *b"MZ";
const PE_SIGNATURE: [u8; 4] = *b"PE\0\0";
const E_LFANEW_OFFSET: usize = 0x3c;
const COFF_HEADER_LEN: usize = 20;
const SECTION_HEADER_LEN: usize = 40;
const IMPORT_DESCRIPTOR_LEN: usize = 20;
const PE32_MAGIC: u16 = 0x010b;
const PE32PLUS_MAGIC: u16 = 0x020b;

// The import table is data directory entry 1.
const IMPORT_DIRECTORY_INDEX: u32 = 1;

// Caps that turn an unterminated table in a damaged image into an error
// instead of a walk across the whole file.
const MAX_IMPORT_DESCRIPTORS: usize = 4096;
const MAX_THUNKS_PER_DESCRIPTOR: usize = 65536;
const MAX_IMPORT_NAME_LEN: usize = 4096;

/// Debug CRT import used as the build-variant heuristic: presence among the
/// direct imports means Debug, absence means Release. The PE format records
/// no build flag, so this proxy is the best signal available.
pub const DEBUG_CRT_DLL: &str = "ucrtbased.dll";

/// Target machine, from the closed COFF machine-code table. Codes outside
/// this table fail parsing with `UnsupportedArch`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Machine {
    /// IMAGE_FILE_MACHINE_I386 (0x014c)
    Win32,
    /// IMAGE_FILE_MACHINE_ARM (0x01c0)
    Arm,
    /// IMAGE_FILE_MACHINE_AMD64 (0x8664)
    X64,
    /// IMAGE_FILE_MACHINE_ARM64 (0xaa64)
    Arm64,
}

impl Machine {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x014c => Some(Machine::Win32),
            0x01c0 => Some(Machine::Arm),
            0x8664 => Some(Machine::X64),
            0xaa64 => Some(Machine::Arm64),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Machine::Win32 => "Win32",
            Machine::Arm => "ARM",
            Machine::X64 => "x64",
            Machine::Arm64 => "ARM64",
        }
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum BuildType {
    Debug,
    Release,
}

impl BuildType {
    pub fn label(self) -> &'static str {
        match self {
            BuildType::Debug => "Debug",
            BuildType::Release => "Release",
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parse result for one image: machine plus the directly imported DLL names
/// in first-encountered import-directory order, duplicates removed.
#[derive(Clone, Debug)]
pub struct PeImage {
    pub machine: Machine,
    pub imports: Vec<String>,
}

impl PeImage {
    pub fn buildtype(&self) -> BuildType {
        if self
            .imports
            .iter()
            .any(|name| name.eq_ignore_ascii_case(DEBUG_CRT_DLL))
        {
            BuildType::Debug
        } else {
            BuildType::Release
        }
    }
}

struct Section {
    virtual_address: u32,
    virtual_size: u32,
    raw_offset: u32,
    raw_size: u32,
}

pub fn read_image(path: &Path) -> Result<PeImage, Error> {
    let bytes = fs::read(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read binary")
            .with_path(path)
            .with_source(err)
    })?;
    parse_image(&bytes).map_err(|err| err.with_path(path))
}

pub fn parse_image(bytes: &[u8]) -> Result<PeImage, Error> {
    if bytes.len() < E_LFANEW_OFFSET + 4 || bytes[0..2] != DOS_MAGIC {
        return Err(malformed("missing MZ header"));
    }
    let pe_offset = read_u32(bytes, E_LFANEW_OFFSET)? as usize;
    if fetch(bytes, pe_offset, 4)? != PE_SIGNATURE {
        return Err(malformed("missing PE signature"));
    }

    let coff = pe_offset + 4;
    fetch(bytes, coff, COFF_HEADER_LEN)?;
    let machine_code = read_u16(bytes, coff)?;
    let machine = Machine::from_code(machine_code).ok_or_else(|| {
        Error::new(ErrorKind::UnsupportedArch)
            .with_message(format!("unknown machine code 0x{machine_code:04x}"))
    })?;
    let section_count = read_u16(bytes, coff + 2)? as usize;
    let optional_len = read_u16(bytes, coff + 16)? as usize;

    let optional = coff + COFF_HEADER_LEN;
    fetch(bytes, optional, optional_len)?;
    if optional_len < 2 {
        return Err(malformed("optional header too small"));
    }
    let magic = read_u16(bytes, optional)?;
    let (dir_count_offset, dirs_offset, thunk_len) = match magic {
        PE32_MAGIC => (optional + 92, optional + 96, 4usize),
        PE32PLUS_MAGIC => (optional + 108, optional + 112, 8usize),
        _ => return Err(malformed("unknown optional header magic")),
    };

    let sections_offset = optional + optional_len;
    let mut sections = Vec::with_capacity(section_count);
    for index in 0..section_count {
        let offset = sections_offset + index * SECTION_HEADER_LEN;
        fetch(bytes, offset, SECTION_HEADER_LEN)?;
        sections.push(Section {
            virtual_size: read_u32(bytes, offset + 8)?,
            virtual_address: read_u32(bytes, offset + 12)?,
            raw_size: read_u32(bytes, offset + 16)?,
            raw_offset: read_u32(bytes, offset + 20)?,
        });
    }

    // A truncated directory list simply means no import table.
    let import_entry = dirs_offset + (IMPORT_DIRECTORY_INDEX as usize) * 8;
    if import_entry + 8 > sections_offset {
        return Ok(PeImage {
            machine,
            imports: Vec::new(),
        });
    }
    let dir_count = read_u32(bytes, dir_count_offset)?;
    if dir_count <= IMPORT_DIRECTORY_INDEX {
        return Ok(PeImage {
            machine,
            imports: Vec::new(),
        });
    }
    let import_rva = read_u32(bytes, import_entry)?;
    if import_rva == 0 {
        return Ok(PeImage {
            machine,
            imports: Vec::new(),
        });
    }

    let imports = parse_import_directory(bytes, &sections, import_rva, thunk_len)?;
    Ok(PeImage { machine, imports })
}

fn parse_import_directory(
    bytes: &[u8],
    sections: &[Section],
    import_rva: u32,
    thunk_len: usize,
) -> Result<Vec<String>, Error> {
    let mut names = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for index in 0..MAX_IMPORT_DESCRIPTORS {
        let rva = advance_rva(import_rva, index, IMPORT_DESCRIPTOR_LEN)?;
        let offset = rva_to_offset(bytes, sections, rva, IMPORT_DESCRIPTOR_LEN)?;
        let original_first_thunk = read_u32(bytes, offset)?;
        let name_rva = read_u32(bytes, offset + 12)?;
        let first_thunk = read_u32(bytes, offset + 16)?;
        if original_first_thunk == 0 && name_rva == 0 && first_thunk == 0 {
            return Ok(names);
        }
        if name_rva == 0 {
            continue;
        }
        // A descriptor without thunk entries carries no symbols; such entries
        // are forwarded or abnormal and not real dependencies.
        let thunk_rva = if original_first_thunk != 0 {
            original_first_thunk
        } else {
            first_thunk
        };
        if thunk_rva == 0 || count_thunks(bytes, sections, thunk_rva, thunk_len)? == 0 {
            continue;
        }
        let name = read_import_name(bytes, sections, name_rva)?;
        if seen.insert(name.clone()) {
            names.push(name);
        }
    }
    Err(malformed("unterminated import descriptor table"))
}

fn count_thunks(
    bytes: &[u8],
    sections: &[Section],
    thunk_rva: u32,
    thunk_len: usize,
) -> Result<usize, Error> {
    for index in 0..MAX_THUNKS_PER_DESCRIPTOR {
        let rva = advance_rva(thunk_rva, index, thunk_len)?;
        let offset = rva_to_offset(bytes, sections, rva, thunk_len)?;
        let entry = if thunk_len == 8 {
            read_u64(bytes, offset)?
        } else {
            read_u32(bytes, offset)? as u64
        };
        if entry == 0 {
            return Ok(index);
        }
    }
    Err(malformed("unterminated import thunk table"))
}

fn read_import_name(bytes: &[u8], sections: &[Section], name_rva: u32) -> Result<String, Error> {
    let start = rva_to_offset(bytes, sections, name_rva, 1)?;
    let limit = bytes.len().min(start + MAX_IMPORT_NAME_LEN);
    let Some(nul) = bytes[start..limit].iter().position(|byte| *byte == 0) else {
        return Err(malformed("unterminated import name"));
    };
    let name = std::str::from_utf8(&bytes[start..start + nul])
        .map_err(|_| malformed("import name is not valid UTF-8"))?;
    if name.is_empty() {
        return Err(malformed("empty import name"));
    }
    Ok(name.to_string())
}

fn rva_to_offset(
    bytes: &[u8],
    sections: &[Section],
    rva: u32,
    need: usize,
) -> Result<usize, Error> {
    for section in sections {
        let span = section.virtual_size.max(section.raw_size) as u64;
        let rva = rva as u64;
        let base = section.virtual_address as u64;
        if rva < base || rva - base >= span {
            continue;
        }
        let within = rva - base;
        let end = within + need as u64;
        if end > section.raw_size as u64 {
            return Err(malformed("rva points past section raw data"));
        }
        let offset = section.raw_offset as u64 + within;
        if offset + need as u64 > bytes.len() as u64 {
            return Err(malformed("section raw data extends past end of file"));
        }
        return Ok(offset as usize);
    }
    Err(malformed("rva not covered by any section"))
}

fn advance_rva(base: u32, index: usize, stride: usize) -> Result<u32, Error> {
    let rva = base as u64 + (index as u64) * (stride as u64);
    if rva > u32::MAX as u64 {
        return Err(malformed("rva overflow"));
    }
    Ok(rva as u32)
}

fn malformed(message: &str) -> Error {
    Error::new(ErrorKind::Malformed).with_message(message)
}

fn fetch(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8], Error> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| malformed("offset overflow"))?;
    if end > bytes.len() {
        return Err(malformed("structure extends past end of file"));
    }
    Ok(&bytes[offset..end])
}

fn read_u16(bytes: &[u8], offset: usize) -> Result<u16, Error> {
    let raw = fetch(bytes, offset, 2)?;
    Ok(u16::from_le_bytes([raw[0], raw[1]]))
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, Error> {
    let raw = fetch(bytes, offset, 4)?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn read_u64(bytes: &[u8], offset: usize) -> Result<u64, Error> {
    let raw = fetch(bytes, offset, 8)?;
    let mut out = [0u8; 8];
    out.copy_from_slice(raw);
    Ok(u64::from_le_bytes(out))
}
