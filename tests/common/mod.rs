// Minimal PE writer for test fixtures: one .idata section holding the
// import directory, thunk tables, hint/name entries, and DLL name strings.
#![allow(dead_code)]
use std::fs;
use std::path::Path;

pub const MACHINE_I386: u16 = 0x014c;
pub const MACHINE_ARM: u16 = 0x01c0;
pub const MACHINE_AMD64: u16 = 0x8664;
pub const MACHINE_ARM64: u16 = 0xaa64;

const E_LFANEW: usize = 0x80;
const SECTION_RVA: usize = 0x1000;
const SECTION_RAW: usize = 0x200;
const DESCRIPTOR_LEN: usize = 20;

pub struct PeBuilder {
    machine: u16,
    pe32: bool,
    imports: Vec<(String, usize)>,
}

impl Default for PeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PeBuilder {
    pub fn new() -> Self {
        Self {
            machine: MACHINE_AMD64,
            pe32: false,
            imports: Vec::new(),
        }
    }

    pub fn machine(mut self, code: u16) -> Self {
        self.machine = code;
        self
    }

    /// Emit a PE32 optional header with 4-byte thunks instead of PE32+.
    pub fn pe32(mut self) -> Self {
        self.pe32 = true;
        self
    }

    /// Import one DLL with a single named symbol.
    pub fn import(self, name: &str) -> Self {
        self.import_with_symbols(name, 1)
    }

    /// Import one DLL with `symbols` named entries; zero symbols produces a
    /// descriptor with an empty thunk table, which readers must skip.
    pub fn import_with_symbols(mut self, name: &str, symbols: usize) -> Self {
        self.imports.push((name.to_string(), symbols));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let thunk_len = if self.pe32 { 4 } else { 8 };
        let opt_len = if self.pe32 { 224 } else { 240 };
        let ndesc = self.imports.len();
        let desc_len = (ndesc + 1) * DESCRIPTOR_LEN;

        // Section content layout, offsets relative to the section start.
        let mut cursor = desc_len;
        let mut thunk_offs = Vec::with_capacity(ndesc);
        for (_, symbols) in &self.imports {
            thunk_offs.push(cursor);
            cursor += (symbols + 1) * thunk_len;
        }
        let mut hint_offs: Vec<Vec<usize>> = Vec::with_capacity(ndesc);
        for (index, (_, symbols)) in self.imports.iter().enumerate() {
            let mut offs = Vec::with_capacity(*symbols);
            for symbol in 0..*symbols {
                offs.push(cursor);
                let label = symbol_label(index, symbol);
                let mut entry = 2 + label.len() + 1;
                entry += entry % 2;
                cursor += entry;
            }
            hint_offs.push(offs);
        }
        let mut name_offs = Vec::with_capacity(ndesc);
        for (name, _) in &self.imports {
            name_offs.push(cursor);
            cursor += name.len() + 1;
        }
        let content_len = cursor;

        let mut content = vec![0u8; content_len];
        for index in 0..ndesc {
            let off = index * DESCRIPTOR_LEN;
            let thunk_rva = (SECTION_RVA + thunk_offs[index]) as u32;
            write_u32(&mut content, off, thunk_rva);
            write_u32(&mut content, off + 12, (SECTION_RVA + name_offs[index]) as u32);
            write_u32(&mut content, off + 16, thunk_rva);
        }
        for (index, offs) in hint_offs.iter().enumerate() {
            for (symbol, &hint_off) in offs.iter().enumerate() {
                let entry_rva = (SECTION_RVA + hint_off) as u64;
                let off = thunk_offs[index] + symbol * thunk_len;
                if self.pe32 {
                    write_u32(&mut content, off, entry_rva as u32);
                } else {
                    write_u64(&mut content, off, entry_rva);
                }
                let label = symbol_label(index, symbol);
                content[hint_off + 2..hint_off + 2 + label.len()]
                    .copy_from_slice(label.as_bytes());
            }
        }
        for (index, (name, _)) in self.imports.iter().enumerate() {
            let off = name_offs[index];
            content[off..off + name.len()].copy_from_slice(name.as_bytes());
        }

        let mut bytes = vec![0u8; SECTION_RAW + content_len];
        bytes[0..2].copy_from_slice(b"MZ");
        write_u32(&mut bytes, 0x3c, E_LFANEW as u32);
        bytes[E_LFANEW..E_LFANEW + 4].copy_from_slice(b"PE\0\0");

        let coff = E_LFANEW + 4;
        write_u16(&mut bytes, coff, self.machine);
        write_u16(&mut bytes, coff + 2, 1);
        write_u16(&mut bytes, coff + 16, opt_len as u16);
        write_u16(&mut bytes, coff + 18, 0x2022);

        let opt = coff + 20;
        let (magic, count_off, dirs_off) = if self.pe32 {
            (0x010bu16, opt + 92, opt + 96)
        } else {
            (0x020bu16, opt + 108, opt + 112)
        };
        write_u16(&mut bytes, opt, magic);
        write_u32(&mut bytes, count_off, 16);
        write_u32(&mut bytes, dirs_off + 8, SECTION_RVA as u32);
        write_u32(&mut bytes, dirs_off + 12, desc_len as u32);

        let sec = opt + opt_len;
        bytes[sec..sec + 6].copy_from_slice(b".idata");
        write_u32(&mut bytes, sec + 8, content_len as u32);
        write_u32(&mut bytes, sec + 12, SECTION_RVA as u32);
        write_u32(&mut bytes, sec + 16, content_len as u32);
        write_u32(&mut bytes, sec + 20, SECTION_RAW as u32);

        bytes[SECTION_RAW..].copy_from_slice(&content);
        bytes
    }

    pub fn write(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture dirs");
        }
        fs::write(path, self.build()).expect("write fixture");
    }
}

/// Write a plugin binary as `<prefix>/lib/gstreamer-1.0/gst<name>.dll`.
pub fn write_plugin(prefix: &Path, name: &str, builder: &PeBuilder) {
    builder.write(
        &prefix
            .join("lib")
            .join("gstreamer-1.0")
            .join(format!("gst{name}.dll")),
    );
}

/// Write a shared DLL as `<prefix>/bin/<file>`.
pub fn write_bin_dll(prefix: &Path, file: &str, builder: &PeBuilder) {
    builder.write(&prefix.join("bin").join(file));
}

fn symbol_label(import: usize, symbol: usize) -> String {
    format!("fn{import}_{symbol}")
}

fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}
