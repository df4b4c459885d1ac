// This file is part of Retrodump.
//
// Retrodump is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Retrodump is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Retrodump.  If not, see <http://www.gnu.org/licenses/>.

//! Reader for 32-bit Windows PE images: headers, section table, import
//! and export directories, and virtual-address resolution into the raw
//! file bytes. Nothing here relocates or maps anything; we only answer
//! questions about what is in the file.
use anyhow::{ensure, Result};
use bitflags::bitflags;
use log::trace;
use std::mem;
use thiserror::Error;
use zerocopy::{
    byteorder::{LittleEndian, U16, U32},
    FromBytes, LayoutVerified, Unaligned,
};

type U16LE = U16<LittleEndian>;
type U32LE = U32<LittleEndian>;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum PeError {
    #[error("not a DOS executable")]
    NotDos,

    #[error("no PE signature at the DOS header's e_lfanew offset")]
    NotPe,

    #[error("unsupported machine type 0x{machine:X}, expected i386")]
    UnsupportedMachine { machine: u16 },

    #[error("unsupported optional header magic 0x{magic:X}, expected PE32")]
    UnsupportedMagic { magic: u16 },

    #[error("file too short for {what}")]
    Truncated { what: &'static str },

    #[error("virtual address 0x{vaddr:X} is not backed by any section")]
    BadVirtualAddress { vaddr: u32 },

    #[error("name string at 0x{vaddr:X} ran off the end of its section")]
    UnterminatedName { vaddr: u32 },
}

bitflags! {
    pub struct SectionFlags: u32 {
        const CNT_CODE               = 0x0000_0020;
        const CNT_INITIALIZED_DATA   = 0x0000_0040;
        const CNT_UNINITIALIZED_DATA = 0x0000_0080;
        const MEM_DISCARDABLE        = 0x0200_0000;
        const MEM_SHARED             = 0x1000_0000;
        const MEM_EXECUTE            = 0x2000_0000;
        const MEM_READ               = 0x4000_0000;
        const MEM_WRITE              = 0x8000_0000;
    }
}

#[derive(FromBytes, Unaligned)]
#[repr(C)]
struct CoffHeader {
    machine: U16LE,
    number_of_sections: U16LE,
    time_date_stamp: U32LE,
    pointer_to_symbol_table: U32LE,
    number_of_symbols: U32LE,
    size_of_optional_header: U16LE,
    characteristics: U16LE,
}

#[derive(FromBytes, Unaligned)]
#[repr(C)]
struct OptionalHeader {
    magic: U16LE,
    major_linker_version: u8,
    minor_linker_version: u8,
    size_of_code: U32LE,
    size_of_initialized_data: U32LE,
    size_of_uninitialized_data: U32LE,
    address_of_entry_point: U32LE,
    base_of_code: U32LE,
    base_of_data: U32LE,
}

#[derive(FromBytes, Unaligned)]
#[repr(C)]
struct WindowsHeader {
    image_base: U32LE,
    section_alignment: U32LE,
    file_alignment: U32LE,
    major_os_version: U16LE,
    minor_os_version: U16LE,
    major_image_version: U16LE,
    minor_image_version: U16LE,
    major_subsystem_version: U16LE,
    minor_subsystem_version: U16LE,
    win32_version_value: U32LE,
    size_of_image: U32LE,
    size_of_headers: U32LE,
    checksum: U32LE,
    subsystem: U16LE,
    dll_characteristics: U16LE,
    size_of_stack_reserve: U32LE,
    size_of_stack_commit: U32LE,
    size_of_heap_reserve: U32LE,
    size_of_heap_commit: U32LE,
    loader_flags: U32LE,
    number_of_rva_and_sizes: U32LE,
}

#[derive(Clone, Copy, FromBytes, Unaligned)]
#[repr(C)]
struct DataDirectory {
    virtual_address: U32LE,
    size: U32LE,
}

#[derive(FromBytes, Unaligned)]
#[repr(C)]
struct SectionHeader {
    name: [u8; 8],
    virtual_size: U32LE,
    virtual_address: U32LE,
    size_of_raw_data: U32LE,
    pointer_to_raw_data: U32LE,
    pointer_to_relocations: U32LE,
    pointer_to_line_numbers: U32LE,
    number_of_relocations: U16LE,
    number_of_line_numbers: U16LE,
    characteristics: U32LE,
}

#[derive(FromBytes, Unaligned)]
#[repr(C)]
struct ImportDescriptor {
    original_first_thunk: U32LE,
    time_date_stamp: U32LE,
    forwarder_chain: U32LE,
    name: U32LE,
    first_thunk: U32LE,
}

#[derive(FromBytes, Unaligned)]
#[repr(C)]
struct ExportDirectory {
    characteristics: U32LE,
    time_date_stamp: U32LE,
    major_version: U16LE,
    minor_version: U16LE,
    name: U32LE,
    base: U32LE,
    number_of_functions: U32LE,
    number_of_names: U32LE,
    address_of_functions: U32LE,
    address_of_names: U32LE,
    address_of_name_ordinals: U32LE,
}

const DIR_EXPORT: usize = 0;
const DIR_IMPORT: usize = 1;

fn overlay_at<'a, T>(data: &'a [u8], offset: usize, what: &'static str) -> Result<&'a T>
where
    T: FromBytes + Unaligned,
{
    let tail = data.get(offset..).ok_or(PeError::Truncated { what })?;
    let (header, _) = LayoutVerified::<&'a [u8], T>::new_unaligned_from_prefix(tail)
        .ok_or(PeError::Truncated { what })?;
    Ok(header.into_ref())
}

/// One section-table entry, with just what downstream consumers ask
/// about.
#[derive(Clone, Debug)]
pub struct Section {
    pub name: String,
    pub virtual_address: u32,
    pub virtual_size: u32,
    pub raw_offset: u32,
    pub raw_size: u32,
    pub flags: SectionFlags,
}

impl Section {
    pub fn is_executable(&self) -> bool {
        self.flags.contains(SectionFlags::MEM_EXECUTE)
    }

    pub fn is_readable(&self) -> bool {
        self.flags.contains(SectionFlags::MEM_READ)
    }

    pub fn is_writable(&self) -> bool {
        self.flags.contains(SectionFlags::MEM_WRITE)
    }

    /// The virtual span this section occupies once mapped. Raw data may
    /// be shorter than this when the tail is zero-filled at load time.
    pub fn virtual_span(&self) -> u32 {
        self.virtual_size.max(self.raw_size)
    }

    pub fn contains(&self, vaddr: u32) -> bool {
        vaddr >= self.virtual_address
            && vaddr < self.virtual_address.wrapping_add(self.virtual_span())
    }
}

/// One imported symbol: the owning DLL, the name or ordinal it binds
/// by, and the IAT slot the loader would patch.
#[derive(Clone, Debug)]
pub struct Import {
    pub dll: String,
    pub name: Option<String>,
    pub ordinal: Option<u16>,
    pub iat_vaddr: u32,
}

/// One exported symbol. `forwarder` is set when the export points back
/// into the export directory instead of at code.
#[derive(Clone, Debug)]
pub struct Export {
    pub name: String,
    pub ordinal: u16,
    pub rva: u32,
    pub forwarder: Option<String>,
}

#[derive(Debug)]
pub struct PortableExecutable {
    data: Vec<u8>,
    pub image_base: u32,
    pub entry_point: u32,
    pub sections: Vec<Section>,
    pub imports: Vec<Import>,
    pub exports: Vec<Export>,
}

impl PortableExecutable {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        assert_eq!(mem::size_of::<CoffHeader>(), 20);
        assert_eq!(mem::size_of::<OptionalHeader>(), 28);
        assert_eq!(mem::size_of::<WindowsHeader>(), 68);
        assert_eq!(mem::size_of::<SectionHeader>(), 40);

        ensure!(data.len() > 0x3C + 4, PeError::Truncated { what: "dos header" });
        ensure!(data[0] == 0x4D && data[1] == 0x5A, PeError::NotDos);
        let pe_offset = u32::from_le_bytes(data[0x3C..0x40].try_into()?) as usize;

        ensure!(
            data.len() > pe_offset + 4,
            PeError::Truncated { what: "pe signature" }
        );
        ensure!(&data[pe_offset..pe_offset + 4] == b"PE\0\0", PeError::NotPe);

        let coff_offset = pe_offset + 4;
        let coff: &CoffHeader = overlay_at(data, coff_offset, "coff header")?;
        let machine = coff.machine.get();
        ensure!(machine == 0x14C, PeError::UnsupportedMachine { machine });

        let opt_offset = coff_offset + mem::size_of::<CoffHeader>();
        let opt: &OptionalHeader = overlay_at(data, opt_offset, "optional header")?;
        let magic = opt.magic.get();
        ensure!(magic == 0x10B, PeError::UnsupportedMagic { magic });

        let win_offset = opt_offset + mem::size_of::<OptionalHeader>();
        let win: &WindowsHeader = overlay_at(data, win_offset, "windows header")?;
        let image_base = win.image_base.get();
        let entry_point = opt.address_of_entry_point.get();
        trace!(
            "image base 0x{:X}, entry point rva 0x{:X}, {} sections",
            image_base,
            entry_point,
            coff.number_of_sections.get()
        );

        let dir_offset = win_offset + mem::size_of::<WindowsHeader>();
        let dir_count = (win.number_of_rva_and_sizes.get() as usize).min(16);
        let mut directories = Vec::with_capacity(dir_count);
        for i in 0..dir_count {
            let offset = dir_offset + i * mem::size_of::<DataDirectory>();
            let dir: &DataDirectory = overlay_at(data, offset, "data directory")?;
            directories.push((dir.virtual_address.get(), dir.size.get()));
        }

        let section_table_offset = opt_offset + coff.size_of_optional_header.get() as usize;
        let mut sections = Vec::new();
        for i in 0..coff.number_of_sections.get() as usize {
            let offset = section_table_offset + i * mem::size_of::<SectionHeader>();
            let header: &SectionHeader = overlay_at(data, offset, "section header")?;
            let name_end = header.name.iter().position(|&b| b == 0).unwrap_or(8);
            let name = String::from_utf8_lossy(&header.name[..name_end]).into_owned();
            let section = Section {
                name,
                virtual_address: header.virtual_address.get(),
                virtual_size: header.virtual_size.get(),
                raw_offset: header.pointer_to_raw_data.get(),
                raw_size: header.size_of_raw_data.get(),
                flags: SectionFlags::from_bits_truncate(header.characteristics.get()),
            };
            ensure!(
                (section.raw_offset as usize + section.raw_size as usize) <= data.len(),
                PeError::Truncated { what: "section raw data" }
            );
            trace!(
                "section {} vaddr 0x{:X} vsize 0x{:X} raw 0x{:X}+0x{:X} {:?}",
                section.name,
                section.virtual_address,
                section.virtual_size,
                section.raw_offset,
                section.raw_size,
                section.flags
            );
            sections.push(section);
        }

        let mut pe = Self {
            data: data.to_vec(),
            image_base,
            entry_point,
            sections,
            imports: Vec::new(),
            exports: Vec::new(),
        };
        if let Some(&(vaddr, size)) = directories.get(DIR_IMPORT) {
            if vaddr != 0 && size != 0 {
                pe.imports = pe.parse_imports(vaddr)?;
            }
        }
        if let Some(&(vaddr, size)) = directories.get(DIR_EXPORT) {
            if vaddr != 0 && size != 0 {
                pe.exports = pe.parse_exports(vaddr, size)?;
            }
        }
        Ok(pe)
    }

    /// Resolve `len` bytes at a virtual address to the backing raw file
    /// bytes. Fails if the address is unmapped or the requested span
    /// runs past the section's raw data.
    pub fn virtual_slice(&self, vaddr: u32, len: usize) -> Result<&[u8]> {
        let section = self
            .section_at(vaddr)
            .ok_or(PeError::BadVirtualAddress { vaddr })?;
        let offset = (vaddr - section.virtual_address) as usize;
        ensure!(
            offset + len <= section.raw_size as usize,
            PeError::Truncated { what: "virtual slice" }
        );
        let start = section.raw_offset as usize + offset;
        Ok(&self.data[start..start + len])
    }

    pub fn section_at(&self, vaddr: u32) -> Option<&Section> {
        self.sections.iter().find(|s| s.contains(vaddr))
    }

    pub fn section_named(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn executable_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| s.is_executable())
    }

    /// The raw bytes backing one section.
    pub fn section_data(&self, section: &Section) -> &[u8] {
        let start = section.raw_offset as usize;
        &self.data[start..start + section.raw_size as usize]
    }

    /// Read a NUL-terminated name out of the image at a virtual address.
    fn read_name(&self, vaddr: u32) -> Result<String> {
        let section = self
            .section_at(vaddr)
            .ok_or(PeError::BadVirtualAddress { vaddr })?;
        let data = self.section_data(section);
        let offset = (vaddr - section.virtual_address) as usize;
        let tail = &data[offset.min(data.len())..];
        let end = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(PeError::UnterminatedName { vaddr })?;
        Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
    }

    fn parse_imports(&self, table_vaddr: u32) -> Result<Vec<Import>> {
        let mut imports = Vec::new();
        let descriptor_size = mem::size_of::<ImportDescriptor>();
        for i in 0.. {
            let vaddr = table_vaddr + (i * descriptor_size) as u32;
            let raw = self.virtual_slice(vaddr, descriptor_size)?;
            let desc: &ImportDescriptor = overlay_at(raw, 0, "import descriptor")?;
            // The table ends at an all-zero descriptor.
            if desc.original_first_thunk.get() == 0
                && desc.name.get() == 0
                && desc.first_thunk.get() == 0
            {
                break;
            }
            let dll = self.read_name(desc.name.get())?;
            trace!("import descriptor for {}", dll);

            // Prefer the unbound lookup table; fall back to the IAT for
            // images linked without one.
            let lookup = if desc.original_first_thunk.get() != 0 {
                desc.original_first_thunk.get()
            } else {
                desc.first_thunk.get()
            };
            for j in 0.. {
                let entry_vaddr = lookup + (j * 4) as u32;
                let entry =
                    u32::from_le_bytes(self.virtual_slice(entry_vaddr, 4)?.try_into()?);
                if entry == 0 {
                    break;
                }
                let iat_vaddr = desc.first_thunk.get() + (j * 4) as u32;
                if entry & 0x8000_0000 != 0 {
                    imports.push(Import {
                        dll: dll.clone(),
                        name: None,
                        ordinal: Some(entry as u16),
                        iat_vaddr,
                    });
                } else {
                    // Skip the two-byte hint in front of the name.
                    let name = self.read_name(entry + 2)?;
                    imports.push(Import {
                        dll: dll.clone(),
                        name: Some(name),
                        ordinal: None,
                        iat_vaddr,
                    });
                }
            }
        }
        Ok(imports)
    }

    fn parse_exports(&self, dir_vaddr: u32, dir_size: u32) -> Result<Vec<Export>> {
        let raw = self.virtual_slice(dir_vaddr, mem::size_of::<ExportDirectory>())?;
        let dir: &ExportDirectory = overlay_at(raw, 0, "export directory")?;
        let base = dir.base.get();
        let count = dir.number_of_names.get();
        trace!(
            "export directory: {} named of {} total, ordinal base {}",
            count,
            dir.number_of_functions.get(),
            base
        );

        let mut exports = Vec::with_capacity(count as usize);
        for i in 0..count {
            let name_ptr = u32::from_le_bytes(
                self.virtual_slice(dir.address_of_names.get() + i * 4, 4)?
                    .try_into()?,
            );
            let name = self.read_name(name_ptr)?;
            let index = u16::from_le_bytes(
                self.virtual_slice(dir.address_of_name_ordinals.get() + i * 2, 2)?
                    .try_into()?,
            );
            let rva = u32::from_le_bytes(
                self.virtual_slice(
                    dir.address_of_functions.get() + u32::from(index) * 4,
                    4,
                )?
                .try_into()?,
            );
            // An RVA inside the export directory itself is a forwarder
            // string, not code.
            let forwarder = if rva >= dir_vaddr && rva < dir_vaddr + dir_size {
                Some(self.read_name(rva)?)
            } else {
                None
            };
            exports.push(Export {
                name,
                ordinal: base as u16 + index,
                rva,
                forwarder,
            });
        }
        Ok(exports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Assemble a minimal PE32 image in memory: DOS stub, headers, and
    /// a caller-provided set of sections.
    struct ImageBuilder {
        sections: Vec<(String, u32, Vec<u8>, u32)>,
        directories: [(u32, u32); 16],
    }

    impl ImageBuilder {
        fn new() -> Self {
            Self {
                sections: Vec::new(),
                directories: [(0, 0); 16],
            }
        }

        fn section(mut self, name: &str, vaddr: u32, data: Vec<u8>, flags: u32) -> Self {
            self.sections.push((name.to_owned(), vaddr, data, flags));
            self
        }

        fn directory(mut self, index: usize, vaddr: u32, size: u32) -> Self {
            self.directories[index] = (vaddr, size);
            self
        }

        fn build(self) -> Vec<u8> {
            let mut image = vec![0u8; 0x40];
            image[0] = 0x4D;
            image[1] = 0x5A;
            image[0x3C..0x40].copy_from_slice(&0x40u32.to_le_bytes());

            image.extend_from_slice(b"PE\0\0");
            // COFF header
            image.extend_from_slice(&0x14Cu16.to_le_bytes());
            image.extend_from_slice(&(self.sections.len() as u16).to_le_bytes());
            image.extend_from_slice(&[0u8; 12]);
            image.extend_from_slice(&224u16.to_le_bytes());
            image.extend_from_slice(&0x0102u16.to_le_bytes());
            // Optional header
            image.extend_from_slice(&0x10Bu16.to_le_bytes());
            image.extend_from_slice(&[0u8; 14]);
            image.extend_from_slice(&0x1000u32.to_le_bytes()); // entry point
            image.extend_from_slice(&[0u8; 8]);
            // Windows header
            image.extend_from_slice(&0x40_0000u32.to_le_bytes()); // image base
            image.extend_from_slice(&0x1000u32.to_le_bytes());
            image.extend_from_slice(&0x200u32.to_le_bytes());
            image.extend_from_slice(&[0u8; 52]);
            image.extend_from_slice(&16u32.to_le_bytes());
            for (vaddr, size) in self.directories {
                image.extend_from_slice(&vaddr.to_le_bytes());
                image.extend_from_slice(&size.to_le_bytes());
            }

            // Section headers, raw data packed after a fixed header
            // area.
            let mut raw_offset = 0x400u32;
            for (name, vaddr, data, flags) in &self.sections {
                let mut name_bytes = [0u8; 8];
                name_bytes[..name.len()].copy_from_slice(name.as_bytes());
                image.extend_from_slice(&name_bytes);
                image.extend_from_slice(&(data.len() as u32).to_le_bytes());
                image.extend_from_slice(&vaddr.to_le_bytes());
                image.extend_from_slice(&(data.len() as u32).to_le_bytes());
                image.extend_from_slice(&raw_offset.to_le_bytes());
                image.extend_from_slice(&[0u8; 12]);
                image.extend_from_slice(&flags.to_le_bytes());
                raw_offset += 0x200;
            }

            let mut raw_offset = 0x400usize;
            for (_, _, data, _) in &self.sections {
                image.resize(raw_offset, 0);
                image.extend_from_slice(data);
                raw_offset += 0x200;
            }
            image.resize(raw_offset, 0);
            image
        }
    }

    const TEXT_FLAGS: u32 = 0x6000_0020; // code | execute | read
    const DATA_FLAGS: u32 = 0xC000_0040; // initialized | read | write

    fn basic_image() -> Vec<u8> {
        ImageBuilder::new()
            .section(".text", 0x1000, vec![0x55, 0x8B, 0xEC, 0xC3], TEXT_FLAGS)
            .section(".data", 0x2000, vec![1, 2, 3, 4], DATA_FLAGS)
            .build()
    }

    #[test]
    fn parses_headers_and_sections() -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let pe = PortableExecutable::from_bytes(&basic_image())?;
        assert_eq!(pe.image_base, 0x40_0000);
        assert_eq!(pe.entry_point, 0x1000);
        assert_eq!(pe.sections.len(), 2);
        assert_eq!(pe.sections[0].name, ".text");
        assert!(pe.sections[0].is_executable());
        assert!(!pe.sections[1].is_executable());
        assert!(pe.sections[1].is_writable());
        assert_eq!(pe.executable_sections().count(), 1);
        Ok(())
    }

    #[test]
    fn rejects_non_pe_input() {
        assert!(PortableExecutable::from_bytes(b"not an executable at all").is_err());
        let mut image = basic_image();
        image[0] = b'X';
        assert!(PortableExecutable::from_bytes(&image).is_err());
    }

    #[test]
    fn rejects_wrong_machine() {
        let mut image = basic_image();
        // The COFF machine field sits right after the PE signature.
        image[0x44..0x46].copy_from_slice(&0x8664u16.to_le_bytes());
        let err = PortableExecutable::from_bytes(&image).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PeError>(),
            Some(&PeError::UnsupportedMachine { machine: 0x8664 })
        );
    }

    #[test]
    fn virtual_slice_resolves_section_bytes() -> Result<()> {
        let pe = PortableExecutable::from_bytes(&basic_image())?;
        assert_eq!(pe.virtual_slice(0x1000, 4)?, &[0x55, 0x8B, 0xEC, 0xC3]);
        assert_eq!(pe.virtual_slice(0x1001, 2)?, &[0x8B, 0xEC]);
        assert_eq!(pe.virtual_slice(0x2002, 2)?, &[3, 4]);
        // Unmapped address and over-long reads fail.
        assert!(pe.virtual_slice(0x5000, 1).is_err());
        assert!(pe.virtual_slice(0x1000, 0x1000).is_err());
        Ok(())
    }

    #[test]
    fn section_lookup() -> Result<()> {
        let pe = PortableExecutable::from_bytes(&basic_image())?;
        assert_eq!(pe.section_at(0x1002).map(|s| s.name.as_str()), Some(".text"));
        assert_eq!(pe.section_at(0x3000).map(|s| s.name.as_str()), None);
        assert!(pe.section_named(".data").is_some());
        assert!(pe.section_named(".reloc").is_none());
        Ok(())
    }

    fn idata_section() -> Vec<u8> {
        // Laid out at vaddr 0x2000: one descriptor importing
        // MessageBoxA by name and ordinal 7 from user32.dll.
        let mut d = vec![0u8; 0x100];
        let desc: [u32; 5] = [0x2028, 0, 0, 0x2050, 0x2038];
        for (i, v) in desc.iter().enumerate() {
            d[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
        // Lookup table at 0x28, IAT at 0x38.
        for offset in [0x28usize, 0x38] {
            d[offset..offset + 4].copy_from_slice(&0x2060u32.to_le_bytes());
            d[offset + 4..offset + 8].copy_from_slice(&0x8000_0007u32.to_le_bytes());
        }
        d[0x50..0x5B].copy_from_slice(b"user32.dll\0");
        // Hint before the imported name.
        d[0x60..0x62].copy_from_slice(&1u16.to_le_bytes());
        d[0x62..0x6E].copy_from_slice(b"MessageBoxA\0");
        d
    }

    #[test]
    fn walks_the_import_table() -> Result<()> {
        let image = ImageBuilder::new()
            .section(".text", 0x1000, vec![0xC3], TEXT_FLAGS)
            .section(".idata", 0x2000, idata_section(), DATA_FLAGS)
            .directory(DIR_IMPORT, 0x2000, 0x28)
            .build();
        let pe = PortableExecutable::from_bytes(&image)?;
        assert_eq!(pe.imports.len(), 2);
        assert_eq!(pe.imports[0].dll, "user32.dll");
        assert_eq!(pe.imports[0].name.as_deref(), Some("MessageBoxA"));
        assert_eq!(pe.imports[0].iat_vaddr, 0x2038);
        assert_eq!(pe.imports[1].ordinal, Some(7));
        assert_eq!(pe.imports[1].iat_vaddr, 0x203C);
        Ok(())
    }

    fn edata_section() -> Vec<u8> {
        // Laid out at vaddr 0x2000: two named exports, the second a
        // forwarder.
        let mut d = vec![0u8; 0x100];
        let dir: [u32; 10] = [
            0, 0, 0, // characteristics, timestamp, versions
            0x2050, // name rva
            1,      // ordinal base
            2, 2, // functions, names
            0x2028, // address of functions
            0x2030, // address of names
            0x2038, // address of name ordinals
        ];
        for (i, v) in dir.iter().enumerate() {
            d[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
        d[0x28..0x2C].copy_from_slice(&0x1000u32.to_le_bytes());
        d[0x2C..0x30].copy_from_slice(&0x2060u32.to_le_bytes());
        d[0x30..0x34].copy_from_slice(&0x2070u32.to_le_bytes());
        d[0x34..0x38].copy_from_slice(&0x2080u32.to_le_bytes());
        d[0x38..0x3A].copy_from_slice(&0u16.to_le_bytes());
        d[0x3A..0x3C].copy_from_slice(&1u16.to_le_bytes());
        d[0x50..0x59].copy_from_slice(b"demo.dll\0");
        d[0x60..0x6F].copy_from_slice(b"OTHER.Forward\0\0");
        d[0x70..0x76].copy_from_slice(b"alpha\0");
        d[0x80..0x85].copy_from_slice(b"beta\0");
        d
    }

    #[test]
    fn walks_the_export_table() -> Result<()> {
        let image = ImageBuilder::new()
            .section(".text", 0x1000, vec![0xC3], TEXT_FLAGS)
            .section(".edata", 0x2000, edata_section(), DATA_FLAGS)
            .directory(DIR_EXPORT, 0x2000, 0x100)
            .build();
        let pe = PortableExecutable::from_bytes(&image)?;
        assert_eq!(pe.exports.len(), 2);
        assert_eq!(pe.exports[0].name, "alpha");
        assert_eq!(pe.exports[0].ordinal, 1);
        assert_eq!(pe.exports[0].rva, 0x1000);
        assert!(pe.exports[0].forwarder.is_none());
        assert_eq!(pe.exports[1].name, "beta");
        assert_eq!(pe.exports[1].ordinal, 2);
        assert_eq!(pe.exports[1].forwarder.as_deref(), Some("OTHER.Forward"));
        Ok(())
    }

    #[test]
    fn ordinal_header_struct_sizes_match_the_format() {
        assert_eq!(mem::size_of::<ImportDescriptor>(), 20);
        assert_eq!(mem::size_of::<ExportDirectory>(), 40);
        assert_eq!(mem::size_of::<DataDirectory>(), 8);
    }
}
