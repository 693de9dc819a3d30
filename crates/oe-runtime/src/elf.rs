//! ELF loader for recompiled guest images
//!
//! Accepts 32-bit little-endian MIPS executables, copies their loadable
//! segments into guest memory, and registers executable segments for
//! self-modifying-code tracking.

use std::io::{Read, Seek, SeekFrom};

use bitflags::bitflags;
use oe_core::error::LoaderError;
use oe_memory::Memory;
use tracing::{debug, info};

/// ELF file header (32-bit)
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct Elf32Header {
    pub e_ident: [u8; 16],
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u32,
    pub e_phoff: u32,
    pub e_shoff: u32,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

/// ELF program header (32-bit)
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct Elf32Phdr {
    pub p_type: u32,
    pub p_offset: u32,
    pub p_vaddr: u32,
    pub p_paddr: u32,
    pub p_filesz: u32,
    pub p_memsz: u32,
    pub p_flags: u32,
    pub p_align: u32,
}

/// ELF magic bytes
pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

/// Executable file type
pub const ET_EXEC: u16 = 2;
/// MIPS architecture
pub const EM_MIPS: u16 = 8;

/// Program header types
pub mod pt {
    pub const NULL: u32 = 0;
    pub const LOAD: u32 = 1;
    pub const DYNAMIC: u32 = 2;
    pub const INTERP: u32 = 3;
    pub const NOTE: u32 = 4;
}

bitflags! {
    /// Program header flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentFlags: u32 {
        const EXECUTE = 0b001;
        const WRITE   = 0b010;
        const READ    = 0b100;
    }
}

/// ELF loader
pub struct ElfLoader;

impl ElfLoader {
    /// Parse and validate the ELF header
    pub fn parse_header<R: Read + Seek>(reader: &mut R) -> Result<Elf32Header, LoaderError> {
        reader.seek(SeekFrom::Start(0))?;

        let mut header = Elf32Header::default();

        reader.read_exact(&mut header.e_ident)?;

        if header.e_ident[0..4] != ELF_MAGIC {
            return Err(LoaderError::InvalidElf("invalid ELF magic".to_string()));
        }
        if header.e_ident[4] != 1 {
            return Err(LoaderError::Unsupported("not a 32-bit ELF".to_string()));
        }
        if header.e_ident[5] != 1 {
            return Err(LoaderError::Unsupported(
                "not a little-endian ELF".to_string(),
            ));
        }

        let mut buf = [0u8; 36];
        reader.read_exact(&mut buf)?;

        header.e_type = u16::from_le_bytes([buf[0], buf[1]]);
        header.e_machine = u16::from_le_bytes([buf[2], buf[3]]);
        header.e_version = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        header.e_entry = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
        header.e_phoff = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);
        header.e_shoff = u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]);
        header.e_flags = u32::from_le_bytes([buf[20], buf[21], buf[22], buf[23]]);
        header.e_ehsize = u16::from_le_bytes([buf[24], buf[25]]);
        header.e_phentsize = u16::from_le_bytes([buf[26], buf[27]]);
        header.e_phnum = u16::from_le_bytes([buf[28], buf[29]]);
        header.e_shentsize = u16::from_le_bytes([buf[30], buf[31]]);
        header.e_shnum = u16::from_le_bytes([buf[32], buf[33]]);
        header.e_shstrndx = u16::from_le_bytes([buf[34], buf[35]]);

        if header.e_machine != EM_MIPS {
            return Err(LoaderError::Unsupported(format!(
                "machine {} is not MIPS",
                header.e_machine
            )));
        }
        if header.e_type != ET_EXEC {
            return Err(LoaderError::Unsupported(format!(
                "type {} is not an executable",
                header.e_type
            )));
        }

        Ok(header)
    }

    /// Parse the program header table
    pub fn parse_phdrs<R: Read + Seek>(
        reader: &mut R,
        header: &Elf32Header,
    ) -> Result<Vec<Elf32Phdr>, LoaderError> {
        let mut phdrs = Vec::with_capacity(header.e_phnum as usize);

        for i in 0..header.e_phnum {
            let offset = u64::from(header.e_phoff) + u64::from(i) * u64::from(header.e_phentsize);
            reader.seek(SeekFrom::Start(offset))?;

            let mut buf = [0u8; 32];
            reader.read_exact(&mut buf)?;

            phdrs.push(Elf32Phdr {
                p_type: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
                p_offset: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
                p_vaddr: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
                p_paddr: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
                p_filesz: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
                p_memsz: u32::from_le_bytes([buf[20], buf[21], buf[22], buf[23]]),
                p_flags: u32::from_le_bytes([buf[24], buf[25], buf[26], buf[27]]),
                p_align: u32::from_le_bytes([buf[28], buf[29], buf[30], buf[31]]),
            });
        }

        Ok(phdrs)
    }

    /// Load an executable into guest memory; returns the entry point
    pub fn load<R: Read + Seek>(reader: &mut R, mem: &Memory) -> Result<u32, LoaderError> {
        let header = Self::parse_header(reader)?;
        let phdrs = Self::parse_phdrs(reader, &header)?;

        for phdr in &phdrs {
            if phdr.p_type != pt::LOAD || phdr.p_filesz == 0 {
                continue;
            }

            debug!(
                "loading segment {:#010x} - {:#010x} (file size {:#x})",
                phdr.p_vaddr,
                phdr.p_vaddr.wrapping_add(phdr.p_memsz),
                phdr.p_filesz,
            );

            let mut data = vec![0u8; phdr.p_filesz as usize];
            reader.seek(SeekFrom::Start(u64::from(phdr.p_offset)))?;
            reader.read_exact(&mut data)?;

            mem.load_segment(phdr.p_vaddr, &data, phdr.p_memsz as usize);

            let flags = SegmentFlags::from_bits_truncate(phdr.p_flags);
            if flags.contains(SegmentFlags::EXECUTE) {
                mem.register_code_region(phdr.p_vaddr, phdr.p_vaddr.wrapping_add(phdr.p_memsz));
            }
        }

        info!("ELF loaded, entry point {:#010x}", header.e_entry);
        Ok(header.e_entry)
    }
}
