//! Just enough byte-addressed ELF support to locate `PT_INTERP` in the
//! program header table. Translated 1:1 from the reference `elf.h` macros:
//! accessors are explicit `(bytes, offset) -> uN` free functions rather than
//! struct overlays, because the mapped binary may have different word size
//! and endianness than the host and its fields are not guaranteed aligned.

use anyhow::{bail, Result};

pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

const ELF_BITS: usize = 0x4;
const ELF_ENDIAN: usize = 0x5;
const ELF_VERSION: usize = 0x6;

const ELF_BITS_32: u8 = 0x1;
const ELF_BITS_64: u8 = 0x2;
const ELF_ENDIAN_LITTLE: u8 = 0x1;
const ELF_ENDIAN_BIG: u8 = 0x2;
pub const ELF_PT_INTERP: u32 = 0x3;

const ELF32_PHT_OFF: usize = 0x1c;
const ELF32_PHTE_SIZE: usize = 0x2a;
const ELF32_PHTE_CNT: usize = 0x2c;
const ELF32_PHE_OFF: usize = 0x4;
const ELF32_PHE_SIZE: usize = 0x10;

const ELF64_PHT_OFF: usize = 0x20;
const ELF64_PHTE_SIZE: usize = 0x36;
const ELF64_PHTE_CNT: usize = 0x38;
const ELF64_PHE_OFF: usize = 0x8;
const ELF64_PHE_SIZE: usize = 0x20;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bits {
    B32,
    B64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

fn shift(val: u64, bytes: u32) -> u64 {
    val << (bytes * 8)
}

/// Read a 32-bit or 64-bit "long" field byte by byte, per `endian`, widening
/// to u64 the way the reference `*_lget` accessors do (used for both the
/// program-header-table offset and, truncated, 32-bit fields).
pub fn lget(bytes: &[u8], off: usize, bits: Bits, endian: Endian) -> u64 {
    match (bits, endian) {
        (Bits::B32, Endian::Little) => {
            shift(bytes[off + 3] as u64, 3)
                + shift(bytes[off + 2] as u64, 2)
                + shift(bytes[off + 1] as u64, 1)
                + shift(bytes[off] as u64, 0)
        }
        (Bits::B32, Endian::Big) => {
            shift(bytes[off] as u64, 3)
                + shift(bytes[off + 1] as u64, 2)
                + shift(bytes[off + 2] as u64, 1)
                + shift(bytes[off + 3] as u64, 0)
        }
        (Bits::B64, Endian::Little) => {
            let mut val = 0u64;
            for i in 0..8 {
                val += shift(bytes[off + i] as u64, i as u32);
            }
            val
        }
        (Bits::B64, Endian::Big) => {
            let mut val = 0u64;
            for i in 0..8 {
                val += shift(bytes[off + i] as u64, (7 - i) as u32);
            }
            val
        }
    }
}

pub fn iget(bytes: &[u8], off: usize, endian: Endian) -> u32 {
    lget(bytes, off, Bits::B32, endian) as u32
}

pub fn sget(bytes: &[u8], off: usize, endian: Endian) -> u16 {
    match endian {
        Endian::Little => {
            (shift(bytes[off + 1] as u64, 1) + shift(bytes[off] as u64, 0)) as u16
        }
        Endian::Big => (shift(bytes[off] as u64, 1) + shift(bytes[off + 1] as u64, 0)) as u16,
    }
}

struct Layout {
    pht_off: usize,
    phte_size: usize,
    phte_cnt: usize,
    phe_off: usize,
    phe_size: usize,
}

fn layout_for(bits: Bits) -> Layout {
    match bits {
        Bits::B32 => Layout {
            pht_off: ELF32_PHT_OFF,
            phte_size: ELF32_PHTE_SIZE,
            phte_cnt: ELF32_PHTE_CNT,
            phe_off: ELF32_PHE_OFF,
            phe_size: ELF32_PHE_SIZE,
        },
        Bits::B64 => Layout {
            pht_off: ELF64_PHT_OFF,
            phte_size: ELF64_PHTE_SIZE,
            phte_cnt: ELF64_PHTE_CNT,
            phe_off: ELF64_PHE_OFF,
            phe_size: ELF64_PHE_SIZE,
        },
    }
}

/// Walk the program header table of `bytes` (a full ELF image) looking for
/// the first `PT_INTERP` entry, returning its interpreter path as a byte
/// slice borrowed from `bytes`. Returns `Ok(None)` if there is no program
/// header table at all (offset 0) -- that is not an error, the binary
/// simply has no dynamic interpreter.
pub fn find_pt_interp(bytes: &[u8]) -> Result<Option<&[u8]>> {
    if bytes.len() < 7 || bytes[0..4] != ELF_MAGIC {
        bail!("not an ELF file");
    }

    let bits = match bytes[ELF_BITS] {
        b if b == ELF_BITS_32 => Bits::B32,
        b if b == ELF_BITS_64 => Bits::B64,
        other => bail!("Unsupported ELF bits: {:#x}", other),
    };
    let endian = match bytes[ELF_ENDIAN] {
        b if b == ELF_ENDIAN_LITTLE => Endian::Little,
        b if b == ELF_ENDIAN_BIG => Endian::Big,
        other => bail!("Unsupported ELF endianness: {:#x}", other),
    };
    if bytes[ELF_VERSION] != 1 {
        bail!("Unsupported ELF version: {:#x}", bytes[ELF_VERSION]);
    }

    let layout = layout_for(bits);

    let pht_off = lget(bytes, layout.pht_off, bits, endian) as usize;
    if pht_off == 0 {
        return Ok(None);
    }
    let phte_size = sget(bytes, layout.phte_size, endian) as usize;
    let phte_cnt = sget(bytes, layout.phte_cnt, endian) as usize;

    for i in 0..phte_cnt {
        let entry = pht_off + i * phte_size;
        let typ = iget(bytes, entry, endian);
        if typ == ELF_PT_INTERP {
            let rel_off = lget(bytes, entry + layout.phe_off, bits, endian) as usize;
            let rel_size = lget(bytes, entry + layout.phe_size, bits, endian) as usize;
            let slice = &bytes[rel_off..rel_off + rel_size];
            // the stored size includes the terminating NUL; trim it if present
            let slice = match slice.iter().position(|&b| b == 0) {
                Some(nul) => &slice[..nul],
                None => slice,
            };
            return Ok(Some(slice));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_elf(bits: Bits, endian: Endian, interp: &[u8]) -> Vec<u8> {
        let is64 = bits == Bits::B64;
        let mut buf = vec![0u8; 64];
        buf[0..4].copy_from_slice(&ELF_MAGIC);
        buf[ELF_BITS] = if is64 { ELF_BITS_64 } else { ELF_BITS_32 };
        buf[ELF_ENDIAN] = if endian == Endian::Little {
            ELF_ENDIAN_LITTLE
        } else {
            ELF_ENDIAN_BIG
        };
        buf[ELF_VERSION] = 1;

        let layout = layout_for(bits);
        let pht_off = buf.len();
        put_lget(&mut buf, layout.pht_off, pht_off as u64, bits, endian);
        put_sget(&mut buf, layout.phte_size, layout.phe_off as u16 + layout.phe_size as u16 + 8, endian);
        put_sget(&mut buf, layout.phte_cnt, 1, endian);

        let phte_size = layout.phe_off + layout.phe_size + 8;
        let mut entry = vec![0u8; phte_size];
        put_iget(&mut entry, 0, ELF_PT_INTERP, endian);
        let interp_off = pht_off + phte_size;
        put_lget(&mut entry, layout.phe_off, interp_off as u64, bits, endian);
        put_lget(
            &mut entry,
            layout.phe_size,
            (interp.len() + 1) as u64,
            bits,
            endian,
        );
        buf.extend_from_slice(&entry);
        buf.extend_from_slice(interp);
        buf.push(0);
        buf
    }

    fn put_lget(buf: &mut [u8], off: usize, val: u64, bits: Bits, endian: Endian) {
        let width = if bits == Bits::B64 { 8 } else { 4 };
        for i in 0..width {
            let shift_amt = match endian {
                Endian::Little => i,
                Endian::Big => width - 1 - i,
            };
            buf[off + i] = ((val >> (shift_amt * 8)) & 0xff) as u8;
        }
    }

    fn put_sget(buf: &mut [u8], off: usize, val: u16, endian: Endian) {
        match endian {
            Endian::Little => {
                buf[off] = (val & 0xff) as u8;
                buf[off + 1] = (val >> 8) as u8;
            }
            Endian::Big => {
                buf[off] = (val >> 8) as u8;
                buf[off + 1] = (val & 0xff) as u8;
            }
        }
    }

    fn put_iget(buf: &mut [u8], off: usize, val: u32, endian: Endian) {
        put_lget(buf, off, val as u64, Bits::B32, endian);
    }

    #[test]
    fn finds_interp_in_elf64_little_endian() {
        let img = build_elf(Bits::B64, Endian::Little, b"/lib64/ld-linux-x86-64.so.2");
        let interp = find_pt_interp(&img).unwrap().unwrap();
        assert_eq!(interp, b"/lib64/ld-linux-x86-64.so.2");
    }

    #[test]
    fn finds_interp_in_elf32_big_endian() {
        let img = build_elf(Bits::B32, Endian::Big, b"/lib/ld.so.1");
        let interp = find_pt_interp(&img).unwrap().unwrap();
        assert_eq!(interp, b"/lib/ld.so.1");
    }

    #[test]
    fn endian_symmetric_parse_yields_same_interpreter() {
        let le = build_elf(Bits::B64, Endian::Little, b"/lib64/ld-linux-x86-64.so.2");
        let be = build_elf(Bits::B64, Endian::Big, b"/lib64/ld-linux-x86-64.so.2");
        assert_eq!(
            find_pt_interp(&le).unwrap().unwrap(),
            find_pt_interp(&be).unwrap().unwrap()
        );
    }

    #[test]
    fn no_program_header_table_is_not_an_error() {
        let mut buf = vec![0u8; 64];
        buf[0..4].copy_from_slice(&ELF_MAGIC);
        buf[ELF_BITS] = ELF_BITS_64;
        buf[ELF_ENDIAN] = ELF_ENDIAN_LITTLE;
        buf[ELF_VERSION] = 1;
        assert!(find_pt_interp(&buf).unwrap().is_none());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let buf = vec![0u8; 16];
        assert!(find_pt_interp(&buf).is_err());
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut buf = vec![0u8; 16];
        buf[0..4].copy_from_slice(&ELF_MAGIC);
        buf[ELF_BITS] = ELF_BITS_64;
        buf[ELF_ENDIAN] = ELF_ENDIAN_LITTLE;
        buf[ELF_VERSION] = 2;
        assert!(find_pt_interp(&buf).is_err());
    }
}
