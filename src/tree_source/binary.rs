//! Default tree-file wire format: a flat binary layout of fixed-size halo
//! records, preceded by either an explicit 8-byte header (new format) or
//! nothing at all (legacy host-endian format).
//!
//! ## Layout
//!
//! Explicit header, when present, is detected by its leading magic number
//! and is always little-endian on disk regardless of the payload's
//! endianness:
//!
//! ```text
//! magic:    u32  = 0x5341_4745 ("SAGE" in ASCII, byte-reversed)
//! version:  u16
//! endian:   u8    0 = little, 1 = big
//! reserved: u8
//! ```
//!
//! Legacy files carry no header: the first four bytes are `Ntrees` itself,
//! in host endianness. We tell the two apart by checking whether the first
//! four bytes equal the magic; if not, we fall back to reading `Ntrees`
//! directly and validating the result against [`crate::defaults::MAX_NTREES`].
//!
//! After the header (if any) comes `Ntrees` as `i32`, `totNHalos` as `i32`,
//! then `Ntrees` entries of `TreeNHalos: i32`, then the flat halo array.
//! Each halo record is exactly 104 bytes.

use std::convert::TryInto;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::defaults::{MAX_NTREES, MAX_TOT_NHALOS};
use crate::error::{Error, Result};
use crate::halo::Halo;

use super::{TreeSource, TreeTable};

const MAGIC: u32 = 0x5341_4745;
const HEADER_LEN: usize = 8;
const HALO_RECORD_LEN: usize = 104;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn read_i32(self, buf: &[u8]) -> i32 {
        match self {
            Endian::Little => LittleEndian::read_i32(buf),
            Endian::Big => BigEndian::read_i32(buf),
        }
    }
    fn read_i64(self, buf: &[u8]) -> i64 {
        match self {
            Endian::Little => LittleEndian::read_i64(buf),
            Endian::Big => BigEndian::read_i64(buf),
        }
    }
    fn read_f32(self, buf: &[u8]) -> f32 {
        match self {
            Endian::Little => LittleEndian::read_f32(buf),
            Endian::Big => BigEndian::read_f32(buf),
        }
    }

    fn opposite(self) -> Self {
        match self {
            Endian::Little => Endian::Big,
            Endian::Big => Endian::Little,
        }
    }

    #[cfg(target_endian = "little")]
    fn host() -> Self {
        Endian::Little
    }
    #[cfg(target_endian = "big")]
    fn host() -> Self {
        Endian::Big
    }

    fn label(self) -> &'static str {
        match self {
            Endian::Little => "little",
            Endian::Big => "big",
        }
    }
}

/// Reads a single binary tree file, auto-detecting the header and the
/// payload's byte order.
pub struct BinaryTreeSource {
    path: PathBuf,
    bytes: Option<Vec<u8>>,
    endian: Endian,
    /// Byte offset, within `bytes`, of the first `TreeNHalos` entry.
    tree_sizes_offset: usize,
    halos_per_tree: Vec<i32>,
    /// Byte offset, within `bytes`, of the flat halo array.
    halo_array_offset: usize,
}

impl BinaryTreeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            bytes: None,
            endian: Endian::host(),
            tree_sizes_offset: 0,
            halos_per_tree: Vec::new(),
            halo_array_offset: 0,
        }
    }

    fn path_string(&self) -> String {
        self.path.display().to_string()
    }

    /// Byte order detected for the payload by the most recent `open()` call.
    /// Only meaningful after `open()` has succeeded; reports the host order
    /// (the default new sources start from) otherwise.
    pub fn detected_endian(&self) -> &'static str {
        self.endian.label()
    }

    fn bytes(&self) -> Result<&[u8]> {
        self.bytes
            .as_deref()
            .ok_or_else(|| Error::io(self.path_string(), "tree source not open".to_string()))
    }

    /// Try to read `Ntrees`/`totNHalos` at `offset` under `endian`; accept
    /// only if both values pass the sanity bounds from `defaults`.
    fn try_read_counts(buf: &[u8], offset: usize, endian: Endian) -> Option<(i32, i64)> {
        if buf.len() < offset + 12 {
            return None;
        }
        let ntrees = endian.read_i32(&buf[offset..offset + 4]);
        let tot_n_halos = endian.read_i64(&buf[offset + 4..offset + 12]);
        if ntrees > 0 && ntrees <= MAX_NTREES && tot_n_halos > 0 && tot_n_halos <= MAX_TOT_NHALOS {
            Some((ntrees, tot_n_halos))
        } else {
            None
        }
    }
}

impl TreeSource for BinaryTreeSource {
    fn open(&mut self) -> Result<TreeTable> {
        let mut file = File::open(&self.path)
            .map_err(|e| Error::io(self.path_string(), e.to_string()))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .map_err(|e| Error::io(self.path_string(), e.to_string()))?;

        if buf.len() < 4 {
            return Err(Error::format(
                self.path_string(),
                None,
                "file too short to contain a tree table".to_string(),
            ));
        }

        let has_header = buf.len() >= HEADER_LEN
            && LittleEndian::read_u32(&buf[0..4]) == MAGIC;

        let (counts_offset, declared_endian) = if has_header {
            let endian_byte = buf[6];
            let declared = if endian_byte == 0 {
                Endian::Little
            } else {
                Endian::Big
            };
            (HEADER_LEN, Some(declared))
        } else {
            (0, None)
        };

        let endian = match declared_endian {
            Some(e) => {
                if Self::try_read_counts(&buf, counts_offset, e).is_none() {
                    return Err(Error::format(
                        self.path_string(),
                        None,
                        "header declares an endianness but Ntrees/totNHalos fail sanity bounds"
                            .to_string(),
                    ));
                }
                e
            }
            None => {
                let host = Endian::host();
                if Self::try_read_counts(&buf, counts_offset, host).is_some() {
                    host
                } else if Self::try_read_counts(&buf, counts_offset, host.opposite()).is_some() {
                    host.opposite()
                } else {
                    return Err(Error::format(
                        self.path_string(),
                        None,
                        "Ntrees/totNHalos are not sane under either byte order".to_string(),
                    ));
                }
            }
        };

        let (ntrees, tot_n_halos) = Self::try_read_counts(&buf, counts_offset, endian)
            .expect("endian already validated above");
        let ntrees = ntrees as usize;
        let tot_n_halos = tot_n_halos as usize;

        let tree_sizes_offset = counts_offset + 12;
        let tree_sizes_len = ntrees * 4;
        if buf.len() < tree_sizes_offset + tree_sizes_len {
            return Err(Error::format(
                self.path_string(),
                None,
                "file truncated before the end of the per-tree halo-count table".to_string(),
            ));
        }

        let mut halos_per_tree = Vec::with_capacity(ntrees);
        for i in 0..ntrees {
            let off = tree_sizes_offset + i * 4;
            halos_per_tree.push(endian.read_i32(&buf[off..off + 4]));
        }
        let declared_total: i64 = halos_per_tree.iter().map(|&n| n as i64).sum();
        if declared_total != tot_n_halos as i64 {
            return Err(Error::format(
                self.path_string(),
                None,
                format!(
                    "sum of per-tree halo counts ({declared_total}) does not match totNHalos ({tot_n_halos})"
                ),
            ));
        }

        let halo_array_offset = tree_sizes_offset + tree_sizes_len;
        let expected_len = halo_array_offset + tot_n_halos * HALO_RECORD_LEN;
        if buf.len() < expected_len {
            return Err(Error::format(
                self.path_string(),
                None,
                "file truncated before the end of the halo array".to_string(),
            ));
        }

        self.endian = endian;
        self.tree_sizes_offset = tree_sizes_offset;
        self.halos_per_tree = halos_per_tree.clone();
        self.halo_array_offset = halo_array_offset;
        self.bytes = Some(buf);

        Ok(TreeTable {
            ntrees,
            tot_n_halos,
            halos_per_tree,
        })
    }

    fn load_tree(&mut self, tree_index: usize) -> Result<Vec<Halo>> {
        let endian = self.endian;
        let halo_array_offset = self.halo_array_offset;
        let halos_per_tree = self.halos_per_tree.clone();
        let path = self.path_string();
        let buf = self.bytes()?;

        if tree_index >= halos_per_tree.len() {
            return Err(Error::format(
                path,
                Some(tree_index),
                "tree index out of range".to_string(),
            ));
        }
        let first: i64 = halos_per_tree[..tree_index].iter().map(|&n| n as i64).sum();
        let count = halos_per_tree[tree_index] as usize;
        let start = halo_array_offset + first as usize * HALO_RECORD_LEN;

        let mut halos = Vec::with_capacity(count);
        for i in 0..count {
            let off = start + i * HALO_RECORD_LEN;
            halos.push(read_halo_record(&buf[off..off + HALO_RECORD_LEN], endian));
        }
        Ok(halos)
    }

    fn close(&mut self) -> Result<()> {
        self.bytes = None;
        Ok(())
    }
}

fn read_halo_record(rec: &[u8], e: Endian) -> Halo {
    debug_assert_eq!(rec.len(), HALO_RECORD_LEN);
    let i32_at = |o: usize| e.read_i32(&rec[o..o + 4]);
    let f32_at = |o: usize| e.read_f32(&rec[o..o + 4]);

    let descendant = i32_at(0);
    let first_progenitor = i32_at(4);
    let next_progenitor = i32_at(8);
    let first_halo_in_fof_group = i32_at(12);
    let next_halo_in_fof_group = i32_at(16);
    let len = i32_at(20);
    let mvir = f32_at(24);
    let m_mean200 = f32_at(28);
    let m_top_hat = f32_at(32);
    let pos = [f32_at(36), f32_at(40), f32_at(44)];
    let vel = [f32_at(48), f32_at(52), f32_at(56)];
    let vel_disp = f32_at(60);
    let vmax = f32_at(64);
    let spin = [f32_at(68), f32_at(72), f32_at(76)];
    let most_bound_id = e.read_i64(&rec[80..88]);
    let snap_num = i32_at(88);
    let file_nr = i32_at(92);
    let subhalo_index = i32_at(96);
    let sub_half_mass = f32_at(100);

    Halo {
        descendant,
        first_progenitor,
        next_progenitor,
        first_halo_in_fof_group,
        next_halo_in_fof_group,
        len,
        mvir,
        m_mean200,
        m_top_hat,
        vel_disp,
        vmax,
        most_bound_id,
        snap_num,
        file_nr,
        subhalo_index,
        sub_half_mass,
        pos,
        vel,
        spin,
    }
}

fn write_halo_record(h: &Halo, endian: Endian, out: &mut Vec<u8>) {
    let mut put_i32 = |v: i32, out: &mut Vec<u8>| {
        let mut b = [0u8; 4];
        match endian {
            Endian::Little => LittleEndian::write_i32(&mut b, v),
            Endian::Big => BigEndian::write_i32(&mut b, v),
        }
        out.extend_from_slice(&b);
    };
    put_i32(h.descendant, out);
    put_i32(h.first_progenitor, out);
    put_i32(h.next_progenitor, out);
    put_i32(h.first_halo_in_fof_group, out);
    put_i32(h.next_halo_in_fof_group, out);
    put_i32(h.len, out);

    let mut put_f32 = |v: f32, out: &mut Vec<u8>| {
        let mut b = [0u8; 4];
        match endian {
            Endian::Little => LittleEndian::write_f32(&mut b, v),
            Endian::Big => BigEndian::write_f32(&mut b, v),
        }
        out.extend_from_slice(&b);
    };
    put_f32(h.mvir, out);
    put_f32(h.m_mean200, out);
    put_f32(h.m_top_hat, out);
    for v in h.pos {
        put_f32(v, out);
    }
    for v in h.vel {
        put_f32(v, out);
    }
    put_f32(h.vel_disp, out);
    put_f32(h.vmax, out);
    for v in h.spin {
        put_f32(v, out);
    }

    let mut b8 = [0u8; 8];
    match endian {
        Endian::Little => LittleEndian::write_i64(&mut b8, h.most_bound_id),
        Endian::Big => BigEndian::write_i64(&mut b8, h.most_bound_id),
    }
    out.extend_from_slice(&b8);

    put_i32(h.snap_num, out);
    put_i32(h.file_nr, out);
    put_i32(h.subhalo_index, out);
    put_f32(h.sub_half_mass, out);
}

/// Serialize a legacy (header-less), host-endian binary tree file. Used by
/// tests and by the `validate` CLI command's round-trip self-check.
pub fn write_legacy_file(path: &Path, halos_per_tree: &[i32], trees: &[Vec<Halo>]) -> Result<()> {
    let endian = Endian::host();
    let mut out = Vec::new();
    let mut put_i32 = |v: i32, out: &mut Vec<u8>| {
        let mut b = [0u8; 4];
        match endian {
            Endian::Little => LittleEndian::write_i32(&mut b, v),
            Endian::Big => BigEndian::write_i32(&mut b, v),
        }
        out.extend_from_slice(&b);
    };
    put_i32(halos_per_tree.len().try_into().unwrap(), &mut out);
    let tot: i64 = halos_per_tree.iter().map(|&n| n as i64).sum();
    let mut b8 = [0u8; 8];
    match endian {
        Endian::Little => LittleEndian::write_i64(&mut b8, tot),
        Endian::Big => BigEndian::write_i64(&mut b8, tot),
    }
    out.extend_from_slice(&b8);
    for &n in halos_per_tree {
        put_i32(n, &mut out);
    }
    for tree in trees {
        for halo in tree {
            write_halo_record(halo, endian, &mut out);
        }
    }
    std::fs::write(path, out).map_err(|e| Error::io(path.display().to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_halo(descendant: i32, fof_root: i32) -> Halo {
        Halo {
            descendant,
            first_halo_in_fof_group: fof_root,
            mvir: 1.5,
            pos: [1.0, 2.0, 3.0],
            most_bound_id: 42,
            ..Halo::default()
        }
    }

    #[test]
    fn round_trips_a_legacy_host_endian_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("galsam_binary_test_{:p}.bin", &dir));
        let trees = vec![vec![sample_halo(crate::halo::NONE, 0), sample_halo(0, 1)]];
        let halos_per_tree = vec![2];

        write_legacy_file(&path, &halos_per_tree, &trees).unwrap();

        let mut source = BinaryTreeSource::new(&path);
        let table = source.open().unwrap();
        assert_eq!(table.ntrees, 1);
        assert_eq!(table.tot_n_halos, 2);
        assert_eq!(table.halos_per_tree, vec![2]);

        let loaded = source.load_tree(0).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].descendant, crate::halo::NONE);
        assert_eq!(loaded[1].first_halo_in_fof_group, 1);
        assert!((loaded[0].mvir - 1.5).abs() < 1e-6);
        assert_eq!(loaded[0].most_bound_id, 42);

        source.close().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn rejects_truncated_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("galsam_binary_trunc_{:p}.bin", &dir));
        std::fs::write(&path, [0u8; 4]).unwrap();
        let mut source = BinaryTreeSource::new(&path);
        assert!(source.open().is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn rejects_mismatched_total_halo_count() {
        let endian = Endian::host();
        let mut buf = Vec::new();
        let mut put_i32 = |v: i32, out: &mut Vec<u8>| {
            let mut b = [0u8; 4];
            match endian {
                Endian::Little => LittleEndian::write_i32(&mut b, v),
                Endian::Big => BigEndian::write_i32(&mut b, v),
            }
            out.extend_from_slice(&b);
        };
        put_i32(1, &mut buf);
        let mut b8 = [0u8; 8];
        match endian {
            Endian::Little => LittleEndian::write_i64(&mut b8, 5),
            Endian::Big => BigEndian::write_i64(&mut b8, 5),
        }
        buf.extend_from_slice(&b8);
        put_i32(1, &mut buf);

        let dir = std::env::temp_dir();
        let path = dir.join(format!("galsam_binary_mismatch_{:p}.bin", &dir));
        std::fs::write(&path, buf).unwrap();
        let mut source = BinaryTreeSource::new(&path);
        assert!(source.open().is_err());
        let _ = std::fs::remove_file(&path);
    }
}
