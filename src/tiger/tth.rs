//! Streaming Tiger Tree Hash computation.
//!
//! Files are split into 1024-byte blocks; every block is hashed with a
//! 0x00 prefix to form the leaves, and adjacent pairs are combined with a
//! 0x01 prefix until a single root remains. An odd trailing hash is
//! promoted unchanged to the next level. Only one tree level is kept in
//! memory at a time, so arbitrarily large inputs can be hashed from a
//! plain [`Read`] stream.

use std::io::{self, Read};

use super::Hash;

/// TTH input block size in bytes.
pub const TTH_BLOCK_SIZE: usize = 1024;

/// Leaves are a sequence of hashes that can be used to validate single
/// parts of a file.
pub type Leaves = Vec<Hash>;

/// Reads a block of up to `buf.len()` bytes, stopping early only at EOF.
fn read_block<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        match r.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(m) => n += m,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(n)
}

/// Computes the TTH leaves of a reader.
///
/// Empty input produces exactly one leaf: the hash of the single 0x00
/// prefix byte.
pub fn tth_leaves<R: Read>(mut r: R) -> io::Result<Leaves> {
    let mut leaves = Leaves::new();
    let mut buf = [0u8; TTH_BLOCK_SIZE + 1];
    loop {
        let n = read_block(&mut r, &mut buf[1..])?;
        if n == 0 && !leaves.is_empty() {
            break;
        }
        leaves.push(Hash::digest(&buf[..n + 1]));
        if n < TTH_BLOCK_SIZE {
            break;
        }
    }
    Ok(leaves)
}

/// Derives the tree root from a leaf level.
///
/// A single leaf is the root itself. An empty slice yields the
/// empty-input root (the hash of the 0x00 prefix byte).
pub fn tth_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::digest([0u8]);
    }
    let mut lvl = leaves.to_vec();
    let mut buf = [0u8; 2 * Hash::SIZE + 1];
    buf[0] = 0x01;
    while lvl.len() > 1 {
        let mut out = 0;
        let mut i = 0;
        while i < lvl.len() {
            if i + 1 == lvl.len() {
                // odd trailing leaf is promoted unchanged
                lvl[out] = lvl[i];
            } else {
                buf[1..1 + Hash::SIZE].copy_from_slice(&lvl[i].0);
                buf[1 + Hash::SIZE..].copy_from_slice(&lvl[i + 1].0);
                lvl[out] = Hash::digest(buf);
            }
            out += 1;
            i += 2;
        }
        lvl.truncate(out);
    }
    lvl[0]
}

/// Calculates the Tiger Tree Hash of a reader.
pub fn tth<R: Read>(r: R) -> io::Result<Hash> {
    Ok(tth_root(&tth_leaves(r)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_single_leaf() {
        let leaves = tth_leaves(&b""[..]).unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0], Hash::digest([0u8]));
        assert_eq!(tth_root(&leaves), leaves[0]);
    }

    #[test]
    fn test_leaf_counts() {
        for (size, leaves) in [(1, 1), (1024, 1), (1025, 2), (2048, 2), (2049, 3)] {
            let data = vec![b'a'; size];
            let got = tth_leaves(&data[..]).unwrap();
            assert_eq!(got.len(), leaves, "size {}", size);
        }
    }

    #[test]
    fn test_root_equals_tth() {
        let data = vec![b'x'; 5000];
        let leaves = tth_leaves(&data[..]).unwrap();
        assert_eq!(tth_root(&leaves), tth(&data[..]).unwrap());
    }

    #[test]
    fn test_odd_leaf_promotion() {
        // three leaves: root = H(0x01 || H(0x01 || l0 || l1) || l2)
        let data = vec![b'y'; 2049];
        let leaves = tth_leaves(&data[..]).unwrap();
        assert_eq!(leaves.len(), 3);
        let mut buf = Vec::with_capacity(2 * Hash::SIZE + 1);
        buf.push(0x01);
        buf.extend_from_slice(&leaves[0].0);
        buf.extend_from_slice(&leaves[1].0);
        let left = Hash::digest(&buf);
        buf.clear();
        buf.push(0x01);
        buf.extend_from_slice(&left.0);
        buf.extend_from_slice(&leaves[2].0);
        assert_eq!(tth_root(&leaves), Hash::digest(&buf));
    }
}
