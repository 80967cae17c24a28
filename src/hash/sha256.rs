use sha2::{
    Digest, Sha256, compress256,
    digest::{consts::U64, generic_array::GenericArray},
};

/// SHA-256 block size in bytes.
pub const BLOCK_SIZE: usize = 64;

/// SHA-256 initial hash value (FIPS 180-4, 5.3.3).
pub const IV: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab,
    0x5be0cd19,
];

pub fn hash(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Largest multiple of the block size that is `<= offset`.
pub fn floor_block(offset: usize) -> usize {
    offset - offset % BLOCK_SIZE
}

/// Smallest multiple of the block size that is `>= offset`.
pub fn ceil_block(offset: usize) -> usize {
    offset.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Runs the compression function over whole blocks. Trailing partial blocks are ignored.
pub fn compress_blocks(state: &mut [u32; 8], data: &[u8]) {
    let blocks: Vec<GenericArray<u8, U64>> = data
        .chunks_exact(BLOCK_SIZE)
        .map(GenericArray::clone_from_slice)
        .collect();
    compress256(state, &blocks);
}

pub fn state_to_bytes(state: &[u32; 8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (chunk, word) in out.chunks_exact_mut(4).zip(state.iter()) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }
    out
}

/// Completes a hash whose first `absorbed` bytes are already folded into `state`.
pub fn finish(mut state: [u32; 8], absorbed: usize, rest: &[u8]) -> [u8; 32] {
    let bit_len = ((absorbed + rest.len()) as u64) * 8;
    let mut tail = rest.to_vec();
    tail.push(0x80);
    while tail.len() % BLOCK_SIZE != BLOCK_SIZE - 8 {
        tail.push(0);
    }
    tail.extend_from_slice(&bit_len.to_be_bytes());
    compress_blocks(&mut state, &tail);
    state_to_bytes(&state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_answer() {
        assert_eq!(
            hex::encode(hash(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_finish_from_iv_matches_digest() {
        assert_eq!(finish(IV, 0, b"abc"), hash(b"abc"));
        assert_eq!(finish(IV, 0, b""), hash(b""));
    }

    #[test]
    fn test_resume_after_prefix() {
        let data: Vec<u8> = (0 .. 300u32).map(|i| (i * 7 % 251) as u8).collect();
        for cut in [0, 64, 128, 256] {
            let mut state = IV;
            compress_blocks(&mut state, &data[.. cut]);
            assert_eq!(finish(state, cut, &data[cut ..]), hash(&data), "cut at {}", cut);
        }
    }

    #[test]
    fn test_block_rounding() {
        assert_eq!(floor_block(0), 0);
        assert_eq!(floor_block(63), 0);
        assert_eq!(floor_block(64), 64);
        assert_eq!(ceil_block(64), 64);
        assert_eq!(ceil_block(65), 128);
        assert_eq!(ceil_block(0), 0);
    }
}
