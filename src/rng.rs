/// SplitMix64 generator whose whole state is one `u64`, so it can be checkpointed.
#[derive(Debug, Clone)]
pub(crate) struct DeterministicRng {
    state: u64,
}

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;
const MIX_A: u64 = 0xBF58_476D_1CE4_E5B9;
const MIX_B: u64 = 0x94D0_49BB_1331_11EB;

impl DeterministicRng {
    pub(crate) fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Resume from a value previously returned by `state`.
    pub(crate) fn from_state(state: u64) -> Self {
        Self { state }
    }

    pub(crate) fn state(&self) -> u64 {
        self.state
    }

    fn advance(&mut self) -> u64 {
        self.state = self.state.wrapping_add(GOLDEN_GAMMA);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(MIX_A);
        z = (z ^ (z >> 27)).wrapping_mul(MIX_B);
        z ^ (z >> 31)
    }
}

impl rand::RngCore for DeterministicRng {
    fn next_u32(&mut self) -> u32 {
        (self.advance() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.advance()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.advance().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[test]
    fn resumed_state_continues_the_same_stream() {
        let mut original = DeterministicRng::new(123);
        original.next_u64();
        let mut resumed = DeterministicRng::from_state(original.state());
        let expected: Vec<u64> = (0..4).map(|_| original.next_u64()).collect();
        let actual: Vec<u64> = (0..4).map(|_| resumed.next_u64()).collect();
        assert_eq!(expected, actual);
    }

    #[test]
    fn fill_bytes_handles_partial_chunks() {
        let mut left = [0u8; 13];
        let mut right = [0u8; 13];
        DeterministicRng::new(999).fill_bytes(&mut left);
        DeterministicRng::new(999).fill_bytes(&mut right);
        assert_eq!(left, right);
        assert!(left.iter().any(|byte| *byte != 0));
        assert_ne!(DeterministicRng::new(1).next_u64(), DeterministicRng::new(2).next_u64());
    }
}
