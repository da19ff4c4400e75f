/// Modular sequence-number ring of a fixed size.
///
/// Sequence numbers are only ever compared through [`SeqSpace::distance`];
/// raw `<`/`>` on two sequence numbers is meaningless once the ring wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqSpace {
    size: u32,
}

impl SeqSpace {
    /// `size` must be non-zero; `ArqConfig::validate` guarantees it.
    pub const fn new(size: u32) -> Self {
        Self { size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn next(&self, seq: u32) -> u32 {
        self.add(seq, 1)
    }

    pub fn prev(&self, seq: u32) -> u32 {
        self.add(seq, self.size - 1)
    }

    pub fn add(&self, seq: u32, n: u32) -> u32 {
        ((seq as u64 + n as u64) % self.size as u64) as u32
    }

    /// Steps needed to advance from `from` to `to`, in `0..size`.
    pub fn distance(&self, from: u32, to: u32) -> u32 {
        let from = from % self.size;
        let to = to % self.size;
        (to + self.size - from) % self.size
    }

    /// Whether `seq` lies in `[base, base + width)`.
    pub fn in_window(&self, base: u32, width: u32, seq: u32) -> bool {
        self.distance(base, seq) < width
    }
}

#[cfg(test)]
mod tests {
    use super::SeqSpace;

    #[test]
    fn wraps_forward_and_backward() {
        let space = SeqSpace::new(8);
        assert_eq!(space.next(7), 0);
        assert_eq!(space.prev(0), 7);
        assert_eq!(space.add(6, 5), 3);
    }

    #[test]
    fn distance_is_modular() {
        let space = SeqSpace::new(8);
        assert_eq!(space.distance(6, 1), 3);
        assert_eq!(space.distance(1, 6), 5);
        assert_eq!(space.distance(3, 3), 0);
    }

    #[test]
    fn window_membership_across_wrap() {
        let space = SeqSpace::new(8);
        // window of 6 starting at 5 covers 5, 6, 7, 0, 1, 2
        for seq in [5, 6, 7, 0, 1, 2] {
            assert!(space.in_window(5, 6, seq), "{seq}");
        }
        for seq in [3, 4] {
            assert!(!space.in_window(5, 6, seq), "{seq}");
        }
    }
}
