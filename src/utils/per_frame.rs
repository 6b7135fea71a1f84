/// Fixed ring of per-frame slots. The ring length is the frame delay: the
/// slot being recorded now is reused `len()` frames later.
pub struct PerFrame<T> {
    frames: Vec<T>,
    curr_frame: usize,
    frame_number: u64,
}

impl<T: Default> PerFrame<T> {
    pub fn new(num_frames: usize) -> Self {
        let mut frames = Vec::with_capacity(num_frames.max(1));
        frames.resize_with(num_frames.max(1), Default::default);
        Self {
            frames,
            curr_frame: 0,
            frame_number: 0,
        }
    }
}

impl<T> PerFrame<T> {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn curr(&self) -> &T {
        &self.frames[self.curr_frame]
    }

    pub fn curr_mut(&mut self) -> &mut T {
        &mut self.frames[self.curr_frame]
    }

    pub fn curr_idx(&self) -> usize {
        self.curr_frame
    }

    /// Number of times the ring has advanced.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn advance_next_frame(&mut self) {
        self.curr_frame = (self.curr_frame + 1) % self.frames.len();
        self.frame_number += 1;
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.frames.iter()
    }

    pub fn for_each_mut<F>(&mut self, mut func: F)
    where
        F: FnMut(&mut T),
    {
        for i in &mut self.frames {
            func(i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_wraps_after_len_frames() {
        let mut ring: PerFrame<u32> = PerFrame::new(3);
        *ring.curr_mut() = 5;
        for _ in 0..3 {
            ring.advance_next_frame();
        }
        assert_eq!(ring.curr_idx(), 0);
        assert_eq!(*ring.curr(), 5);
        assert_eq!(ring.frame_number(), 3);
    }

    #[test]
    fn zero_length_ring_is_clamped() {
        let ring: PerFrame<u8> = PerFrame::new(0);
        assert_eq!(ring.len(), 1);
    }
}
