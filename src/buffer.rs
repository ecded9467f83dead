use crate::error::{Error, Result};

/// Append-only instruction words bounded by the target's debug buffer size.
#[derive(Debug, Clone)]
pub struct InstructionBuffer {
    words: Vec<u32>,
    capacity: usize,
}

impl InstructionBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            words: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `word`, returning its slot index. A full buffer is left as is.
    pub fn insert(&mut self, word: u32) -> Result<usize> {
        if self.is_full() {
            return Err(Error::BufferFull {
                capacity: self.capacity,
            });
        }
        self.words.push(word);
        Ok(self.words.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.words.len()
    }

    pub fn is_full(&self) -> bool {
        self.words.len() >= self.capacity
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }
}
