//! Provides a struct [`NoteStack`] recording which strings are held down, in the order they were pressed. Here "held"
//! means pressed by the performer, regardless of whether the string is actually voiced: the instrument is
//! monophonic, so only the most recently pressed string sounds.

use tinyvec::{ArrayVec, array_vec};

/// An ordered set of string indices, oldest press first.
///
/// The top of the stack (the last entry) is the sounding string; releasing it reveals the next most recent press,
/// not the lowest string.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteStack<const N: usize> {
    data: ArrayVec<[usize; N]>,
}

impl<const N: usize> Default for NoteStack<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "defmt")]
impl<const N: usize> defmt::Format for NoteStack<N> {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "NoteStack {{ data: {} }}", self.data.as_slice());
    }
}

impl<const N: usize> NoteStack<N> {
    /// Construct an empty `NoteStack`.
    pub fn new() -> Self {
        Self { data: array_vec!() }
    }

    /// Push a string onto the stack. Equivalent to pressing its button.
    ///
    /// A string already on the stack, or one beyond the instrument's `N` strings, is ignored.
    pub fn push(&mut self, string: usize) {
        if string < N && !self.data.contains(&string) {
            self.data.push(string);
        }
    }

    /// Remove a string from anywhere in the stack, preserving the order of the others. Equivalent to releasing its
    /// button.
    pub fn remove(&mut self, string: usize) {
        self.data.retain(|&s| s != string);
    }

    /// The most recently pressed string still on the stack.
    pub fn top(&self) -> Option<usize> {
        self.data.last().copied()
    }

    /// Determine if the string is on the stack.
    pub fn contains(&self, string: usize) -> bool {
        self.data.contains(&string)
    }

    /// Determine if any strings are held.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of held strings.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns an [`Iterator`] over the held strings, oldest press first.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.data.iter().copied()
    }
}
