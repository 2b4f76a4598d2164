/// Position of a page inside its book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct PageIdx(pub u32);

impl PageIdx {
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

/// Index of an element inside its page's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct ElementIdx(pub u32);

impl ElementIdx {
    pub fn get(self) -> usize {
        self.0 as usize
    }
}
