//! The typed stack: one byte buffer plus a log of typed elements.
//!
//! Every pushed value becomes one [`Element`] occupying a contiguous byte
//! range and a contiguous range of leaf indices. Composite values are never
//! split into separate elements; their fields are addressed as views
//! computed by [`Type::resolve`].
//!
//! Scope levels group elements for bulk release. The root level is always
//! open and cannot be popped.

use bpl_common::Type;

use crate::error::StackError;

/// A value on the stack, or a view of part of one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Descriptor of the value.
    pub ty: Type,
    /// Byte offset of the value in the buffer.
    pub offset: usize,
    /// Leaf index of the value.
    pub leaf: usize,
}

impl Element {
    /// Byte offset one past the end of the value.
    pub fn end(&self) -> usize {
        self.offset + self.ty.size()
    }

    /// Leaf index one past the last leaf of the value.
    pub fn end_leaf(&self) -> usize {
        self.leaf + self.ty.leaf_count()
    }
}

/// Byte buffer with typed element bookkeeping and scope levels.
#[derive(Debug, Clone)]
pub struct Stack {
    /// Backing storage; its length is the capacity.
    data: Vec<u8>,
    /// Bytes in use.
    top: usize,
    elements: Vec<Element>,
    next_leaf: usize,
    /// Element count per open level, innermost last. Never empty.
    levels: Vec<usize>,
    allow_growth: bool,
    /// Bumped on every reallocation.
    generation: u64,
}

impl Stack {
    /// Creates a stack holding `capacity` bytes.
    pub fn new(capacity: usize, allow_growth: bool) -> Self {
        Self {
            data: vec![0; capacity],
            top: 0,
            elements: Vec::new(),
            next_leaf: 0,
            levels: vec![0],
            allow_growth,
            generation: 0,
        }
    }

    /// Number of whole elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if no element is on the stack.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Bytes in use.
    pub fn size(&self) -> usize {
        self.top
    }

    /// Bytes available before the buffer must grow.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The leaf index the next pushed element will receive.
    pub fn next_leaf(&self) -> usize {
        self.next_leaf
    }

    /// Number of reallocations so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Pushes a zero-filled element of type `ty` and returns its offset.
    ///
    /// When the buffer is full it is reallocated to twice the needed size
    /// (or exactly the needed size if twice cannot be had) when growth is
    /// allowed; otherwise the push fails and the stack is left unchanged.
    pub fn push(&mut self, ty: &Type) -> Result<usize, StackError> {
        let needed = self
            .top
            .checked_add(ty.size())
            .ok_or(StackError::GrowthFailed { requested: usize::MAX })?;
        let next_leaf = self
            .next_leaf
            .checked_add(ty.leaf_count())
            .ok_or(StackError::LeafSpaceExhausted)?;
        if needed > self.capacity() {
            if !self.allow_growth {
                return Err(StackError::GrowthNotAllowed {
                    requested: needed,
                    capacity: self.capacity(),
                });
            }
            let doubled = needed.checked_mul(2).unwrap_or(needed);
            if self.resize(doubled).is_err() {
                self.resize(needed)?;
            }
        }

        let offset = self.top;
        self.data[offset..needed].fill(0);
        self.elements.push(Element {
            ty: ty.clone(),
            offset,
            leaf: self.next_leaf,
        });
        self.top = needed;
        self.next_leaf = next_leaf;
        if let Some(level) = self.levels.last_mut() {
            *level += 1;
        }
        Ok(offset)
    }

    /// Pushes an element of type `ty` holding `bytes`.
    pub fn push_bytes(&mut self, ty: &Type, bytes: &[u8]) -> Result<usize, StackError> {
        if bytes.len() != ty.size() {
            return Err(StackError::SizeMismatch {
                expected: ty.size(),
                found: bytes.len(),
            });
        }
        let offset = self.push(ty)?;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(offset)
    }

    /// Pushes a copy of `source`, which must lie inside the used region.
    pub fn push_copy(&mut self, source: &Element) -> Result<usize, StackError> {
        if source.end() > self.top {
            return Err(StackError::Corrupted {
                reason: format!(
                    "copy source {}..{} beyond top {}",
                    source.offset,
                    source.end(),
                    self.top
                ),
            });
        }
        let offset = self.push(&source.ty)?;
        self.data
            .copy_within(source.offset..source.end(), offset);
        Ok(offset)
    }

    /// Removes the most recently pushed element.
    pub fn pop(&mut self) -> Result<Element, StackError> {
        let element = self.elements.pop().ok_or(StackError::Empty)?;
        self.top = element.offset;
        self.next_leaf = element.leaf;
        // The newest element always belongs to the innermost non-empty level.
        if let Some(level) = self.levels.iter_mut().rev().find(|count| **count > 0) {
            *level -= 1;
        }
        Ok(element)
    }

    /// Removes the `count` most recently pushed elements.
    pub fn pop_n(&mut self, count: usize) -> Result<(), StackError> {
        for _ in 0..count {
            self.pop()?;
        }
        Ok(())
    }

    /// Opens a new scope level.
    pub fn new_level(&mut self) {
        self.levels.push(0);
    }

    /// Opens a new scope level that takes ownership of the `count` newest
    /// elements of the current level.
    pub fn adopt_level(&mut self, count: usize) -> Result<(), StackError> {
        let current = self.levels.last_mut().ok_or(StackError::NoOpenLevel)?;
        if *current < count {
            return Err(StackError::LevelTooShallow {
                requested: count,
                available: *current,
            });
        }
        *current -= count;
        self.levels.push(count);
        Ok(())
    }

    /// Closes the innermost level, releasing every element pushed since it
    /// was opened.
    pub fn pop_level(&mut self) -> Result<(), StackError> {
        if self.levels.len() <= 1 {
            return Err(StackError::NoOpenLevel);
        }
        let count = self.levels.pop().unwrap_or(0);
        if count > self.elements.len() {
            return Err(StackError::Corrupted {
                reason: format!(
                    "level holds {count} element(s) but the stack has {}",
                    self.elements.len()
                ),
            });
        }
        let keep = self.elements.len() - count;
        if let Some(first) = self.elements.get(keep) {
            self.top = first.offset;
            self.next_leaf = first.leaf;
        }
        self.elements.truncate(keep);
        Ok(())
    }

    /// Closes levels until exactly `depth` remain open above the root.
    pub fn pop_to_level(&mut self, depth: usize) -> Result<(), StackError> {
        if depth > self.depth() {
            return Err(StackError::LevelTooShallow {
                requested: depth,
                available: self.depth(),
            });
        }
        while self.depth() > depth {
            self.pop_level()?;
        }
        Ok(())
    }

    /// Number of open levels above the root.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// Number of elements owned by the innermost level.
    pub fn level_len(&self) -> usize {
        self.levels.last().copied().unwrap_or(0)
    }

    /// Whole element `index`, counted from the bottom.
    pub fn element(&self, index: usize) -> Option<&Element> {
        self.elements.get(index)
    }

    /// Finds the element or sub-element named by `leaf`.
    ///
    /// Binary-searches the element whose leaf range contains `leaf`, then
    /// resolves inside it.
    pub fn element_at(&self, leaf: usize) -> Option<Element> {
        if leaf >= self.next_leaf {
            return None;
        }
        let index = self.elements.partition_point(|e| e.leaf <= leaf).checked_sub(1)?;
        let owner = &self.elements[index];
        let resolved = owner.ty.resolve(leaf - owner.leaf, owner.offset).ok()?;
        Some(Element {
            ty: resolved.ty,
            offset: resolved.offset,
            leaf,
        })
    }

    /// The leaf `n` positions below the newest leaf.
    pub fn element_from_end(&self, n: usize) -> Option<Element> {
        let leaf = self.next_leaf.checked_sub(n + 1)?;
        self.element_at(leaf)
    }

    /// The whole element `n` positions below the top.
    pub fn whole_element_from_end(&self, n: usize) -> Option<&Element> {
        let index = self.elements.len().checked_sub(n + 1)?;
        self.elements.get(index)
    }

    /// Reallocates the buffer to `capacity` bytes.
    pub fn resize(&mut self, capacity: usize) -> Result<(), StackError> {
        if !self.allow_growth {
            return Err(StackError::GrowthNotAllowed {
                requested: capacity,
                capacity: self.capacity(),
            });
        }
        if capacity < self.top {
            return Err(StackError::ShrinkBelowTop {
                requested: capacity,
                top: self.top,
            });
        }
        if let Some(extra) = capacity.checked_sub(self.data.len()) {
            self.data
                .try_reserve_exact(extra)
                .map_err(|_| StackError::GrowthFailed {
                    requested: capacity,
                })?;
        }
        self.data.resize(capacity, 0);
        self.data.shrink_to_fit();
        self.generation += 1;
        Ok(())
    }

    /// Storage of `element`.
    pub fn bytes(&self, element: &Element) -> &[u8] {
        &self.data[element.offset..element.end()]
    }

    /// Copies `len` bytes from offset `from` to offset `to`.
    pub fn copy(&mut self, from: usize, to: usize, len: usize) -> Result<(), StackError> {
        if from + len > self.top || to + len > self.top {
            return Err(StackError::Corrupted {
                reason: format!("copy of {len} byte(s) from {from} to {to} beyond top {}", self.top),
            });
        }
        self.data.copy_within(from..from + len, to);
        Ok(())
    }

    /// Reads a word-sized little-endian value stored in `element`.
    pub fn read_word(&self, element: &Element) -> Option<u64> {
        let bytes = self.bytes(element);
        bytes.try_into().ok().map(u64::from_le_bytes)
    }

    /// Checks that elements are contiguous in both byte and leaf space and
    /// that the levels account for every element.
    pub fn verify(&self) -> Result<(), StackError> {
        let mut offset = 0;
        let mut leaf = 0;
        for (i, element) in self.elements.iter().enumerate() {
            if element.offset != offset || element.leaf != leaf {
                return Err(StackError::Corrupted {
                    reason: format!(
                        "element {i} at offset {} leaf {}, expected offset {offset} leaf {leaf}",
                        element.offset, element.leaf
                    ),
                });
            }
            offset = element.end();
            leaf = element.end_leaf();
        }
        if offset != self.top || leaf != self.next_leaf {
            return Err(StackError::Corrupted {
                reason: format!(
                    "top {} leaf {} do not match element end {offset} leaf {leaf}",
                    self.top, self.next_leaf
                ),
            });
        }
        if self.top > self.capacity() {
            return Err(StackError::Corrupted {
                reason: format!("top {} beyond capacity {}", self.top, self.capacity()),
            });
        }
        let owned: usize = self.levels.iter().sum();
        if owned != self.elements.len() {
            return Err(StackError::Corrupted {
                reason: format!(
                    "levels own {owned} element(s) but the stack has {}",
                    self.elements.len()
                ),
            });
        }
        Ok(())
    }
}
